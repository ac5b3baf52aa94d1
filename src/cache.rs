//! Generic read-through cache with stale-while-revalidate (C13).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn expires_at(&self) -> Instant {
        self.stored_at + self.ttl
    }

    fn remaining_ttl(&self, now: Instant) -> Duration {
        self.expires_at().saturating_duration_since(now)
    }
}

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);
pub const STALE_THRESHOLD: Duration = Duration::from_secs(6 * 3600);

/// Generic cache contract (§4.12): the external Redis-shaped backend
/// named in §6 is out of scope, so this crate supplies the trait plus an
/// in-memory implementation callers can swap.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);
    fn delete(&self, key: &str);
    fn exists(&self, key: &str) -> bool;
    fn ttl(&self, key: &str) -> Option<Duration>;
    fn mget(&self, keys: &[String]) -> Vec<Option<Vec<u8>>>;
    fn mset(&self, entries: &[(String, Vec<u8>, Duration)]);
    fn increment(&self, key: &str, by: i64) -> i64;
    fn flush_pattern(&self, prefix: &str);
}

#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    counters: Mutex<HashMap<String, i64>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for InMemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at() > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        self.entries.lock().unwrap().insert(key.to_string(), CacheEntry { value, stored_at: Instant::now(), ttl });
    }

    fn delete(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }

    fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn ttl(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.lock().unwrap();
        entries.get(key).map(|e| e.remaining_ttl(Instant::now()))
    }

    fn mget(&self, keys: &[String]) -> Vec<Option<Vec<u8>>> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    fn mset(&self, entries: &[(String, Vec<u8>, Duration)]) {
        let mut map = self.entries.lock().unwrap();
        let now = Instant::now();
        for (key, value, ttl) in entries {
            map.insert(key.clone(), CacheEntry { value: value.clone(), stored_at: now, ttl: *ttl });
        }
    }

    fn increment(&self, key: &str, by: i64) -> i64 {
        let mut counters = self.counters.lock().unwrap();
        let entry = counters.entry(key.to_string()).or_insert(0);
        *entry += by;
        *entry
    }

    fn flush_pattern(&self, prefix: &str) {
        self.entries.lock().unwrap().retain(|k, _| !k.starts_with(prefix));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Fresh,
    Stale,
    Miss,
}

/// A stale-while-revalidate read result: the value (if any) and whether a
/// background refresh should be scheduled.
pub struct SwrRead {
    pub value: Option<Vec<u8>>,
    pub outcome: ReadOutcome,
    pub needs_refresh: bool,
}

/// Stale-while-revalidate read (§4.12): return cached data immediately
/// when present, flagging `needs_refresh` when stale so the caller can
/// enqueue a high-priority refresh job keyed by `key` (§4.12, §9 design
/// note — concurrent stale reads coalesce to one refresh by that key).
pub fn swr_read(cache: &dyn Cache, key: &str) -> SwrRead {
    match cache.get(key) {
        None => SwrRead { value: None, outcome: ReadOutcome::Miss, needs_refresh: true },
        Some(value) => {
            let Some(remaining) = cache.ttl(key) else {
                return SwrRead { value: Some(value), outcome: ReadOutcome::Fresh, needs_refresh: false };
            };
            let stale = DEFAULT_TTL.saturating_sub(remaining) > STALE_THRESHOLD;
            if stale {
                SwrRead { value: Some(value), outcome: ReadOutcome::Stale, needs_refresh: true }
            } else {
                SwrRead { value: Some(value), outcome: ReadOutcome::Fresh, needs_refresh: false }
            }
        }
    }
}

/// Warm `entries` into the cache in a single batch (mirroring a pipelined
/// MSET + per-key EXPIRE), plus a consolidated "all" list entry under
/// `list_key` (§4.12).
pub fn warmup(cache: &dyn Cache, entries: &[(String, Vec<u8>)], ttl: Duration, list_key: &str) {
    let batch: Vec<(String, Vec<u8>, Duration)> = entries.iter().map(|(k, v)| (k.clone(), v.clone(), ttl)).collect();
    cache.mset(&batch);
    let all_ids: Vec<u8> = entries.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>().join(",").into_bytes();
    cache.set(list_key, all_ids, ttl);
}

/// Delete every key matching `prefix` (§4.12 invalidation).
pub fn invalidate(cache: &dyn Cache, prefix: &str) {
    cache.flush_pattern(prefix);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_set_then_hit() {
        let cache = InMemoryCache::new();
        assert_eq!(swr_read(&cache, "member:1").outcome, ReadOutcome::Miss);
        cache.set("member:1", b"data".to_vec(), DEFAULT_TTL);
        let read = swr_read(&cache, "member:1");
        assert_eq!(read.outcome, ReadOutcome::Fresh);
        assert_eq!(read.value, Some(b"data".to_vec()));
    }

    #[test]
    fn stale_value_flags_refresh_but_still_returns() {
        let cache = InMemoryCache::new();
        // TTL shorter than DEFAULT_TTL - STALE_THRESHOLD makes it already stale.
        cache.set("member:1", b"data".to_vec(), Duration::from_secs(1));
        std::thread::sleep(Duration::from_millis(5));
        let read = swr_read(&cache, "member:1");
        assert_eq!(read.outcome, ReadOutcome::Stale);
        assert!(read.needs_refresh);
        assert_eq!(read.value, Some(b"data".to_vec()));
    }

    #[test]
    fn invalidate_removes_matching_prefix() {
        let cache = InMemoryCache::new();
        cache.set("member:1", b"a".to_vec(), DEFAULT_TTL);
        cache.set("member:2", b"b".to_vec(), DEFAULT_TTL);
        cache.set("other:1", b"c".to_vec(), DEFAULT_TTL);
        invalidate(&cache, "member:");
        assert!(!cache.exists("member:1"));
        assert!(!cache.exists("member:2"));
        assert!(cache.exists("other:1"));
    }
}
