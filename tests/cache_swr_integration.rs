use std::time::Duration;

use diet_ingest::cache::{self, Cache, InMemoryCache, ReadOutcome, DEFAULT_TTL};

// A value stored under the default TTL reads back fresh immediately,
// then — once enough of that TTL has elapsed to cross the stale
// threshold — reads back stale with a refresh requested rather than a
// miss, and finally expires once the TTL itself lapses.

#[test]
fn entry_transitions_fresh_then_stale_before_expiry() {
    let backing = InMemoryCache::new();
    backing.set("bill:217-1", b"payload".to_vec(), DEFAULT_TTL);

    let fresh = cache::swr_read(&backing, "bill:217-1");
    assert_eq!(fresh.outcome, ReadOutcome::Fresh);
    assert!(!fresh.needs_refresh);
    assert_eq!(fresh.value.as_deref(), Some(b"payload".as_slice()));

    // A TTL short enough that DEFAULT_TTL - remaining already exceeds
    // STALE_THRESHOLD puts the very next read into the stale bucket.
    backing.set("bill:217-1", b"payload".to_vec(), Duration::from_secs(1));
    std::thread::sleep(Duration::from_millis(5));
    let stale = cache::swr_read(&backing, "bill:217-1");
    assert_eq!(stale.outcome, ReadOutcome::Stale);
    assert!(stale.needs_refresh);
    assert_eq!(stale.value.as_deref(), Some(b"payload".as_slice()));

    backing.set("bill:217-1", b"payload".to_vec(), Duration::from_millis(10));
    std::thread::sleep(Duration::from_millis(20));
    let expired = cache::swr_read(&backing, "bill:217-1");
    assert_eq!(expired.outcome, ReadOutcome::Miss);
    assert!(expired.value.is_none());
}

#[test]
fn flush_pattern_clears_only_matching_prefix() {
    let backing = InMemoryCache::new();
    backing.set("member:1", b"a".to_vec(), DEFAULT_TTL);
    backing.set("member:2", b"b".to_vec(), DEFAULT_TTL);
    backing.set("bill:1", b"c".to_vec(), DEFAULT_TTL);

    backing.flush_pattern("member:");

    assert!(!backing.exists("member:1"));
    assert!(!backing.exists("member:2"));
    assert!(backing.exists("bill:1"));
}
