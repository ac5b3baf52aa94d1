//! Environment-backed configuration, read once at process start (§6
//! Configuration) and threaded down as `Arc<Config>` from the composition
//! root in `main.rs`.

use std::env;
use std::time::Duration;

/// Top-level process configuration. Each sub-struct maps to one
/// component's tunables; defaults match the ranges spec.md calls out.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub allowed_hosts: Vec<String>,
    pub record_store_url: Option<String>,
    pub cache_url: String,
    pub fetcher: FetcherConfig,
    pub notifications: NotificationConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            port: env_u16("PORT", 8080),
            allowed_hosts: env::var("ALLOWED_HOSTS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default(),
            record_store_url: env::var("RECORD_STORE_URL").ok(),
            cache_url: env::var("CACHE_URL").unwrap_or_else(|_| "local-cache://localhost:6379".to_string()),
            fetcher: FetcherConfig::default(),
            notifications: NotificationConfig::from_env(),
        }
    }
}

/// Rate limiting, robots, retry and dedup tunables for the resilient
/// fetcher (§4.1).
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub requests_per_second: f64,
    pub burst_size: u32,
    pub cooldown_seconds: u64,
    pub respect_retry_after: bool,
    pub max_retries: u32,
    pub max_age_hours: i64,
    pub max_concurrent_requests: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        FetcherConfig {
            requests_per_second: 0.4,
            burst_size: 4,
            cooldown_seconds: 15,
            respect_retry_after: true,
            max_retries: 3,
            max_age_hours: 24,
            max_concurrent_requests: 3,
        }
    }
}

impl FetcherConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

/// SMTP/webhook/Slack destinations for the monitoring core's alert
/// notification dispatch (§4.13).
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub smtp_server: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub from_email: Option<String>,
    pub alert_emails: Vec<String>,
    pub slack_webhook_url: Option<String>,
    pub webhook_url: Option<String>,
}

impl NotificationConfig {
    pub fn from_env() -> Self {
        NotificationConfig {
            smtp_server: env::var("SMTP_SERVER").ok(),
            smtp_port: env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()),
            smtp_user: env::var("SMTP_USER").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
            from_email: env::var("FROM_EMAIL").ok(),
            alert_emails: env::var("ALERT_EMAILS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default(),
            slack_webhook_url: env::var("SLACK_WEBHOOK_URL").ok(),
            webhook_url: env::var("WEBHOOK_URL").ok(),
        }
    }
}

fn env_u16(key: &str, default: u16) -> u16 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
