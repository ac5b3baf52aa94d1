//! Rule-evaluated alerting, periodic health checks, and dashboard metric
//! aggregation (C14).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    FetcherFailedJobs,
    ValidatorInvalidRate,
    QueueBacklog,
    CacheHitRate,
    MigrationSuccessRate,
}

/// `condition_expr` compiled at rule-registration time into this enum,
/// evaluated against a numeric-metrics namespace by matching rather than
/// embedding a scripting runtime (§4.13 Rust shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Condition {
    GreaterThan(MetricKey, f64),
    LessThan(MetricKey, f64),
    And(Box<Condition>, Box<Condition>),
}

impl Condition {
    fn eval(&self, metrics: &HashMap<MetricKey, f64>) -> bool {
        match self {
            Condition::GreaterThan(key, threshold) => metrics.get(key).is_some_and(|v| v > threshold),
            Condition::LessThan(key, threshold) => metrics.get(key).is_some_and(|v| v < threshold),
            Condition::And(a, b) => a.eval(metrics) && b.eval(metrics),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Log,
    Email,
    Webhook,
    Slack,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub rule_id: String,
    #[serde(skip)]
    pub condition: Option<Condition>,
    pub severity: AlertSeverity,
    pub notification_channels: Vec<NotificationChannel>,
    pub enabled: bool,
    pub cooldown_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: String,
    pub rule_id: String,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub details: String,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
}

#[derive(Default)]
struct MonitoringState {
    rules: Vec<AlertRule>,
    active_alerts: HashMap<String, Alert>,
    history: Vec<Alert>,
    cooldowns: HashMap<String, DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    pub success: bool,
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
    pub timed_out: bool,
}

/// Owns alert rules, active alerts, and health-check results, and runs
/// the two background loops described in §4.13 (rule evaluation, health
/// checks), each honoring a cooperative `watch`-based stop signal (§5).
pub struct MonitoringCore {
    state: Mutex<MonitoringState>,
    health_results: Mutex<HashMap<String, HealthCheckResult>>,
}

impl Default for MonitoringCore {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitoringCore {
    pub fn new() -> Self {
        MonitoringCore { state: Mutex::new(MonitoringState::default()), health_results: Mutex::new(HashMap::new()) }
    }

    pub fn register_rule(&self, rule: AlertRule) {
        self.state.lock().unwrap().rules.push(rule);
    }

    /// One evaluation tick: evaluate every enabled rule not in cooldown
    /// against `metrics`, trigger alerts, and auto-resolve alerts whose
    /// rule no longer fires (§4.13, §8 invariant 6).
    pub fn evaluate_tick(&self, metrics: &HashMap<MetricKey, f64>, now: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        let rules = state.rules.clone();

        for rule in &rules {
            if !rule.enabled {
                continue;
            }
            let Some(condition) = &rule.condition else { continue };
            let triggered = condition.eval(metrics);
            let in_cooldown = state.cooldowns.get(&rule.rule_id).is_some_and(|end| now < *end);

            if triggered && !in_cooldown {
                let alert = Alert {
                    alert_id: Uuid::new_v4().to_string(),
                    rule_id: rule.rule_id.clone(),
                    triggered_at: now,
                    resolved_at: None,
                    details: format!("rule {} triggered", rule.rule_id),
                    acknowledged_at: None,
                    acknowledged_by: None,
                };
                state.cooldowns.insert(rule.rule_id.clone(), now + chrono::Duration::seconds(rule.cooldown_seconds));
                for channel in &rule.notification_channels {
                    dispatch_notification(*channel, &alert);
                }
                state.history.push(alert.clone());
                state.active_alerts.insert(rule.rule_id.clone(), alert);
            } else if !triggered
                && let Some(alert) = state.active_alerts.get_mut(&rule.rule_id)
                    && alert.resolved_at.is_none() {
                        alert.resolved_at = Some(now);
                    }
        }
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.state.lock().unwrap().active_alerts.values().cloned().collect()
    }

    pub fn history(&self) -> Vec<Alert> {
        self.state.lock().unwrap().history.clone()
    }

    pub fn record_health_result(&self, check_name: &str, result: HealthCheckResult) {
        self.health_results.lock().unwrap().insert(check_name.to_string(), result);
    }

    pub fn health_snapshot(&self) -> HashMap<String, HealthCheckResult> {
        self.health_results.lock().unwrap().clone()
    }
}

fn dispatch_notification(channel: NotificationChannel, alert: &Alert) {
    match channel {
        NotificationChannel::Log => info!(rule_id = %alert.rule_id, alert_id = %alert.alert_id, "alert triggered"),
        NotificationChannel::Email | NotificationChannel::Webhook | NotificationChannel::Slack => {
            // External dispatch is out of scope for this crate's core; a
            // failure here must never block rule evaluation (§4.13, §7).
            warn!(rule_id = %alert.rule_id, ?channel, "notification channel dispatch is a stub in this build");
        }
    }
}

/// Run the rule-evaluation loop on `evaluation_interval`, calling
/// `metrics_fn` each tick, until `stop` flips true (§4.13, §5).
pub async fn run_evaluation_loop(
    core: &MonitoringCore,
    metrics_fn: impl Fn() -> HashMap<MetricKey, f64>,
    evaluation_interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(evaluation_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                core.evaluate_tick(&metrics_fn(), Utc::now());
            }
            _ = stop.changed() => {
                if *stop.borrow() {
                    break;
                }
            }
        }
    }
}

/// Run the health-check loop on `health_check_interval`, until `stop`
/// flips true (§4.13, §5).
pub async fn run_health_check_loop(
    core: &MonitoringCore,
    checks: Vec<(String, Duration)>,
    check_fn: impl Fn(&str) -> bool,
    health_check_interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(health_check_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                for (name, timeout) in &checks {
                    let start = std::time::Instant::now();
                    let success = check_fn(name);
                    let duration = start.elapsed();
                    core.record_health_result(name, HealthCheckResult {
                        success,
                        duration,
                        timestamp: Utc::now(),
                        timed_out: duration > *timeout,
                    });
                }
            }
            _ = stop.changed() => {
                if *stop.borrow() {
                    break;
                }
            }
        }
    }
}

pub const DEFAULT_EVALUATION_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_METRICS_CACHE_TTL: Duration = Duration::from_secs(300);

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(value: f64) -> HashMap<MetricKey, f64> {
        HashMap::from([(MetricKey::QueueBacklog, value)])
    }

    #[test]
    fn scenario_f_alert_cooldown() {
        let core = MonitoringCore::new();
        core.register_rule(AlertRule {
            rule_id: "backlog-high".into(),
            condition: Some(Condition::GreaterThan(MetricKey::QueueBacklog, 100.0)),
            severity: AlertSeverity::Warning,
            notification_channels: vec![NotificationChannel::Log],
            enabled: true,
            cooldown_seconds: 1800,
        });

        let t0 = Utc::now();
        core.evaluate_tick(&metrics(150.0), t0);
        assert_eq!(core.active_alerts().len(), 1);
        let first_alert_id = core.active_alerts()[0].alert_id.clone();

        core.evaluate_tick(&metrics(150.0), t0 + chrono::Duration::seconds(300));
        assert_eq!(core.active_alerts().len(), 1);
        assert_eq!(core.active_alerts()[0].alert_id, first_alert_id, "still in cooldown, no new alert");

        core.evaluate_tick(&metrics(150.0), t0 + chrono::Duration::seconds(1801));
        assert_eq!(core.history().len(), 2, "cooldown expired, a second alert fires");
    }

    #[test]
    fn alert_auto_resolves_when_condition_clears() {
        let core = MonitoringCore::new();
        core.register_rule(AlertRule {
            rule_id: "backlog-high".into(),
            condition: Some(Condition::GreaterThan(MetricKey::QueueBacklog, 100.0)),
            severity: AlertSeverity::Warning,
            notification_channels: vec![NotificationChannel::Log],
            enabled: true,
            cooldown_seconds: 60,
        });

        let t0 = Utc::now();
        core.evaluate_tick(&metrics(150.0), t0);
        core.evaluate_tick(&metrics(10.0), t0 + chrono::Duration::seconds(10));
        assert!(core.active_alerts()[0].resolved_at.is_some());
    }
}
