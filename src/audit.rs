//! Corpus-wide quality metrics, issue aggregation, and trend reporting (C9).

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{BillRecord, ValidationIssue};
use crate::validator::{self, ValidationLevel};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub completeness_rate: f64,
    pub accuracy_rate: f64,
    pub consistency_rate: f64,
    pub timeliness_rate: f64,
    pub overall_quality_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityTrendPoint {
    pub date: NaiveDate,
    pub average_quality_score: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub overall: QualityMetrics,
    pub per_field: HashMap<String, QualityMetrics>,
    pub issues: Vec<ValidationIssue>,
    pub recommendations: Vec<String>,
    pub improvement_priorities: Vec<String>,
    pub quality_trend: Vec<QualityTrendPoint>,
    pub trend_direction: TrendDirection,
}

const TIMELINESS_FRESH_DAYS: i64 = 90;

fn timeliness(record: &BillRecord, now: DateTime<Utc>) -> f64 {
    if (now - record.last_updated).num_days() <= TIMELINESS_FRESH_DAYS {
        1.0
    } else {
        0.0
    }
}

fn dedup_key(issue: &ValidationIssue) -> (String, Option<String>, String) {
    (issue.bill_id.clone(), issue.field_name.clone(), format!("{:?}", issue.kind))
}

/// Group records by `(title, session_number, chamber_of_origin)` and flag
/// the second and later occurrences as duplicates (§4.8).
fn duplicate_issues(records: &[BillRecord]) -> Vec<ValidationIssue> {
    let mut seen = BTreeSet::new();
    let mut issues = Vec::new();
    for r in records {
        let key = (r.title.clone(), r.session_number, format!("{:?}", r.chamber_of_origin));
        if !seen.insert(key) {
            issues.push(ValidationIssue {
                bill_id: r.bill_id.clone(),
                field_name: None,
                kind: crate::model::IssueKind::DuplicateRecord,
                severity: crate::model::Severity::Warning,
                message: "duplicate (title, session, chamber_of_origin) tuple".into(),
                current_value: r.title.clone(),
                suggested_fix: None,
                confidence: 0.9,
            });
        }
    }
    issues
}

fn recommendations(issues: &[ValidationIssue]) -> Vec<String> {
    let mut recs = Vec::new();
    let critical = issues.iter().filter(|i| i.severity == crate::model::Severity::Critical).count();
    let missing = issues.iter().filter(|i| i.kind == crate::model::IssueKind::MissingRequired).count();
    let inconsistent = issues.iter().filter(|i| i.kind == crate::model::IssueKind::InconsistentData).count();
    let poor_text = issues.iter().filter(|i| i.kind == crate::model::IssueKind::PoorJapaneseText).count();

    if critical > 0 {
        recs.push(format!("resolve {critical} critical issue(s) before serving these records"));
    }
    if missing > 0 {
        recs.push(format!("schedule scrape_missing completion tasks for {missing} missing-field issue(s)"));
    }
    if inconsistent > 0 {
        recs.push(format!("review {inconsistent} inconsistent-data issue(s) for date/status conflicts"));
    }
    if poor_text > 0 {
        recs.push(format!("enhance {poor_text} record(s) with poor Japanese text quality"));
    }
    recs
}

fn improvement_priorities(issues: &[ValidationIssue]) -> Vec<String> {
    let mut priorities = Vec::new();
    if issues.iter().any(|i| i.severity == crate::model::Severity::Critical) {
        priorities.push("critical".to_string());
    }
    if issues.iter().any(|i| matches!(i.field_name.as_deref(), Some("outline") | Some("background") | Some("expected_effects"))) {
        priorities.push("enhanced_fields".to_string());
    }
    if issues.iter().any(|i| i.kind == crate::model::IssueKind::InconsistentData) {
        priorities.push("consistency".to_string());
    }
    priorities
}

/// Daily-bucketed average quality score over a trailing window, keyed by
/// `last_updated` date (§3.1, grounded in the original's dashboard trend).
fn quality_trend(records: &[BillRecord], window_days: i64, now: DateTime<Utc>) -> Vec<QualityTrendPoint> {
    let cutoff = now - chrono::Duration::days(window_days);
    let mut buckets: std::collections::BTreeMap<NaiveDate, (f64, usize)> = std::collections::BTreeMap::new();
    for r in records {
        if r.last_updated < cutoff {
            continue;
        }
        let date = r.last_updated.date_naive();
        let entry = buckets.entry(date).or_insert((0.0, 0));
        entry.0 += r.data_quality_score;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(date, (sum, count))| QualityTrendPoint { date, average_quality_score: sum / count as f64, sample_size: count })
        .collect()
}

fn classify_trend(trend: &[QualityTrendPoint]) -> TrendDirection {
    if trend.len() < 2 {
        return TrendDirection::Stable;
    }
    let first = trend.first().unwrap().average_quality_score;
    let last = trend.last().unwrap().average_quality_score;
    let delta = last - first;
    if delta > 0.05 {
        TrendDirection::Improving
    } else if delta < -0.05 {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

/// Audit the full record set, producing overall + per-field metrics, a
/// deduplicated issue list, recommendations, priorities, and a trend
/// series. An empty corpus yields defined-default rates, never an error
/// (§4.8 boundary).
pub fn audit(records: &[BillRecord], now: DateTime<Utc>, trend_window_days: i64) -> QualityReport {
    if records.is_empty() {
        return QualityReport {
            overall: QualityMetrics::default(),
            per_field: HashMap::new(),
            issues: Vec::new(),
            recommendations: Vec::new(),
            improvement_priorities: Vec::new(),
            quality_trend: Vec::new(),
            trend_direction: TrendDirection::Stable,
        };
    }

    let mut issues: Vec<ValidationIssue> = Vec::new();
    let mut valid_count = 0usize;
    let mut completeness_sum = 0.0;
    let mut consistency_sum = 0.0;
    let mut timeliness_sum = 0.0;

    for record in records {
        let result = validator::validate(record, ValidationLevel::Comprehensive);
        if result.is_valid {
            valid_count += 1;
        }
        completeness_sum += result.completeness_score;
        consistency_sum += result.consistency_score;
        timeliness_sum += timeliness(record, now);
        issues.extend(result.issues);
    }
    issues.extend(duplicate_issues(records));

    let mut dedup_seen = BTreeSet::new();
    issues.retain(|i| dedup_seen.insert(dedup_key(i)));

    let total = records.len();
    let completeness_rate = completeness_sum / total as f64;
    let consistency_rate = consistency_sum / total as f64;
    let timeliness_rate = timeliness_sum / total as f64;
    let accuracy_rate = valid_count as f64 / total as f64;
    let overall_quality_score = 0.3 * completeness_rate + 0.25 * accuracy_rate + 0.25 * consistency_rate + 0.2 * timeliness_rate;

    let overall = QualityMetrics {
        total,
        valid: valid_count,
        invalid: total - valid_count,
        completeness_rate,
        accuracy_rate,
        consistency_rate,
        timeliness_rate,
        overall_quality_score,
    };

    let mut per_field: HashMap<String, QualityMetrics> = HashMap::new();
    for field in ["title", "outline", "background", "expected_effects"] {
        let filled = records
            .iter()
            .filter(|r| match field {
                "title" => !r.title.is_empty(),
                "outline" => !r.outline.is_empty(),
                "background" => !r.background.is_empty(),
                "expected_effects" => !r.expected_effects.is_empty(),
                _ => false,
            })
            .count();
        per_field.insert(
            field.to_string(),
            QualityMetrics {
                total,
                valid: filled,
                invalid: total - filled,
                completeness_rate: filled as f64 / total as f64,
                accuracy_rate: 0.0,
                consistency_rate: 0.0,
                timeliness_rate: 0.0,
                overall_quality_score: filled as f64 / total as f64,
            },
        );
    }

    let trend = quality_trend(records, trend_window_days, now);
    let trend_direction = classify_trend(&trend);

    QualityReport {
        recommendations: recommendations(&issues),
        improvement_priorities: improvement_priorities(&issues),
        quality_trend: trend,
        trend_direction,
        overall,
        per_field,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Chamber;

    #[test]
    fn empty_corpus_returns_defaults_not_error() {
        let report = audit(&[], Utc::now(), 30);
        assert_eq!(report.overall.total, 0);
        assert_eq!(report.overall.overall_quality_score, 0.0);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn duplicate_records_are_flagged() {
        let now = Utc::now();
        let mut a = BillRecord::new("217-1", Chamber::A, 217);
        a.title = "重複法案名称テスト".to_string();
        a.last_updated = now;
        let mut b = BillRecord::new("217-2", Chamber::A, 217);
        b.title = "重複法案名称テスト".to_string();
        b.last_updated = now;

        let report = audit(&[a, b], now, 30);
        assert!(report.issues.iter().any(|i| i.kind == crate::model::IssueKind::DuplicateRecord));
    }
}
