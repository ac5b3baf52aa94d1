//! Legislative stage machine, transition detection, and stall/delay/
//! low-confidence/missing-data/unusual-progression alerts (C8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{BillRecord, Chamber, ProgressSnapshot, Stage, StageTransition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Active,
    Completed,
    Suspended,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Stall,
    Delay,
    LowConfidence,
    MissingOutline,
    MissingCommittee,
    UnusualProgression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressAlert {
    pub bill_id: String,
    pub kind: AlertKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingResult {
    pub status: TrackingStatus,
    pub snapshot: ProgressSnapshot,
    pub history: Vec<ProgressSnapshot>,
    pub transitions: Vec<StageTransition>,
    pub alerts: Vec<ProgressAlert>,
}

const STALL_DAYS: i64 = 30;
const DELAY_DAYS: i64 = 60;
const LOW_CONFIDENCE_THRESHOLD: f64 = 0.5;
const FRESHNESS_DECAY_DAYS: f64 = 365.0;

fn status_for_stage(stage: Stage) -> TrackingStatus {
    if stage == Stage::Continued {
        TrackingStatus::Suspended
    } else if stage.is_terminal() {
        TrackingStatus::Completed
    } else {
        TrackingStatus::Active
    }
}

/// Snapshot confidence = weighted sum of completeness, freshness,
/// source_reliability, consistency (§4.7). Freshness decays linearly to 0
/// over 365 days since `last_action_at`.
fn snapshot_confidence(record: &BillRecord, last_action_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> (f64, f64) {
    let completeness = if record.title.is_empty() { 0.0 } else { 1.0 } * 0.5
        + if record.outline.is_empty() { 0.0 } else { 0.5 };
    let freshness = match last_action_at {
        Some(at) => {
            let days = (now - at).num_days().max(0) as f64;
            (1.0 - days / FRESHNESS_DECAY_DAYS).clamp(0.0, 1.0)
        }
        None => 0.0,
    };
    let source_reliability = match record.source_chambers {
        crate::model::SourceChambers::Both => 1.0,
        _ => 0.7,
    };
    let consistency = if record.dates.monotonicity_violations().is_empty() { 1.0 } else { 0.5 };

    let confidence = 0.4 * completeness + 0.3 * freshness + 0.2 * source_reliability + 0.1 * consistency;
    (confidence, freshness)
}

/// Detect consecutive `(from, to)` transitions across a history sorted by
/// snapshot time, recording `duration_days` for each (§4.7).
fn detect_transitions(history: &[ProgressSnapshot]) -> Vec<StageTransition> {
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|s| s.snapshot_at);
    sorted
        .windows(2)
        .filter(|w| w[0].stage != w[1].stage)
        .map(|w| StageTransition {
            from_stage: w[0].stage,
            to_stage: w[1].stage,
            at: w[1].snapshot_at,
            chamber: w[1].chamber,
            committee: w[1].committee.clone(),
            duration_days: (w[1].snapshot_at - w[0].snapshot_at).num_days(),
        })
        .collect()
}

/// Track a record's legislative progress: build the current snapshot,
/// compute transitions from `history`, and raise stall/delay/confidence/
/// missing-data/unusual-progression alerts (§4.7).
pub fn track(record: &BillRecord, history: &[ProgressSnapshot], now: DateTime<Utc>) -> TrackingResult {
    let last_action_at = record.dates.ordered().last().map(|(_, d)| *d);
    let (confidence, freshness) = snapshot_confidence(record, last_action_at, now);

    let snapshot = ProgressSnapshot {
        bill_id: record.bill_id.clone(),
        snapshot_at: now,
        stage: record.stage,
        chamber: record.chamber_of_origin,
        committee: record.committee_assignments.get(&record.chamber_of_origin).cloned(),
        last_action: None,
        last_action_at,
        next_expected_action: record.stage.forward_index().and_then(|i| Stage::FORWARD_ORDER.get(i + 1)).map(|s| format!("{s:?}")),
        confidence,
    };

    let mut full_history = history.to_vec();
    full_history.push(snapshot.clone());
    let transitions = detect_transitions(&full_history);

    let mut alerts = Vec::new();

    if let Some(at) = last_action_at
        && (now - at).num_days() > STALL_DAYS {
            alerts.push(ProgressAlert {
                bill_id: record.bill_id.clone(),
                kind: AlertKind::Stall,
                message: format!("no recorded action in {} days", (now - at).num_days()),
            });
        }

    for t in &transitions {
        if t.duration_days > DELAY_DAYS {
            alerts.push(ProgressAlert {
                bill_id: record.bill_id.clone(),
                kind: AlertKind::Delay,
                message: format!("transition {:?} -> {:?} took {} days", t.from_stage, t.to_stage, t.duration_days),
            });
        }
        if t.from_stage.is_terminal() {
            alerts.push(ProgressAlert {
                bill_id: record.bill_id.clone(),
                kind: AlertKind::UnusualProgression,
                message: format!("backward transition from terminal stage {:?} to {:?}", t.from_stage, t.to_stage),
            });
        }
    }

    if confidence < LOW_CONFIDENCE_THRESHOLD {
        alerts.push(ProgressAlert {
            bill_id: record.bill_id.clone(),
            kind: AlertKind::LowConfidence,
            message: format!("snapshot confidence {confidence:.2} below threshold"),
        });
    }
    if record.outline.is_empty() {
        alerts.push(ProgressAlert { bill_id: record.bill_id.clone(), kind: AlertKind::MissingOutline, message: "outline is empty".into() });
    }
    if record.committee_assignments.is_empty() {
        alerts.push(ProgressAlert {
            bill_id: record.bill_id.clone(),
            kind: AlertKind::MissingCommittee,
            message: "no committee assignment recorded".into(),
        });
    }

    let _ = freshness;
    TrackingResult { status: status_for_stage(record.stage), snapshot, history: full_history, transitions, alerts }
}

#[allow(dead_code)]
fn chamber_label(c: Chamber) -> &'static str {
    match c {
        Chamber::A => "A",
        Chamber::B => "B",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn scenario_c_progress_stall() {
        let now = Utc::now();
        let mut record = BillRecord::new("217-1", Chamber::A, 217);
        record.title = "法案".to_string();
        record.stage = Stage::CommitteeReview;
        record.dates.submitted_date = Some(now - Duration::days(45));

        let result = track(&record, &[], now);
        assert_eq!(result.status, TrackingStatus::Active);
        assert!(result.alerts.iter().any(|a| a.kind == AlertKind::Stall));
        let (confidence, freshness) = snapshot_confidence(&record, Some(now - Duration::days(45)), now);
        let _ = confidence;
        assert!(freshness <= 0.88, "freshness was {freshness}");
    }

    #[test]
    fn terminal_backward_transition_flagged() {
        let now = Utc::now();
        let mut record = BillRecord::new("217-1", Chamber::A, 217);
        record.title = "法案".to_string();
        record.stage = Stage::CommitteeReview;

        let history = vec![ProgressSnapshot {
            bill_id: "217-1".into(),
            snapshot_at: now - Duration::days(5),
            stage: Stage::Enacted,
            chamber: Chamber::A,
            committee: None,
            last_action: None,
            last_action_at: None,
            next_expected_action: None,
            confidence: 0.9,
        }];

        let result = track(&record, &history, now);
        assert!(result.alerts.iter().any(|a| a.kind == AlertKind::UnusualProgression));
    }
}
