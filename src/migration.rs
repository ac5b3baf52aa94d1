//! Five-phase migration orchestrator: audit, plan, execute, validate,
//! complete (C11).

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::audit::{self, QualityMetrics};
use crate::completion::{self, BatchCompletionResult, DEFAULT_BATCH_SIZE};
use crate::model::BillRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Audit,
    Planning,
    Execution,
    Validation,
    Completion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub phase: Phase,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionState {
    pub status: ExecutionStatus,
    pub current_phase: Option<Phase>,
    pub progress_percentage: f64,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub errors: Vec<String>,
    pub phase_results: Vec<PhaseTiming>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub plan_id: String,
    pub execution_id: String,
    pub initial_metrics: QualityMetrics,
    pub final_metrics: QualityMetrics,
    pub quality_improvement: f64,
    pub batch_results: BatchCompletionResult,
    pub total_fields_completed: usize,
    pub total_bills_improved: usize,
    pub estimated_wall_clock_seconds: u64,
    pub phases_timing: Vec<PhaseTiming>,
    pub success_rate: f64,
    pub recommendations: Vec<String>,
}

/// Report sink abstraction: storage-agnostic per §6/§9 — migration
/// reports are persisted through whatever `RecordStore`-adjacent
/// implementation the caller wires in, not a hardcoded filesystem path.
pub trait ReportSink {
    fn save(&self, report: &MigrationReport) -> anyhow::Result<()>;
}

pub struct NullReportSink;

impl ReportSink for NullReportSink {
    fn save(&self, _report: &MigrationReport) -> anyhow::Result<()> {
        Ok(())
    }
}

const MIN_IMPROVEMENT_RATIO: f64 = 0.1;

fn phase_timed<T>(phase: Phase, timings: &mut Vec<PhaseTiming>, f: impl FnOnce() -> T) -> T {
    let start = std::time::Instant::now();
    let result = f();
    timings.push(PhaseTiming { phase, duration_ms: start.elapsed().as_millis() as u64 });
    result
}

/// Run the five synchronous phases (audit, plan, execute, validate,
/// complete) against `records`, persisting the final report through
/// `sink` (§4.10).
pub fn run_migration(records: &mut HashMap<String, BillRecord>, sink: &dyn ReportSink) -> anyhow::Result<MigrationReport> {
    let plan_id = Uuid::new_v4().to_string();
    let execution_id = Uuid::new_v4().to_string();
    let mut state = ExecutionState {
        status: ExecutionStatus::Running,
        current_phase: None,
        progress_percentage: 0.0,
        tasks_completed: 0,
        tasks_failed: 0,
        errors: Vec::new(),
        phase_results: Vec::new(),
    };

    let now = Utc::now();
    let all_records: Vec<BillRecord> = records.values().cloned().collect();

    state.current_phase = Some(Phase::Audit);
    let initial_report = phase_timed(Phase::Audit, &mut state.phase_results, || audit::audit(&all_records, now, 30));
    let initial_metrics = initial_report.overall.clone();

    state.current_phase = Some(Phase::Planning);
    let tasks = phase_timed(Phase::Planning, &mut state.phase_results, || completion::plan(&initial_report.issues));
    let estimated_wall_clock_seconds =
        (PHASE_WALL_CLOCK_FACTOR * tasks.iter().map(|t| t.estimated_effort_seconds).sum::<u64>() as f64).round() as u64;
    info!(estimated_wall_clock_seconds, task_count = tasks.len(), "completion plan estimated");

    state.current_phase = Some(Phase::Execution);
    // No detail pages are fetched within the orchestrator itself; a caller
    // that wants scrape_missing to actually fill fields during a migration
    // run supplies them by calling completion::execute directly instead.
    let scraped_details = HashMap::new();
    let batch_results =
        phase_timed(Phase::Execution, &mut state.phase_results, || completion::execute(&tasks, records, DEFAULT_BATCH_SIZE, &scraped_details));
    state.tasks_completed = batch_results.completed;
    state.tasks_failed = batch_results.failed;

    state.current_phase = Some(Phase::Validation);
    let all_records_after: Vec<BillRecord> = records.values().cloned().collect();
    let final_report = phase_timed(Phase::Validation, &mut state.phase_results, || audit::audit(&all_records_after, Utc::now(), 30));
    let final_metrics = final_report.overall.clone();

    let improvement = final_metrics.overall_quality_score - initial_metrics.overall_quality_score;
    let relative_improvement = if initial_metrics.overall_quality_score > 0.0 {
        improvement / initial_metrics.overall_quality_score
    } else if final_metrics.overall_quality_score > 0.0 {
        1.0
    } else {
        0.0
    };
    let validation_passed = relative_improvement >= MIN_IMPROVEMENT_RATIO;

    state.current_phase = Some(Phase::Completion);
    let total_fields_completed: usize =
        batch_results.per_task_results.iter().filter_map(|t| t.event.as_ref()).map(|e| e.completed_fields.len()).sum();
    let total_bills_improved =
        batch_results.per_task_results.iter().filter(|t| t.event.as_ref().is_some_and(|e| !e.completed_fields.is_empty())).count();
    let success_rate = if state.tasks_completed + state.tasks_failed == 0 {
        0.0
    } else {
        state.tasks_completed as f64 / (state.tasks_completed + state.tasks_failed) as f64
    };

    let mut report = phase_timed(Phase::Completion, &mut state.phase_results, || MigrationReport {
        plan_id,
        execution_id,
        initial_metrics,
        final_metrics,
        quality_improvement: improvement,
        batch_results,
        total_fields_completed,
        total_bills_improved,
        estimated_wall_clock_seconds,
        phases_timing: Vec::new(),
        success_rate,
        recommendations: final_report.recommendations.clone(),
    });
    // The completion phase's own timing entry is pushed by phase_timed
    // after the closure returns, so phases_timing has to be filled in
    // from the now-complete history rather than inside the closure.
    report.phases_timing = state.phase_results.clone();

    state.status = if validation_passed { ExecutionStatus::Completed } else { ExecutionStatus::Failed };
    state.progress_percentage = 100.0;

    sink.save(&report)?;
    Ok(report)
}

pub const PHASE_WALL_CLOCK_FACTOR: f64 = 1.3;
#[allow(dead_code)]
const RATE_LIMIT_DELAY: Duration = Duration::from_secs(2);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Chamber;

    #[test]
    fn migration_runs_all_phases_and_persists_report() {
        let mut records = HashMap::new();
        let mut r = BillRecord::new("217-1", Chamber::A, 217);
        r.title = "  法案　名称  ".to_string();
        r.outline = "概要".to_string();
        records.insert("217-1".to_string(), r);

        let report = run_migration(&mut records, &NullReportSink).unwrap();
        assert_eq!(report.phases_timing.len(), 5);
        assert!(report.success_rate >= 0.0);
    }
}
