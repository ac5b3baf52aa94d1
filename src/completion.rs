//! Gap-filling task planning and batched execution (C10).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{BillRecord, IssueKind, ValidationIssue};
use crate::parsers::collapse_whitespace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStrategy {
    ScrapeMissing,
    EnhanceExisting,
    ValidateAndFix,
    BulkUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionTask {
    pub task_id: String,
    pub bill_id: String,
    pub strategy: CompletionStrategy,
    pub target_fields: Vec<String>,
    pub priority: TaskPriority,
    pub estimated_effort_seconds: u64,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub bill_id: String,
    pub event: String,
    pub strategy: CompletionStrategy,
    pub completed_fields: Vec<String>,
    pub processing_time_ms: u64,
    pub quality_improvement: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub succeeded: bool,
    pub error: Option<String>,
    pub event: Option<CompletionEvent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchCompletionResult {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_processing_time_ms: u64,
    pub success_rate: f64,
    pub per_task_results: Vec<TaskResult>,
}

const CRITICAL_FIELDS: &[&str] = &["outline", "title", "status"];

fn field_priority(field: &str) -> TaskPriority {
    if CRITICAL_FIELDS.contains(&field) {
        TaskPriority::Critical
    } else {
        match field {
            "background" | "expected_effects" => TaskPriority::High,
            "key_provisions" | "related_laws" | "submitting_members" => TaskPriority::Medium,
            _ => TaskPriority::Low,
        }
    }
}

fn estimate_effort(strategy: CompletionStrategy, field_count: usize) -> u64 {
    let per_field = match strategy {
        CompletionStrategy::ScrapeMissing => 30,
        CompletionStrategy::EnhanceExisting => 10,
        CompletionStrategy::ValidateAndFix => 5,
        CompletionStrategy::BulkUpdate => 2,
    };
    (per_field * field_count.max(1) as u64).max(per_field)
}

/// Bucket issues by bill, and within a bill by kind, producing one task
/// per (bill, strategy) pair (§4.9).
pub fn plan(issues: &[ValidationIssue]) -> Vec<CompletionTask> {
    use std::collections::BTreeMap;

    let mut by_bill: BTreeMap<&str, Vec<&ValidationIssue>> = BTreeMap::new();
    for issue in issues {
        by_bill.entry(&issue.bill_id).or_default().push(issue);
    }

    let mut tasks = Vec::new();
    for (bill_id, bill_issues) in by_bill {
        let missing_fields: Vec<String> = bill_issues
            .iter()
            .filter(|i| i.kind == IssueKind::MissingRequired)
            .filter_map(|i| i.field_name.clone())
            .collect();
        let inconsistent_fields: Vec<String> = bill_issues
            .iter()
            .filter(|i| i.kind == IssueKind::InconsistentData)
            .filter_map(|i| i.field_name.clone())
            .collect();
        let poor_text_fields: Vec<String> = bill_issues
            .iter()
            .filter(|i| i.kind == IssueKind::PoorJapaneseText)
            .filter_map(|i| i.field_name.clone())
            .collect();

        let mut bill_has_task = false;
        if !missing_fields.is_empty() {
            tasks.push(make_task(bill_id, CompletionStrategy::ScrapeMissing, missing_fields));
            bill_has_task = true;
        }
        if !inconsistent_fields.is_empty() {
            tasks.push(make_task(bill_id, CompletionStrategy::ValidateAndFix, inconsistent_fields));
            bill_has_task = true;
        }
        if !poor_text_fields.is_empty() {
            tasks.push(make_task(bill_id, CompletionStrategy::EnhanceExisting, poor_text_fields));
            bill_has_task = true;
        }
        // Once anything else touched the bill, recompute its aggregate
        // fields so quality_improvement reflects the other fixes.
        if bill_has_task {
            tasks.push(make_task(
                bill_id,
                CompletionStrategy::BulkUpdate,
                vec!["data_quality_score".to_string(), "source_chambers".to_string()],
            ));
        }
    }

    tasks.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.estimated_effort_seconds.cmp(&b.estimated_effort_seconds)));
    tasks
}

fn make_task(bill_id: &str, strategy: CompletionStrategy, fields: Vec<String>) -> CompletionTask {
    let priority = fields.iter().map(|f| field_priority(f)).min().unwrap_or(TaskPriority::Low);
    let effort = estimate_effort(strategy, fields.len());
    CompletionTask {
        task_id: format!("{bill_id}-{strategy:?}"),
        bill_id: bill_id.to_string(),
        strategy,
        target_fields: fields,
        priority,
        estimated_effort_seconds: effort,
        dependencies: Vec::new(),
    }
}

/// Apply a single task's strategy to `record` in place, returning the
/// completion event on success (§4.9). `scraped_details` holds detail-page
/// HTML already fetched by C1, keyed by bill id, for `scrape_missing`.
fn apply_task(task: &CompletionTask, record: &mut BillRecord, scraped_details: &std::collections::HashMap<String, String>) -> CompletionEvent {
    let mut completed_fields = Vec::new();
    let quality_before = record.data_quality_score;

    match task.strategy {
        CompletionStrategy::ScrapeMissing => {
            if let Some(html) = scraped_details.get(&record.bill_id) {
                let scraped = crate::parsers::parse_detail(record.chamber_of_origin, html, &record.bill_id, record.session_number);
                for field in &task.target_fields {
                    let filled = match field.as_str() {
                        "outline" if record.outline.is_empty() && !scraped.outline.is_empty() => {
                            record.outline = scraped.outline.clone();
                            true
                        }
                        "title" if record.title.is_empty() && !scraped.title.is_empty() => {
                            record.title = scraped.title.clone();
                            true
                        }
                        "background" if record.background.is_empty() && !scraped.background.is_empty() => {
                            record.background = scraped.background.clone();
                            true
                        }
                        "expected_effects" if record.expected_effects.is_empty() && !scraped.expected_effects.is_empty() => {
                            record.expected_effects = scraped.expected_effects.clone();
                            true
                        }
                        _ => false,
                    };
                    if filled {
                        completed_fields.push(field.clone());
                    }
                }
            }
        }
        CompletionStrategy::EnhanceExisting => {
            let normalized = collapse_whitespace(&record.outline);
            if normalized != record.outline {
                record.outline = normalized;
                completed_fields.push("outline".to_string());
            }
            let normalized_background = collapse_whitespace(&record.background);
            if normalized_background != record.background {
                record.background = normalized_background;
                completed_fields.push("background".to_string());
            }
        }
        CompletionStrategy::ValidateAndFix => {
            for field in &task.target_fields {
                if field == "stage" {
                    if let Some(canonical) = crate::model::Status::from_terminal_stage(record.stage)
                        && canonical != record.status
                    {
                        record.status = canonical;
                        completed_fields.push("status".to_string());
                    }
                } else if record.dates.fix_violation(field) {
                    completed_fields.push(field.clone());
                }
            }
        }
        CompletionStrategy::BulkUpdate => {
            let canonical_chambers = match record.chamber_of_origin {
                crate::model::Chamber::A => crate::model::SourceChambers::AOnly,
                crate::model::Chamber::B => crate::model::SourceChambers::BOnly,
            };
            if record.source_chambers != crate::model::SourceChambers::Both && record.source_chambers != canonical_chambers {
                record.source_chambers = canonical_chambers;
                completed_fields.push("source_chambers".to_string());
            }

            let recomputed = crate::validator::validate(record, crate::validator::ValidationLevel::Standard).quality_score;
            if recomputed != record.data_quality_score {
                record.data_quality_score = recomputed;
                completed_fields.push("data_quality_score".to_string());
            }
        }
    }

    CompletionEvent {
        bill_id: record.bill_id.clone(),
        event: "data_completion".to_string(),
        strategy: task.strategy,
        completed_fields,
        processing_time_ms: 0,
        quality_improvement: (record.data_quality_score - quality_before).max(0.0),
    }
}

/// Execute `tasks` against `records` in batches of `batch_size`, applying
/// each task's strategy within a short-lived per-bill transaction (§4.9).
/// `scraped_details` supplies already-fetched detail-page HTML for
/// `scrape_missing` tasks, keyed by bill id; bills with no entry are left
/// untouched by that strategy.
pub fn execute(
    tasks: &[CompletionTask],
    records: &mut std::collections::HashMap<String, BillRecord>,
    batch_size: usize,
    scraped_details: &std::collections::HashMap<String, String>,
) -> BatchCompletionResult {
    let mut result = BatchCompletionResult { total: tasks.len(), ..Default::default() };

    for batch in tasks.chunks(batch_size.max(1)) {
        for task in batch {
            let Some(record) = records.get_mut(&task.bill_id) else {
                result.skipped += 1;
                result.per_task_results.push(TaskResult {
                    task_id: task.task_id.clone(),
                    succeeded: false,
                    error: Some("bill not found in record store".to_string()),
                    event: None,
                });
                continue;
            };
            let event = apply_task(task, record, scraped_details);
            result.completed += 1;
            result.total_processing_time_ms += event.processing_time_ms;
            result.per_task_results.push(TaskResult { task_id: task.task_id.clone(), succeeded: true, error: None, event: Some(event) });
        }
    }

    result.success_rate = if result.total == 0 { 0.0 } else { result.completed as f64 / result.total as f64 };
    result
}

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 10;
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(2);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Chamber, Severity};

    fn missing_issue(bill_id: &str, field: &str) -> ValidationIssue {
        ValidationIssue {
            bill_id: bill_id.to_string(),
            field_name: Some(field.to_string()),
            kind: IssueKind::MissingRequired,
            severity: Severity::Critical,
            message: String::new(),
            current_value: String::new(),
            suggested_fix: None,
            confidence: 0.9,
        }
    }

    #[test]
    fn plan_buckets_by_bill_and_kind() {
        let issues = vec![missing_issue("217-1", "outline"), missing_issue("217-1", "title")];
        let tasks = plan(&issues);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].strategy, CompletionStrategy::ScrapeMissing);
        assert_eq!(tasks[0].priority, TaskPriority::Critical);
        assert!(tasks.iter().any(|t| t.strategy == CompletionStrategy::BulkUpdate));
    }

    #[test]
    fn execute_applies_enhance_existing() {
        let mut record = BillRecord::new("217-1", Chamber::A, 217);
        record.outline = "  full   width　　spaced   text  ".to_string();
        let mut records = std::collections::HashMap::new();
        records.insert("217-1".to_string(), record);

        let task = CompletionTask {
            task_id: "t1".into(),
            bill_id: "217-1".into(),
            strategy: CompletionStrategy::EnhanceExisting,
            target_fields: vec!["outline".into()],
            priority: TaskPriority::High,
            estimated_effort_seconds: 10,
            dependencies: vec![],
        };

        let result = execute(&[task], &mut records, DEFAULT_BATCH_SIZE, &std::collections::HashMap::new());
        assert_eq!(result.completed, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(records["217-1"].outline, "full width spaced text");
    }

    #[test]
    fn scrape_missing_fills_from_detail_page_only_when_empty() {
        let record = BillRecord::new("217-1", Chamber::A, 217);
        let mut records = std::collections::HashMap::new();
        records.insert("217-1".to_string(), record);

        let html = r#"
            <h2>概要</h2><p>デジタル社会の形成に関する基本理念を定め、国及び地方公共団体の責務を明らかにするとともに、デジタル社会の形成に関する施策の基本となる事項を定める。</p>
        "#;
        let mut scraped = std::collections::HashMap::new();
        scraped.insert("217-1".to_string(), html.to_string());

        let task = CompletionTask {
            task_id: "t1".into(),
            bill_id: "217-1".into(),
            strategy: CompletionStrategy::ScrapeMissing,
            target_fields: vec!["outline".into()],
            priority: TaskPriority::Critical,
            estimated_effort_seconds: 30,
            dependencies: vec![],
        };

        let result = execute(&[task], &mut records, DEFAULT_BATCH_SIZE, &scraped);
        assert_eq!(result.completed, 1);
        assert!(!records["217-1"].outline.is_empty());
    }

    #[test]
    fn validate_and_fix_canonicalizes_status_and_reorders_dates() {
        use chrono::Duration as ChronoDuration;
        use crate::model::{Stage, Status};

        let mut record = BillRecord::new("217-1", Chamber::A, 217);
        record.stage = Stage::Enacted;
        record.status = Status::UnderReview;
        let now = chrono::Utc::now();
        record.dates.submitted_date = Some(now);
        record.dates.committee_referral_date = Some(now - ChronoDuration::days(5));
        let mut records = std::collections::HashMap::new();
        records.insert("217-1".to_string(), record);

        let task = CompletionTask {
            task_id: "t1".into(),
            bill_id: "217-1".into(),
            strategy: CompletionStrategy::ValidateAndFix,
            target_fields: vec!["stage".into(), "submitted_date".into()],
            priority: TaskPriority::Medium,
            estimated_effort_seconds: 5,
            dependencies: vec![],
        };

        let result = execute(&[task], &mut records, DEFAULT_BATCH_SIZE, &std::collections::HashMap::new());
        assert_eq!(result.completed, 1);
        let fixed = &records["217-1"];
        assert_eq!(fixed.status, Status::Enacted);
        assert!(fixed.dates.monotonicity_violations().is_empty());
    }

    #[test]
    fn bulk_update_recomputes_quality_and_propagates_chambers() {
        use crate::model::SourceChambers;

        let mut record = BillRecord::new("217-1", Chamber::A, 217);
        record.source_chambers = SourceChambers::BOnly;
        record.data_quality_score = 0.0;
        let mut records = std::collections::HashMap::new();
        records.insert("217-1".to_string(), record);

        let task = CompletionTask {
            task_id: "t1".into(),
            bill_id: "217-1".into(),
            strategy: CompletionStrategy::BulkUpdate,
            target_fields: vec!["data_quality_score".into(), "source_chambers".into()],
            priority: TaskPriority::Low,
            estimated_effort_seconds: 2,
            dependencies: vec![],
        };

        let result = execute(&[task], &mut records, DEFAULT_BATCH_SIZE, &std::collections::HashMap::new());
        assert_eq!(result.completed, 1);
        let updated = &records["217-1"];
        assert_eq!(updated.source_chambers, SourceChambers::AOnly);
        assert_ne!(updated.data_quality_score, 0.0);
        let event = result.per_task_results[0].event.as_ref().unwrap();
        assert!(event.quality_improvement > 0.0);
    }
}
