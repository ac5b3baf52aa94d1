use std::time::Duration;

use diet_ingest::queue::{JobState, Priority, TaskQueue};
use serde_json::{json, Value};

// Jobs enqueued out of order across all four lanes still drain in strict
// priority order end to end, and a failing job's status is observable
// through the same polling path a caller would use.

#[tokio::test]
async fn strict_priority_drains_regardless_of_enqueue_order() {
    let queue = TaskQueue::new();
    queue.enqueue("low", json!({}), Priority::Low, Duration::from_secs(5)).await;
    queue.enqueue("urgent", json!({}), Priority::Urgent, Duration::from_secs(5)).await;
    queue.enqueue("normal", json!({}), Priority::Normal, Duration::from_secs(5)).await;
    queue.enqueue("high", json!({}), Priority::High, Duration::from_secs(5)).await;

    let mut order = Vec::new();
    for _ in 0..4 {
        let status = queue.run_next(|payload: Value| async move { Ok(payload) }).await.expect("job available");
        order.push(status.description);
    }

    assert_eq!(order, vec!["urgent", "high", "normal", "low"]);
}

#[tokio::test]
async fn failed_job_status_is_visible_after_run() {
    let queue = TaskQueue::new();
    let job_id = queue.enqueue("will-fail", json!({}), Priority::Normal, Duration::from_secs(5)).await;

    let finished = queue.run_next(|_: Value| async move { Err("boom".to_string()) }).await.expect("job available");
    assert_eq!(finished.job_id, job_id);
    assert_eq!(finished.state, JobState::Failed);

    let status = queue.job_status(&job_id).await.expect("status tracked");
    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.exc_info.as_deref(), Some("boom"));
}
