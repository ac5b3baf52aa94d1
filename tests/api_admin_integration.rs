use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use diet_ingest::config::Config;
use diet_ingest::queue::Priority;
use diet_ingest::AppState;

// Enqueue through the admin batch endpoint and confirm the job is both
// immediately visible via job_status on the shared queue and reflected
// in the per-lane queue stats endpoint — the HTTP edge and the queue
// it delegates to agreeing on one another's state.

#[tokio::test]
async fn enqueued_batch_job_is_visible_via_queue_stats_and_status() {
    let state = Arc::new(AppState::new(Config::from_env()));
    let app = diet_ingest::api::build_router(state.clone());

    let body = serde_json::json!({ "member_ids": ["m-1", "m-2"], "priority": "high" });
    let request = Request::builder()
        .method("POST")
        .uri("/admin/batch/member-statistics")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: Value = serde_json::from_slice(&bytes).unwrap();
    let job_ids = parsed["data"]["job_ids"].as_array().unwrap();
    assert_eq!(job_ids.len(), 2);

    let stats = state.queue.queue_stats().await;
    assert_eq!(stats.get(&Priority::High), Some(&2));

    let job_id = job_ids[0].as_str().unwrap();
    let status = state.queue.job_status(job_id).await.expect("job should be tracked");
    assert_eq!(status.job_id, job_id);

    let job_request = Request::builder().uri(format!("/admin/batch/job/{job_id}")).body(Body::empty()).unwrap();
    let job_response = app.oneshot(job_request).await.unwrap();
    assert_eq!(job_response.status(), StatusCode::OK);
}
