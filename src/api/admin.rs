//! `/admin/*` handlers: ingestion kickoff, cache warmup/stats, and batch
//! job management, delegating to C1/C12/C13 (§6 endpoint table).

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::api::{failure, success};
use crate::queue::Priority;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/members/collect", post(collect))
        .route("/admin/cache/warmup", post(cache_warmup))
        .route("/admin/cache/stats", get(cache_stats))
        .route("/admin/batch/member-statistics", post(batch_member_statistics))
        .route("/admin/batch/policy-stance", post(batch_policy_stance))
        .route("/admin/batch/job/:id", get(batch_job))
        .route("/admin/batch/queues", get(batch_queues))
        .route("/admin/batch/failed-jobs", get(failed_jobs))
}

#[derive(Deserialize)]
struct CollectRequest {
    house: String,
}

async fn collect(State(state): State<Arc<AppState>>, axum::Json(req): axum::Json<CollectRequest>) -> impl IntoResponse {
    let job_id = state.queue.enqueue(format!("collect:{}", req.house), json!({ "house": req.house }), Priority::Normal, Duration::from_secs(600)).await;
    success(json!({ "job_id": job_id }))
}

async fn cache_warmup(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    // The member directory to warm from is owned by the external record
    // store (§1 Non-goals); with none wired in this is a no-op success.
    success(json!({ "warmed": 0 }))
}

async fn cache_stats(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    success(json!({ "backend": "in-memory" }))
}

#[derive(Deserialize)]
struct BatchMemberStatsRequest {
    member_ids: Vec<String>,
    #[serde(default = "default_priority")]
    priority: Priority,
}

#[derive(Deserialize)]
struct BatchPolicyStanceRequest {
    member_ids: Vec<String>,
    issue_tag: String,
    #[serde(default = "default_priority")]
    priority: Priority,
}

fn default_priority() -> Priority {
    Priority::Normal
}

async fn batch_member_statistics(State(state): State<Arc<AppState>>, axum::Json(req): axum::Json<BatchMemberStatsRequest>) -> impl IntoResponse {
    let mut job_ids = Vec::with_capacity(req.member_ids.len());
    for member_id in &req.member_ids {
        job_ids.push(state.queue.enqueue(format!("member-statistics:{member_id}"), json!({ "member_id": member_id }), req.priority, Duration::from_secs(60)).await);
    }
    success(json!({ "batch_id": uuid::Uuid::new_v4().to_string(), "job_ids": job_ids, "total": job_ids.len() }))
}

async fn batch_policy_stance(State(state): State<Arc<AppState>>, axum::Json(req): axum::Json<BatchPolicyStanceRequest>) -> impl IntoResponse {
    let mut job_ids = Vec::with_capacity(req.member_ids.len());
    for member_id in &req.member_ids {
        job_ids.push(
            state
                .queue
                .enqueue(format!("policy-stance:{member_id}:{}", req.issue_tag), json!({ "member_id": member_id, "issue_tag": req.issue_tag }), req.priority, Duration::from_secs(60))
                .await,
        );
    }
    success(json!({ "batch_id": uuid::Uuid::new_v4().to_string(), "job_ids": job_ids, "total": job_ids.len() }))
}

async fn batch_job(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    match state.queue.job_status(&id).await {
        Some(status) => success(status).into_response(),
        None => failure(StatusCode::NOT_FOUND, "not_found", &format!("job `{id}` not found")).into_response(),
    }
}

async fn batch_queues(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.queue.queue_stats().await;
    success(json!({ "queues": stats.iter().map(|(p, n)| (format!("{p:?}"), n)).collect::<std::collections::HashMap<_, _>>() }))
}

#[derive(Deserialize)]
struct FailedJobsQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    20
}

async fn failed_jobs(State(state): State<Arc<AppState>>, axum::extract::Query(q): axum::extract::Query<FailedJobsQuery>) -> impl IntoResponse {
    success(state.queue.failed_jobs(q.limit).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn batch_queues_returns_four_lanes() {
        let app: Router<Arc<AppState>> = router();
        let state = Arc::new(AppState::new(crate::config::Config::from_env()));
        let app = app.with_state(state);
        let resp = app.oneshot(Request::builder().uri("/admin/batch/queues").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_job_returns_404() {
        let app: Router<Arc<AppState>> = router();
        let state = Arc::new(AppState::new(crate::config::Config::from_env()));
        let app = app.with_state(state);
        let resp = app.oneshot(Request::builder().uri("/admin/batch/job/does-not-exist").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
