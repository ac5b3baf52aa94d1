//! HTTP edge handlers (C16): thin route bodies for the §6 endpoint
//! table, delegating to the components wired up in [`crate::AppState`].
//! The framework and its middleware stack (CORS, rate-limit headers,
//! security headers, request logging) are out of scope (§1 Non-goals);
//! this module only supplies handler bodies an external `axum::Router`
//! composition can mount.

pub mod admin;
pub mod members;
pub mod policy;

use std::sync::{Arc, LazyLock};

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use prometheus::{Encoder, IntCounterVec, Registry, TextEncoder};
use serde::Serialize;
use serde_json::json;

use crate::AppState;

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static HTTP_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let c = IntCounterVec::new(prometheus::Opts::new("diet_ingest_http_requests_total", "Total HTTP requests by route"), &["route"])
        .expect("metric definition is valid");
    REGISTRY.register(Box::new(c.clone())).expect("metric not yet registered");
    c
});

/// Build the full router over `state` (§6 endpoint table). Mounting this
/// under TLS/CORS/logging middleware is the embedding application's job.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .route("/metrics/json", get(metrics_json))
        .route("/search", post(search))
        .merge(members::router())
        .merge(policy::router())
        .merge(admin::router())
        .with_state(state)
}

pub(crate) fn success<T: Serialize>(data: T) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "data": data }))
}

pub(crate) fn failure(status: StatusCode, error: &str, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(json!({ "success": false, "error": error, "message": message })))
}

async fn health(axum::extract::State(state): axum::extract::State<Arc<AppState>>) -> impl IntoResponse {
    HTTP_REQUESTS_TOTAL.with_label_values(&["/health"]).inc();
    let health_snapshot = state.monitoring.health_snapshot();
    let all_ok = health_snapshot.values().all(|r| r.success);
    let status = if all_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, success(json!({ "healthy": all_ok, "checks": health_snapshot.len() })))
}

async fn metrics_text() -> impl IntoResponse {
    HTTP_REQUESTS_TOTAL.with_label_values(&["/metrics"]).inc();
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer).and_then(|_| String::from_utf8(buffer).map_err(|_| prometheus::Error::Msg("utf8".into())))
    {
        Ok(body) => (StatusCode::OK, body),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding error".to_string()),
    }
}

#[derive(Serialize)]
struct DashboardSnapshot {
    active_alerts: usize,
    queue_backlog: usize,
}

async fn metrics_json(axum::extract::State(state): axum::extract::State<Arc<AppState>>) -> impl IntoResponse {
    HTTP_REQUESTS_TOTAL.with_label_values(&["/metrics/json"]).inc();
    let queue_backlog: usize = state.queue.queue_stats().await.values().sum();
    success(DashboardSnapshot { active_alerts: state.monitoring.active_alerts().len(), queue_backlog })
}

#[derive(serde::Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    min_certainty: f64,
}

fn default_limit() -> usize {
    20
}

async fn search(Json(req): Json<SearchRequest>) -> impl IntoResponse {
    HTTP_REQUESTS_TOTAL.with_label_values(&["/search"]).inc();
    if req.query.trim().is_empty() {
        return failure(StatusCode::UNPROCESSABLE_ENTITY, "invalid_body", "query must not be empty").into_response();
    }
    // Mock-acceptable per §1 Non-goals/§9 design note.
    success(json!({ "results": [], "query": req.query, "limit": req.limit, "min_certainty": req.min_certainty })).into_response()
}
