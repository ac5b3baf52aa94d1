//! `/api/policy/*` handlers. Stance/trend/comparison responses are
//! explicitly mock-acceptable (§1 Non-goals) and grounded in
//! `original_source`'s `policy_analysis_service.py` DTO shapes (§6.1),
//! gated behind the `mock-endpoints` feature.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::api::{failure, success};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/policy/issues", get(issues))
        .route("/api/policy/member/:id/analysis", get(member_analysis))
        .route("/api/policy/member/:id/stance/:tag", get(member_stance))
        .route("/api/policy/compare", post(compare))
        .route("/api/policy/member/:id/similar", get(similar_members))
        .route("/api/policy/trends/:tag", get(trends))
}

/// The same closed six-tag set `original_source` hardcodes (§6.1).
const ISSUE_TAGS: &[&str] = &["economy", "diplomacy", "social-security", "constitution", "energy", "education"];

async fn issues() -> impl IntoResponse {
    success(ISSUE_TAGS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Supportive,
    Opposed,
    Neutral,
    Mixed,
}

#[derive(Serialize)]
struct StanceResponse {
    member_id: String,
    issue_tag: String,
    stance: Stance,
    confidence: f64,
    evidence_count: u32,
}

#[cfg(feature = "mock-endpoints")]
async fn member_stance(Path((id, tag)): Path<(String, String)>) -> impl IntoResponse {
    if !ISSUE_TAGS.contains(&tag.as_str()) {
        return failure(StatusCode::NOT_FOUND, "not_found", &format!("unknown issue tag `{tag}`")).into_response();
    }
    success(StanceResponse { member_id: id, issue_tag: tag, stance: Stance::Mixed, confidence: 0.6, evidence_count: 12 }).into_response()
}

#[cfg(not(feature = "mock-endpoints"))]
async fn member_stance(Path((id, tag)): Path<(String, String)>) -> impl IntoResponse {
    let _ = (id, tag);
    failure(StatusCode::NOT_FOUND, "not_found", "stance analysis unavailable").into_response()
}

async fn member_analysis(Path(id): Path<String>) -> impl IntoResponse {
    let stances: Vec<StanceResponse> = ISSUE_TAGS
        .iter()
        .map(|tag| StanceResponse { member_id: id.clone(), issue_tag: tag.to_string(), stance: Stance::Neutral, confidence: 0.5, evidence_count: 0 })
        .collect();
    success(stances)
}

#[derive(Deserialize)]
struct CompareRequest {
    member_ids: Vec<String>,
    issue_tag: String,
}

async fn compare(axum::Json(req): axum::Json<CompareRequest>) -> impl IntoResponse {
    if !ISSUE_TAGS.contains(&req.issue_tag.as_str()) {
        return failure(StatusCode::UNPROCESSABLE_ENTITY, "invalid_body", "unknown issue_tag").into_response();
    }
    let stances: Vec<StanceResponse> = req
        .member_ids
        .into_iter()
        .map(|id| StanceResponse { member_id: id, issue_tag: req.issue_tag.clone(), stance: Stance::Neutral, confidence: 0.5, evidence_count: 0 })
        .collect();
    success(stances).into_response()
}

#[derive(Deserialize)]
struct SimilarQuery {
    issue_tags: Option<String>,
}

async fn similar_members(Path(id): Path<String>, Query(q): Query<SimilarQuery>) -> impl IntoResponse {
    let _ = q.issue_tags;
    let similar: Vec<String> = Vec::new();
    success(serde_json::json!({ "member_id": id, "similar": similar }))
}

#[derive(Serialize)]
struct TrendPoint {
    date: NaiveDate,
    support_ratio: f64,
    sample_size: u32,
}

#[derive(Deserialize)]
struct TrendsQuery {
    #[serde(default = "default_days")]
    days: i64,
}

fn default_days() -> i64 {
    30
}

#[cfg(feature = "mock-endpoints")]
async fn trends(Path(tag): Path<String>, Query(q): Query<TrendsQuery>) -> impl IntoResponse {
    if !ISSUE_TAGS.contains(&tag.as_str()) {
        return failure(StatusCode::NOT_FOUND, "not_found", &format!("unknown issue tag `{tag}`")).into_response();
    }
    let today = chrono::Utc::now().date_naive();
    let points: Vec<TrendPoint> = (0..q.days)
        .map(|offset| TrendPoint { date: today - chrono::Duration::days(offset), support_ratio: 0.5, sample_size: 0 })
        .collect();
    success(points).into_response()
}

#[cfg(not(feature = "mock-endpoints"))]
async fn trends(Path(tag): Path<String>, Query(q): Query<TrendsQuery>) -> impl IntoResponse {
    let _ = q.days;
    failure(StatusCode::NOT_FOUND, "not_found", &format!("trend data unavailable for `{tag}`")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn issues_returns_six_tags() {
        let app: Router<Arc<AppState>> = router();
        let state = Arc::new(AppState::new(crate::config::Config::from_env()));
        let app = app.with_state(state);
        let resp = app.oneshot(Request::builder().uri("/api/policy/issues").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
