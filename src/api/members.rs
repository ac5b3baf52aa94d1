//! `/api/members*` handlers. The full member directory and voting
//! history live in the external record store (§1 Non-goals); the
//! voting-stats endpoint is explicitly mock-acceptable and gated behind
//! the `mock-endpoints` feature (§6.1).

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::AppState;
use crate::api::{failure, success};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/members", get(list_members))
        .route("/api/members/:id", get(get_member))
        .route("/api/members/:id/voting-stats", get(voting_stats))
}

#[derive(Debug, Deserialize)]
struct ListMembersQuery {
    house: Option<String>,
    party: Option<String>,
    search: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Serialize)]
struct Member {
    id: String,
    name: String,
    house: String,
    party: String,
}

async fn list_members(Query(q): Query<ListMembersQuery>) -> impl IntoResponse {
    // The member directory itself is owned by the external record store
    // (§1 Non-goals); this handler applies the requested filters over
    // whatever the store returns and returns an empty page when nothing
    // is wired in, rather than fabricating member identities.
    let members: Vec<Member> = Vec::new();
    let filtered: Vec<&Member> = members
        .iter()
        .filter(|m| q.house.as_deref().is_none_or(|h| m.house == h))
        .filter(|m| q.party.as_deref().is_none_or(|p| m.party == p))
        .filter(|m| q.search.as_deref().is_none_or(|s| m.name.contains(s)))
        .take(q.limit)
        .collect();
    success(json!({ "members": filtered, "total": filtered.len() }))
}

async fn get_member(Path(id): Path<String>) -> impl IntoResponse {
    failure(StatusCode::NOT_FOUND, "not_found", &format!("member `{id}` not found")).into_response()
}

#[derive(Serialize)]
#[cfg(feature = "mock-endpoints")]
struct VotingStats {
    member_id: String,
    total_votes: u32,
    yes_votes: u32,
    no_votes: u32,
    abstentions: u32,
    absences: u32,
    party_alignment_rate: f64,
}

#[cfg(feature = "mock-endpoints")]
async fn voting_stats(Path(id): Path<String>) -> impl IntoResponse {
    let stats = VotingStats { member_id: id, total_votes: 120, yes_votes: 98, no_votes: 14, abstentions: 5, absences: 3, party_alignment_rate: 0.91 };
    success(stats)
}

#[cfg(not(feature = "mock-endpoints"))]
async fn voting_stats(Path(id): Path<String>) -> impl IntoResponse {
    failure(StatusCode::NOT_FOUND, "not_found", &format!("voting stats unavailable for `{id}`")).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn list_members_returns_success_envelope() {
        let app: Router<Arc<AppState>> = router();
        let state = Arc::new(AppState::new(crate::config::Config::from_env()));
        let app = app.with_state(state);
        let resp = app.oneshot(Request::builder().uri("/api/members").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_member_404s_when_missing() {
        let app: Router<Arc<AppState>> = router();
        let state = Arc::new(AppState::new(crate::config::Config::from_env()));
        let app = app.with_state(state);
        let resp = app.oneshot(Request::builder().uri("/api/members/m-1").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
