//! Audit event introspection handlers.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecentEventsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

/// Returns the most recent audit events, oldest first.
///
/// `GET /events/recent`
pub async fn recent_events(
    State(state): State<AppState>,
    Query(query): Query<RecentEventsQuery>,
) -> Json<Value> {
    let events = state.events.recent(query.limit.clamp(1, 1000));
    let total = events.len();
    Json(json!({"events": events, "total": total}))
}
