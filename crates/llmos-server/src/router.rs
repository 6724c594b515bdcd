//! Router assembly for the LLMOS Bridge HTTP API.
//!
//! [`build_router`] wires all handler functions to their routes with CORS
//! and tracing middleware layers. Routes use axum 0.8 `/{param}` path
//! syntax.

use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Builds the complete axum router with all API routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Plans
        .route(
            "/plans",
            get(handlers::plans::list_plans).post(handlers::plans::submit_plan),
        )
        .route(
            "/plans/{plan_id}",
            get(handlers::plans::get_plan).delete(handlers::plans::cancel_plan),
        )
        // Approvals
        .route(
            "/plans/{plan_id}/actions/{action_id}/approve",
            post(handlers::approvals::approve_action),
        )
        .route(
            "/plans/{plan_id}/pending-approvals",
            get(handlers::approvals::pending_approvals),
        )
        // Capability manifests
        .route("/capabilities", get(handlers::capabilities::list_capabilities))
        .route(
            "/capabilities/{module_id}",
            get(handlers::capabilities::get_capability),
        )
        // Permission grants
        .route("/permissions", get(handlers::permissions::list_grants))
        .route(
            "/permissions/grant",
            post(handlers::permissions::grant_permission),
        )
        .route(
            "/permissions/revoke",
            post(handlers::permissions::revoke_permission),
        )
        // Threat categories
        .route(
            "/security/threat-categories",
            get(handlers::security::list_categories)
                .post(handlers::security::register_category),
        )
        .route(
            "/security/threat-categories/{id}/enable",
            post(handlers::security::enable_category),
        )
        .route(
            "/security/threat-categories/{id}/disable",
            post(handlers::security::disable_category),
        )
        // Audit events
        .route("/events/recent", get(handlers::events::recent_events))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
