//! Permission grant management handlers.

use axum::extract::{Query, State};
use axum::Json;
use serde_json::{json, Value};

use llmos_protocol::now_epoch;
use llmos_security::PermissionScope;

use crate::error::ApiError;
use crate::schema::permissions::{
    GrantListResponse, GrantRequest, ListGrantsQuery, RevokeRequest,
};
use crate::state::AppState;

/// Lists active grants.
///
/// `GET /permissions`
pub async fn list_grants(
    State(state): State<AppState>,
    Query(query): Query<ListGrantsQuery>,
) -> Result<Json<GrantListResponse>, ApiError> {
    let grants = state
        .permissions
        .list_grants(query.module_id.as_deref())
        .await?;
    let total = grants.len();
    Ok(Json(GrantListResponse { grants, total }))
}

/// Grants a permission to a module.
///
/// `POST /permissions/grant`
pub async fn grant_permission(
    State(state): State<AppState>,
    Json(body): Json<GrantRequest>,
) -> Result<Json<Value>, ApiError> {
    let scope: PermissionScope = body
        .scope
        .as_deref()
        .unwrap_or("session")
        .parse()
        .map_err(ApiError::BadRequest)?;

    let grant = state
        .permissions
        .grant(
            &body.permission,
            &body.module_id,
            scope,
            body.granted_by.as_deref().unwrap_or("user"),
            body.reason.as_deref().unwrap_or(""),
            body.expires_in_seconds
                .map(|ttl| now_epoch() + ttl as f64),
        )
        .await?;

    Ok(Json(json!({"success": true, "grant": grant})))
}

/// Revokes a grant.
///
/// `POST /permissions/revoke`
pub async fn revoke_permission(
    State(state): State<AppState>,
    Json(body): Json<RevokeRequest>,
) -> Result<Json<Value>, ApiError> {
    let revoked = state
        .permissions
        .revoke(&body.permission, &body.module_id)
        .await?;
    if !revoked {
        return Err(ApiError::NotFound(format!(
            "no grant of '{}' for module '{}'",
            body.permission, body.module_id
        )));
    }
    Ok(Json(json!({"success": true})))
}
