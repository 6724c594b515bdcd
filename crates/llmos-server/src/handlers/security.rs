//! Threat category registry handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use llmos_security::ThreatCategory;

use crate::error::ApiError;
use crate::schema::security::{CategoryListResponse, RegisterCategoryRequest};
use crate::state::AppState;

/// Lists all threat categories (built-in + custom).
///
/// `GET /security/threat-categories`
pub async fn list_categories(State(state): State<AppState>) -> Json<CategoryListResponse> {
    let categories = state.categories.list_all();
    let total = categories.len();
    Json(CategoryListResponse { categories, total })
}

/// Registers a custom threat category.
///
/// `POST /security/threat-categories`
pub async fn register_category(
    State(state): State<AppState>,
    Json(body): Json<RegisterCategoryRequest>,
) -> Result<Json<Value>, ApiError> {
    if body.id.trim().is_empty() || body.description.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "category id and description must not be empty".to_string(),
        ));
    }
    if state
        .categories
        .get(&body.id)
        .is_some_and(|existing| existing.builtin)
    {
        return Err(ApiError::Conflict(format!(
            "category '{}' is built-in and cannot be replaced",
            body.id
        )));
    }

    state.categories.register(ThreatCategory {
        id: body.id.clone(),
        name: body.name,
        description: body.description,
        threat_type: body.threat_type,
        enabled: true,
        builtin: false,
    });
    Ok(Json(json!({"success": true, "id": body.id})))
}

/// Enables a category.
///
/// `POST /security/threat-categories/{id}/enable`
pub async fn enable_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    set_enabled(&state, &id, true)
}

/// Disables a category.
///
/// `POST /security/threat-categories/{id}/disable`
pub async fn disable_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    set_enabled(&state, &id, false)
}

fn set_enabled(state: &AppState, id: &str, enabled: bool) -> Result<Json<Value>, ApiError> {
    if !state.categories.set_enabled(id, enabled) {
        return Err(ApiError::NotFound(format!("category '{id}' not found")));
    }
    Ok(Json(json!({"success": true, "id": id, "enabled": enabled})))
}
