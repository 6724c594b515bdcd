//! Capability manifest handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::capability::ModuleManifest;
use crate::error::ApiError;
use crate::state::AppState;

/// Lists every registered capability manifest.
///
/// `GET /capabilities`
pub async fn list_capabilities(State(state): State<AppState>) -> Json<Value> {
    let manifests = state.registry.manifests();
    let total = manifests.len();
    Json(json!({"modules": manifests, "total": total}))
}

/// Returns one capability's manifest.
///
/// `GET /capabilities/{module_id}`
pub async fn get_capability(
    State(state): State<AppState>,
    Path(module_id): Path<String>,
) -> Result<Json<ModuleManifest>, ApiError> {
    let capability = state.registry.get(&module_id)?;
    Ok(Json(capability.manifest()))
}
