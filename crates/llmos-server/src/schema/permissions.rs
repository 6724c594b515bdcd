//! Permission endpoint schema types.

use serde::{Deserialize, Serialize};

use llmos_security::PermissionGrant;

/// `GET /permissions` query parameters.
#[derive(Debug, Deserialize)]
pub struct ListGrantsQuery {
    #[serde(default)]
    pub module_id: Option<String>,
}

/// `GET /permissions` response.
#[derive(Debug, Serialize)]
pub struct GrantListResponse {
    pub grants: Vec<PermissionGrant>,
    pub total: usize,
}

/// `POST /permissions/grant` request body.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub permission: String,
    pub module_id: String,
    /// "session" (default) or "permanent".
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub granted_by: Option<String>,
    /// Optional time-to-live in seconds.
    #[serde(default)]
    pub expires_in_seconds: Option<u64>,
}

/// `POST /permissions/revoke` request body.
#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub permission: String,
    pub module_id: String,
}
