//! Approval endpoint schema types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `POST /plans/{plan_id}/actions/{action_id}/approve` request body.
///
/// The backward-compatible boolean form (`approved: true|false`) maps to
/// approve/reject when no explicit decision is supplied.
#[derive(Debug, Deserialize)]
pub struct ApproveActionRequest {
    #[serde(default)]
    pub decision: Option<String>,
    #[serde(default)]
    pub approved: Option<bool>,
    #[serde(default)]
    pub modified_params: Option<Map<String, Value>>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub approved_by: Option<String>,
}

/// Decision acknowledgement.
#[derive(Debug, Serialize)]
pub struct ApprovalDecisionResponse {
    pub plan_id: String,
    pub action_id: String,
    pub decision: String,
    pub applied: bool,
}
