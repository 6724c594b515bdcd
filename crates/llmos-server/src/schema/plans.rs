//! Plan endpoint schema types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use llmos_protocol::{ActionState, PlanStatus};
use llmos_state::PlanSummary;

/// `POST /plans` request body.
///
/// `plan` may be a JSON object or a string; strings go through the
/// repair cascade before parsing.
#[derive(Debug, Deserialize)]
pub struct SubmitPlanRequest {
    pub plan: Value,
    #[serde(default)]
    pub async_execution: bool,
}

/// `POST /plans` response.
#[derive(Debug, Serialize)]
pub struct SubmitPlanResponse {
    pub plan_id: String,
    pub status: PlanStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<ActionState>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_details: Option<Value>,
}

/// `GET /plans/{plan_id}` response: the durable projection.
#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub plan_id: String,
    pub status: PlanStatus,
    pub created_at: f64,
    pub updated_at: f64,
    pub actions: Vec<ActionState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_details: Option<Value>,
}

/// `GET /plans` query parameters.
#[derive(Debug, Deserialize)]
pub struct ListPlansQuery {
    #[serde(default)]
    pub status: Option<PlanStatus>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// `GET /plans` response.
#[derive(Debug, Serialize)]
pub struct PlanListResponse {
    pub plans: Vec<PlanSummary>,
    pub total: usize,
}
