//! Shared storage-layer types.

use serde::{Deserialize, Serialize};

use llmos_protocol::PlanStatus;

/// One row of the plan listing: enough for an index view without loading
/// every action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSummary {
    pub plan_id: String,
    pub status: PlanStatus,
    pub created_at: f64,
    pub updated_at: f64,
}
