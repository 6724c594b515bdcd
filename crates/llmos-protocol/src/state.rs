//! Execution state: the live, persistable record of one plan's progress.
//!
//! State transitions:
//!   Plan:   pending -> running -> completed | failed | cancelled
//!   Action: pending -> waiting -> running -> completed | failed | skipped
//!                               -> awaiting_approval (if required)
//!           failed  -> rolled_back (after the rollback engine runs)

use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plan::Plan;

/// Seconds since the Unix epoch, as stored in the state database.
pub fn now_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Lifecycle status of a whole plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl PlanStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PlanStatus::Completed | PlanStatus::Failed | PlanStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Pending => "pending",
            PlanStatus::Running => "running",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
            PlanStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for PlanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PlanStatus::Pending),
            "running" => Ok(PlanStatus::Running),
            "completed" => Ok(PlanStatus::Completed),
            "failed" => Ok(PlanStatus::Failed),
            "cancelled" => Ok(PlanStatus::Cancelled),
            other => Err(format!("unknown plan status '{other}'")),
        }
    }
}

/// Lifecycle status of a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Waiting,
    Running,
    AwaitingApproval,
    Completed,
    Failed,
    Skipped,
    RolledBack,
}

impl ActionStatus {
    /// Whether the action has settled and will not run again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ActionStatus::Completed
                | ActionStatus::Failed
                | ActionStatus::Skipped
                | ActionStatus::RolledBack
        )
    }

    /// Whether a dependent action may start once all its dependencies
    /// carry a satisfying status.
    pub fn satisfies_dependency(self) -> bool {
        matches!(self, ActionStatus::Completed | ActionStatus::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Waiting => "waiting",
            ActionStatus::Running => "running",
            ActionStatus::AwaitingApproval => "awaiting_approval",
            ActionStatus::Completed => "completed",
            ActionStatus::Failed => "failed",
            ActionStatus::Skipped => "skipped",
            ActionStatus::RolledBack => "rolled_back",
        }
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ActionStatus::Pending),
            "waiting" => Ok(ActionStatus::Waiting),
            "running" => Ok(ActionStatus::Running),
            "awaiting_approval" => Ok(ActionStatus::AwaitingApproval),
            "completed" => Ok(ActionStatus::Completed),
            "failed" => Ok(ActionStatus::Failed),
            "skipped" => Ok(ActionStatus::Skipped),
            "rolled_back" => Ok(ActionStatus::RolledBack),
            other => Err(format!("unknown action status '{other}'")),
        }
    }
}

/// Record of the human decision that unblocked an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalMetadata {
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    pub timestamp: f64,
}

/// Per-action runtime record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionState {
    pub action_id: String,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<f64>,
    /// Opaque result JSON from the capability, possibly truncated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Retry counter; first attempt is 1 once the action starts.
    #[serde(default)]
    pub attempt: u32,
    pub module: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_metadata: Option<ApprovalMetadata>,
}

impl ActionState {
    pub fn new(action_id: &str, module: &str, action: &str) -> Self {
        ActionState {
            action_id: action_id.to_string(),
            status: ActionStatus::Pending,
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
            attempt: 0,
            module: module.to_string(),
            action: action.to_string(),
            approval_metadata: None,
        }
    }
}

/// The live record of one plan's progress through the DAG.
///
/// Owned by the plan's supervisor task while it runs; the state store holds
/// a durable projection that other readers go through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub plan_id: String,
    pub plan_status: PlanStatus,
    pub created_at: f64,
    pub updated_at: f64,
    pub actions: IndexMap<String, ActionState>,
    /// Populated by the security pipeline when the plan is rejected before
    /// any action runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_details: Option<Value>,
}

impl ExecutionState {
    /// Builds the initial state for a freshly submitted plan: every action
    /// pending, plan pending.
    pub fn from_plan(plan: &Plan) -> Self {
        let now = now_epoch();
        let mut actions = IndexMap::with_capacity(plan.actions.len());
        for action in &plan.actions {
            actions.insert(
                action.id.clone(),
                ActionState::new(&action.id, &action.module, &action.action),
            );
        }
        ExecutionState {
            plan_id: plan.plan_id.clone(),
            plan_status: PlanStatus::Pending,
            created_at: now,
            updated_at: now,
            actions,
            rejection_details: None,
        }
    }

    pub fn get_action(&self, action_id: &str) -> Option<&ActionState> {
        self.actions.get(action_id)
    }

    /// True when every action has settled.
    pub fn all_terminal(&self) -> bool {
        self.actions.values().all(|a| a.status.is_terminal())
    }

    /// True when any action ended in `failed`. Skipped and rolled-back
    /// actions do not count as failures.
    pub fn any_failed(&self) -> bool {
        self.actions
            .values()
            .any(|a| a.status == ActionStatus::Failed)
    }
}
