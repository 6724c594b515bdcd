//! The approval gate: suspends actions until a human decision arrives.
//!
//! Per-daemon singleton. Waiters block on a oneshot channel keyed by
//! `(plan_id, action_id)`; the first `submit_decision` for a key wins and
//! subsequent submissions return false, so two callers never observe
//! contradictory outcomes. A timeout resolves the waiter with the
//! configured default decision (reject or skip) and a reason containing
//! "timed out".

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::oneshot;

use llmos_protocol::now_epoch;
use llmos_security::RiskLevel;

/// Decision returned to a waiting action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Reject,
    Skip,
    /// Approve with replacement params.
    Modify,
    /// Approve and auto-approve this `(module, action)` for the rest of
    /// the daemon lifetime.
    ApproveAlways,
}

impl ApprovalDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalDecision::Approve => "approve",
            ApprovalDecision::Reject => "reject",
            ApprovalDecision::Skip => "skip",
            ApprovalDecision::Modify => "modify",
            ApprovalDecision::ApproveAlways => "approve_always",
        }
    }
}

impl std::str::FromStr for ApprovalDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(ApprovalDecision::Approve),
            "reject" => Ok(ApprovalDecision::Reject),
            "skip" => Ok(ApprovalDecision::Skip),
            "modify" => Ok(ApprovalDecision::Modify),
            "approve_always" => Ok(ApprovalDecision::ApproveAlways),
            other => Err(format!("unknown approval decision '{other}'")),
        }
    }
}

/// What the gate resolves when no decision arrives in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutBehavior {
    #[default]
    Reject,
    Skip,
}

impl std::str::FromStr for TimeoutBehavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(TimeoutBehavior::Reject),
            "skip" => Ok(TimeoutBehavior::Skip),
            other => Err(format!("unknown timeout behavior '{other}'")),
        }
    }
}

/// A request published while one action is blocked on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub plan_id: String,
    pub action_id: String,
    pub module: String,
    pub action_name: String,
    pub params: Map<String, Value>,
    pub risk_level: RiskLevel,
    pub description: String,
    pub requires_approval_reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clarification_options: Vec<String>,
    pub requested_at: f64,
}

/// The human's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub decision: ApprovalDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_params: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub timestamp: f64,
}

impl ApprovalResponse {
    pub fn new(decision: ApprovalDecision) -> Self {
        ApprovalResponse {
            decision,
            modified_params: None,
            reason: None,
            approved_by: None,
            timestamp: now_epoch(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

struct PendingEntry {
    request: ApprovalRequest,
    sender: oneshot::Sender<ApprovalResponse>,
}

/// Blocks actions requiring a human decision; exposes pending requests.
pub struct ApprovalGate {
    pending: DashMap<(String, String), PendingEntry>,
    auto_approve: Mutex<HashSet<(String, String)>>,
    default_timeout: Duration,
    default_timeout_behavior: TimeoutBehavior,
}

impl ApprovalGate {
    pub fn new(default_timeout: Duration, default_timeout_behavior: TimeoutBehavior) -> Self {
        ApprovalGate {
            pending: DashMap::new(),
            auto_approve: Mutex::new(HashSet::new()),
            default_timeout,
            default_timeout_behavior,
        }
    }

    /// Number of requests currently blocked.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Blocks until a decision arrives or the gate times out.
    ///
    /// On timeout the request is withdrawn and resolved with the
    /// configured default decision; the reason contains "timed out".
    pub async fn request_approval(
        &self,
        request: ApprovalRequest,
        timeout: Option<Duration>,
        timeout_behavior: Option<TimeoutBehavior>,
    ) -> ApprovalResponse {
        let key = (request.plan_id.clone(), request.action_id.clone());
        let timeout = timeout.unwrap_or(self.default_timeout);
        let behavior = timeout_behavior.unwrap_or(self.default_timeout_behavior);

        let (sender, receiver) = oneshot::channel();
        self.pending.insert(
            key.clone(),
            PendingEntry {
                request,
                sender,
            },
        );

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(mut response)) => {
                if response.timestamp == 0.0 {
                    response.timestamp = now_epoch();
                }
                response
            }
            // Sender dropped without a decision; treat as reject.
            Ok(Err(_)) => {
                ApprovalResponse::new(ApprovalDecision::Reject)
                    .with_reason("approval channel closed without a decision")
            }
            Err(_) => {
                self.pending.remove(&key);
                let decision = match behavior {
                    TimeoutBehavior::Reject => ApprovalDecision::Reject,
                    TimeoutBehavior::Skip => ApprovalDecision::Skip,
                };
                ApprovalResponse::new(decision).with_reason(format!(
                    "approval request timed out after {:.1}s",
                    timeout.as_secs_f64()
                ))
            }
        }
    }

    /// Withdraws a pending request without resolving it (used when the
    /// waiting action is cancelled). Returns true if an entry existed.
    pub fn withdraw(&self, plan_id: &str, action_id: &str) -> bool {
        self.pending
            .remove(&(plan_id.to_string(), action_id.to_string()))
            .is_some()
    }

    /// Unblocks the waiter for `(plan_id, action_id)`.
    ///
    /// Returns false when no pending request matches — either the key is
    /// unknown or an earlier submission already won.
    pub fn submit_decision(
        &self,
        plan_id: &str,
        action_id: &str,
        response: ApprovalResponse,
    ) -> bool {
        let key = (plan_id.to_string(), action_id.to_string());
        let Some((_, entry)) = self.pending.remove(&key) else {
            return false;
        };

        if response.decision == ApprovalDecision::ApproveAlways {
            self.auto_approve
                .lock()
                .expect("auto-approve lock")
                .insert((entry.request.module.clone(), entry.request.action_name.clone()));
        }

        // A waiter that timed out between remove and send simply drops
        // the receiver; the decision still counts as applied.
        let _ = entry.sender.send(response);
        true
    }

    /// Snapshot of pending requests, optionally filtered by plan.
    pub fn get_pending(&self, plan_id: Option<&str>) -> Vec<ApprovalRequest> {
        let mut pending: Vec<ApprovalRequest> = self
            .pending
            .iter()
            .filter(|entry| plan_id.is_none_or(|p| entry.key().0 == p))
            .map(|entry| entry.value().request.clone())
            .collect();
        pending.sort_by(|a, b| a.requested_at.total_cmp(&b.requested_at));
        pending
    }

    /// Fast-path check for previously approve-always'd operations.
    pub fn is_auto_approved(&self, module: &str, action: &str) -> bool {
        self.auto_approve
            .lock()
            .expect("auto-approve lock")
            .contains(&(module.to_string(), action.to_string()))
    }

    pub fn clear_auto_approvals(&self) {
        self.auto_approve
            .lock()
            .expect("auto-approve lock")
            .clear();
    }
}
