//! Security error types.
//!
//! Every variant carries enough structure for the API layer to render a
//! machine-readable failure body: for permission errors, the exact grant
//! request the caller could issue; for scan and intent rejections, the
//! verdict and its source.

use thiserror::Error;

use crate::risk::RiskLevel;

/// Errors produced by the security subsystem.
#[derive(Debug, Clone, Error)]
pub enum SecurityError {
    /// The active permission profile does not allow this module/action.
    #[error("action '{module}.{action}' is not allowed under profile '{profile}'")]
    ProfileDenied {
        module: String,
        action: String,
        profile: String,
    },

    /// The action requires explicit user approval before execution.
    #[error("action '{action_id}' in plan '{plan_id}' requires user approval")]
    ApprovalRequired { plan_id: String, action_id: String },

    /// A required OS resource permission has not been granted.
    #[error(
        "permission '{permission}' not granted for module '{module_id}'; request it with {suggestion}"
    )]
    PermissionNotGranted {
        permission: String,
        module_id: String,
        action: String,
        risk_level: RiskLevel,
        /// The exact call the user can issue to unblock the action,
        /// e.g. `security.request_permission(filesystem.write, filesystem)`.
        suggestion: String,
    },

    /// An action exceeded its configured admission rate.
    #[error("rate limit exceeded for '{key}': max {limit} per {window}")]
    RateLimitExceeded {
        key: String,
        limit: u32,
        window: String,
    },

    /// The input scanner chain rejected the plan.
    #[error("scanner pipeline rejected plan '{plan_id}': risk={risk_score:.2}")]
    InputScanRejected {
        plan_id: String,
        risk_score: f64,
        labels: Vec<String>,
    },

    /// The intent verifier call itself failed (LLM unreachable, bad JSON).
    #[error("intent verification failed for plan '{plan_id}': {reason}")]
    IntentVerification { plan_id: String, reason: String },

    /// The intent verifier detected a threat in the plan.
    #[error("suspicious intent detected in plan '{plan_id}': {reasoning}")]
    SuspiciousIntent {
        plan_id: String,
        reasoning: String,
        threats: Vec<String>,
        risk_level: RiskLevel,
    },
}
