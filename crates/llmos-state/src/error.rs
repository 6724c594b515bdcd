//! State store error types.

use thiserror::Error;

/// Errors produced by state-store operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// Underlying SQLite failure.
    #[error("state store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// A plan with the given id was not found.
    #[error("plan not found: {0}")]
    PlanNotFound(String),

    /// An action was not found in the given plan.
    #[error("action not found: plan={plan_id}, action={action_id}")]
    ActionNotFound { plan_id: String, action_id: String },

    /// Stored data violates an invariant (unparseable status, bad JSON).
    #[error("integrity error: {reason}")]
    Integrity { reason: String },
}
