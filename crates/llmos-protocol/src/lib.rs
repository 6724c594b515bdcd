pub mod correction;
pub mod error;
pub mod migration;
pub mod parser;
pub mod plan;
pub mod repair;
pub mod state;
pub mod template;
pub mod validate;

// Re-export commonly used types
pub use correction::CorrectionFeedback;
pub use error::{ProtocolError, ValidationIssue};
pub use migration::{MigrationPipeline, MigrationRegistry};
pub use parser::PlanParser;
pub use plan::{
    Action, OnErrorPolicy, Plan, RollbackRef, DEFAULT_ACTION_TIMEOUT_SECS, LEGACY_VERSION,
    PROTOCOL_VERSION,
};
pub use repair::{repair, RepairResult};
pub use state::{
    now_epoch, ActionState, ActionStatus, ApprovalMetadata, ExecutionState, PlanStatus,
};
pub use template::TemplateResolver;
pub use validate::validate;
