//! The [`StateStore`] trait defining the persistence contract.
//!
//! The trait is synchronous; callers in the async server wrap a store in a
//! mutex and treat each call as one suspension point. All backends
//! (SqliteStore, MemoryStore) implement identical semantics so they are
//! fully swappable.

use serde_json::Value;

use llmos_protocol::{ActionState, ExecutionState, PlanStatus};
use llmos_security::PermissionGrant;

use crate::error::StateError;
use crate::types::PlanSummary;

/// Persistence contract for execution state and permission grants.
pub trait StateStore: Send {
    // -------------------------------------------------------------------
    // Plans and actions
    // -------------------------------------------------------------------

    /// Persists a freshly created execution state (plan row + one row per
    /// action).
    fn create_plan(&mut self, state: &ExecutionState) -> Result<(), StateError>;

    /// Updates a plan's status, bumping `updated_at`.
    fn update_plan_status(&mut self, plan_id: &str, status: PlanStatus) -> Result<(), StateError>;

    /// Attaches security rejection details to a plan.
    fn set_rejection_details(&mut self, plan_id: &str, details: &Value) -> Result<(), StateError>;

    /// Writes one action's full runtime record.
    fn update_action(&mut self, plan_id: &str, action: &ActionState) -> Result<(), StateError>;

    /// Loads the durable projection of a plan, or `None` when unknown.
    fn get_plan(&self, plan_id: &str) -> Result<Option<ExecutionState>, StateError>;

    /// Lists plans, newest first, optionally filtered by status.
    fn list_plans(
        &self,
        status: Option<PlanStatus>,
        limit: usize,
    ) -> Result<Vec<PlanSummary>, StateError>;

    /// Deletes terminal plans whose last update is older than
    /// `max_age_seconds`. Running (non-terminal) plans are never purged
    /// regardless of age. Returns the number of plans removed.
    fn purge_terminal_older_than(&mut self, max_age_seconds: f64) -> Result<usize, StateError>;

    // -------------------------------------------------------------------
    // Permission grants
    // -------------------------------------------------------------------

    /// Stores a grant (insert or replace on the composite key).
    fn upsert_grant(&mut self, grant: &PermissionGrant) -> Result<(), StateError>;

    /// Removes a specific grant. Returns true if a row was deleted.
    fn revoke_grant(&mut self, permission: &str, module_id: &str) -> Result<bool, StateError>;

    /// Removes all grants for a module. Returns the number deleted.
    fn revoke_all_for_module(&mut self, module_id: &str) -> Result<usize, StateError>;

    /// Removes all session-scoped grants (called on daemon startup).
    /// Returns the number cleared.
    fn clear_session_grants(&mut self) -> Result<usize, StateError>;

    /// Retrieves a grant, lazily deleting it when expired.
    fn get_grant(
        &mut self,
        permission: &str,
        module_id: &str,
    ) -> Result<Option<PermissionGrant>, StateError>;

    /// Lists non-expired grants, optionally for one module, lazily
    /// deleting any expired rows encountered.
    fn list_grants(&mut self, module_id: Option<&str>) -> Result<Vec<PermissionGrant>, StateError>;
}
