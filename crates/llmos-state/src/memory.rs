//! In-memory implementation of [`StateStore`].
//!
//! [`MemoryStore`] is a first-class backend for tests and ephemeral
//! sessions. It stores plans and grants in HashMaps with identical
//! semantics to the SQLite backend.

use std::collections::HashMap;

use serde_json::Value;

use llmos_protocol::{now_epoch, ActionState, ExecutionState, PlanStatus};
use llmos_security::{PermissionGrant, PermissionScope};

use crate::error::StateError;
use crate::traits::StateStore;
use crate::types::PlanSummary;

/// HashMap-backed store with SQLite-equivalent semantics.
#[derive(Default)]
pub struct MemoryStore {
    plans: HashMap<String, ExecutionState>,
    grants: HashMap<(String, String), PermissionGrant>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn create_plan(&mut self, state: &ExecutionState) -> Result<(), StateError> {
        self.plans.insert(state.plan_id.clone(), state.clone());
        Ok(())
    }

    fn update_plan_status(&mut self, plan_id: &str, status: PlanStatus) -> Result<(), StateError> {
        let plan = self
            .plans
            .get_mut(plan_id)
            .ok_or_else(|| StateError::PlanNotFound(plan_id.to_string()))?;
        plan.plan_status = status;
        plan.updated_at = now_epoch();
        Ok(())
    }

    fn set_rejection_details(&mut self, plan_id: &str, details: &Value) -> Result<(), StateError> {
        let plan = self
            .plans
            .get_mut(plan_id)
            .ok_or_else(|| StateError::PlanNotFound(plan_id.to_string()))?;
        plan.rejection_details = Some(details.clone());
        plan.updated_at = now_epoch();
        Ok(())
    }

    fn update_action(&mut self, plan_id: &str, action: &ActionState) -> Result<(), StateError> {
        let plan = self
            .plans
            .get_mut(plan_id)
            .ok_or_else(|| StateError::PlanNotFound(plan_id.to_string()))?;
        let slot = plan.actions.get_mut(&action.action_id).ok_or_else(|| {
            StateError::ActionNotFound {
                plan_id: plan_id.to_string(),
                action_id: action.action_id.clone(),
            }
        })?;
        *slot = action.clone();
        plan.updated_at = now_epoch();
        Ok(())
    }

    fn get_plan(&self, plan_id: &str) -> Result<Option<ExecutionState>, StateError> {
        Ok(self.plans.get(plan_id).cloned())
    }

    fn list_plans(
        &self,
        status: Option<PlanStatus>,
        limit: usize,
    ) -> Result<Vec<PlanSummary>, StateError> {
        let mut summaries: Vec<PlanSummary> = self
            .plans
            .values()
            .filter(|p| status.is_none_or(|s| p.plan_status == s))
            .map(|p| PlanSummary {
                plan_id: p.plan_id.clone(),
                status: p.plan_status,
                created_at: p.created_at,
                updated_at: p.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.total_cmp(&a.created_at));
        summaries.truncate(limit);
        Ok(summaries)
    }

    fn purge_terminal_older_than(&mut self, max_age_seconds: f64) -> Result<usize, StateError> {
        let cutoff = now_epoch() - max_age_seconds;
        let before = self.plans.len();
        self.plans
            .retain(|_, p| !p.plan_status.is_terminal() || p.updated_at >= cutoff);
        Ok(before - self.plans.len())
    }

    fn upsert_grant(&mut self, grant: &PermissionGrant) -> Result<(), StateError> {
        self.grants.insert(
            (grant.permission.clone(), grant.module_id.clone()),
            grant.clone(),
        );
        Ok(())
    }

    fn revoke_grant(&mut self, permission: &str, module_id: &str) -> Result<bool, StateError> {
        Ok(self
            .grants
            .remove(&(permission.to_string(), module_id.to_string()))
            .is_some())
    }

    fn revoke_all_for_module(&mut self, module_id: &str) -> Result<usize, StateError> {
        let before = self.grants.len();
        self.grants.retain(|(_, module), _| module != module_id);
        Ok(before - self.grants.len())
    }

    fn clear_session_grants(&mut self) -> Result<usize, StateError> {
        let before = self.grants.len();
        self.grants
            .retain(|_, grant| grant.scope != PermissionScope::Session);
        Ok(before - self.grants.len())
    }

    fn get_grant(
        &mut self,
        permission: &str,
        module_id: &str,
    ) -> Result<Option<PermissionGrant>, StateError> {
        let key = (permission.to_string(), module_id.to_string());
        match self.grants.get(&key) {
            Some(grant) if grant.is_expired() => {
                self.grants.remove(&key);
                Ok(None)
            }
            other => Ok(other.cloned()),
        }
    }

    fn list_grants(&mut self, module_id: Option<&str>) -> Result<Vec<PermissionGrant>, StateError> {
        self.grants.retain(|_, grant| !grant.is_expired());
        let mut grants: Vec<PermissionGrant> = self
            .grants
            .values()
            .filter(|g| module_id.is_none_or(|m| g.module_id == m))
            .cloned()
            .collect();
        grants.sort_by(|a, b| b.granted_at.total_cmp(&a.granted_at));
        Ok(grants)
    }
}
