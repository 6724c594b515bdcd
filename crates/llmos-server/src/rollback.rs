//! The rollback engine: compensating actions on failure.
//!
//! Invoked when an action fails with `on_error = rollback`. Resolves the
//! referenced compensating action within the same plan, substitutes
//! templates against the results produced so far (including the failing
//! action's partial result when present), and dispatches it through the
//! same capability interface the executor uses — but outside the DAG,
//! with bounded recursion depth. Rollback failures are logged and
//! absorbed: they never trigger further rollback and never propagate.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use llmos_protocol::{Action, Plan, TemplateResolver};

use crate::capability::CapabilityContext;
use crate::memory_store::MemoryKv;
use crate::registry::CapabilityRegistry;

/// Maximum nesting depth for compensating dispatches.
pub const MAX_ROLLBACK_DEPTH: u32 = 3;

/// Runs compensating action references on failure.
pub struct RollbackEngine {
    registry: Arc<CapabilityRegistry>,
    memory: MemoryKv,
    allow_env: bool,
}

impl RollbackEngine {
    pub fn new(registry: Arc<CapabilityRegistry>, memory: MemoryKv, allow_env: bool) -> Self {
        RollbackEngine {
            registry,
            memory,
            allow_env,
        }
    }

    /// Executes the compensating action for `failed`, if it declares one.
    ///
    /// Never returns an error; every failure mode is logged and absorbed.
    pub async fn execute(
        &self,
        plan: &Plan,
        failed: &Action,
        results: &HashMap<String, Value>,
        cancel: CancellationToken,
        depth: u32,
    ) {
        let Some(rollback) = &failed.rollback else {
            return;
        };

        if depth >= MAX_ROLLBACK_DEPTH {
            tracing::error!(
                plan_id = %plan.plan_id,
                action_id = %failed.id,
                depth,
                "rollback depth limit reached; giving up"
            );
            return;
        }

        let Some(target) = plan.get_action(&rollback.action) else {
            tracing::error!(
                plan_id = %plan.plan_id,
                action_id = %failed.id,
                rollback_action = %rollback.action,
                "rollback references an action not present in the plan"
            );
            return;
        };

        // Overrides from the rollback reference win over the target's own
        // params.
        let mut params = target.params.clone();
        for (key, value) in &rollback.params {
            params.insert(key.clone(), value.clone());
        }

        let memory = self.memory.snapshot();
        let resolver = TemplateResolver::new(results, &memory, self.allow_env);
        let params = match resolver.resolve(&params) {
            Ok(params) => params,
            Err(err) => {
                tracing::error!(
                    plan_id = %plan.plan_id,
                    action_id = %failed.id,
                    error = %err,
                    "rollback template resolution failed"
                );
                return;
            }
        };

        let capability = match self.registry.get(&target.module) {
            Ok(capability) => capability,
            Err(err) => {
                tracing::error!(
                    plan_id = %plan.plan_id,
                    action_id = %failed.id,
                    error = %err,
                    "rollback capability lookup failed"
                );
                return;
            }
        };

        let ctx = CapabilityContext::new(&plan.plan_id, &target.id, cancel)
            .with_perception(target.perception.clone());
        match capability.execute(&target.action, &params, &ctx).await {
            Ok(_) => {
                tracing::info!(
                    plan_id = %plan.plan_id,
                    action_id = %failed.id,
                    rollback_action = %target.id,
                    "rollback completed"
                );
            }
            Err(err) => {
                tracing::error!(
                    plan_id = %plan.plan_id,
                    action_id = %failed.id,
                    rollback_action = %target.id,
                    error = %err,
                    "rollback action failed; absorbed"
                );
            }
        }
    }
}
