//! The plan executor: runs one execution state through to a terminal
//! status.
//!
//! Each plan runs as one supervising task that owns the
//! [`ExecutionState`]; every ready action runs as a child task. Children
//! report transitions over an mpsc completion channel, so the supervisor
//! is the single writer of execution state and recomputes the ready set
//! as each child terminates. Branch parallelism is bounded by a per-plan
//! cap and a process-wide semaphore; ready actions above either cap wait
//! in a FIFO queue.
//!
//! Actions referenced as rollback targets are excluded from the DAG walk:
//! they exist as compensating templates for the rollback engine and end
//! the plan as skipped unless rollback dispatched them.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use llmos_protocol::{
    now_epoch, Action, ActionStatus, ApprovalMetadata, ExecutionState, OnErrorPolicy, Plan,
    PlanStatus, TemplateResolver,
};

use crate::approval::{ApprovalDecision, ApprovalGate, ApprovalRequest};
use crate::capability::{CapabilityContext, CapabilityError};
use crate::config::ServerConfig;
use crate::events::{AuditEvent, AuditEventKind, EventBus};
use crate::memory_store::MemoryKv;
use crate::permissions::{PermissionManager, SharedStore};
use crate::pipeline::{PipelineDecision, SecurityPipeline};
use crate::registry::CapabilityRegistry;
use crate::rollback::RollbackEngine;

/// What one attempt of an action produced.
#[derive(Debug)]
enum AttemptOutcome {
    Completed(Value),
    Skipped { reason: Option<String> },
    Failed { error: String },
}

/// Transition messages from child tasks to the supervising task.
#[derive(Debug)]
enum ChildMsg {
    Started {
        action_id: String,
    },
    AwaitingApproval {
        action_id: String,
    },
    ApprovalDecided {
        action_id: String,
        metadata: ApprovalMetadata,
    },
    Finished {
        action_id: String,
        outcome: AttemptOutcome,
    },
}

/// Orchestrates validation survivors across a dependency DAG.
pub struct PlanExecutor {
    config: ServerConfig,
    store: SharedStore,
    registry: Arc<CapabilityRegistry>,
    gate: Arc<ApprovalGate>,
    permissions: Arc<PermissionManager>,
    events: Arc<EventBus>,
    pipeline: Arc<SecurityPipeline>,
    rollback: Arc<RollbackEngine>,
    memory: MemoryKv,
    /// Process-wide concurrency cap shared by all plans.
    global_slots: Arc<Semaphore>,
}

impl PlanExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ServerConfig,
        store: SharedStore,
        registry: Arc<CapabilityRegistry>,
        gate: Arc<ApprovalGate>,
        permissions: Arc<PermissionManager>,
        events: Arc<EventBus>,
        pipeline: Arc<SecurityPipeline>,
        rollback: Arc<RollbackEngine>,
        memory: MemoryKv,
    ) -> Self {
        let global_slots = Arc::new(Semaphore::new(config.max_concurrent_actions));
        PlanExecutor {
            config,
            store,
            registry,
            gate,
            permissions,
            events,
            pipeline,
            rollback,
            memory,
            global_slots,
        }
    }

    /// Runs a validated plan to a terminal status.
    ///
    /// `cancel` is the plan's cooperative cancellation token; triggering
    /// it drives the plan to `cancelled` within the configured grace
    /// period.
    pub async fn run(&self, plan: Plan, cancel: CancellationToken) -> ExecutionState {
        // A plan-level timeout rides the same cancellation path.
        let cancel = match plan.timeout_seconds {
            Some(secs) => {
                let combined = cancel.child_token();
                let timer = combined.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
                    timer.cancel();
                });
                combined
            }
            None => cancel,
        };

        let plan = Arc::new(plan);
        let mut state = ExecutionState::from_plan(&plan);
        self.events
            .emit(AuditEvent::plan(AuditEventKind::PlanSubmitted, &plan.plan_id));

        // Security pipeline runs before anything is scheduled or stored.
        match self.pipeline.run(&plan).await {
            PipelineDecision::Reject(details) => {
                return self.reject_plan(state, *details).await;
            }
            PipelineDecision::Proceed { warnings } => {
                for warning in warnings {
                    tracing::warn!(plan_id = %plan.plan_id, "{warning}");
                }
            }
        }

        if let Err(err) = self.persist_create(&state).await {
            tracing::error!(plan_id = %plan.plan_id, error = %err, "state store create failed");
            state.plan_status = PlanStatus::Failed;
            return state;
        }

        state.plan_status = PlanStatus::Running;
        self.persist_plan_status(&state).await;
        self.events
            .emit(AuditEvent::plan(AuditEventKind::PlanStarted, &plan.plan_id));

        self.walk_dag(&plan, &mut state, cancel).await;

        let kind = match state.plan_status {
            PlanStatus::Completed => AuditEventKind::PlanCompleted,
            PlanStatus::Cancelled => AuditEventKind::PlanCancelled,
            _ => AuditEventKind::PlanFailed,
        };
        self.persist_plan_status(&state).await;
        self.events.emit(AuditEvent::plan(kind, &plan.plan_id));
        state
    }

    /// Security rejection: the plan fails before any ActionState exists.
    async fn reject_plan(
        &self,
        mut state: ExecutionState,
        details: llmos_security::RejectionDetails,
    ) -> ExecutionState {
        state.actions.clear();
        state.plan_status = PlanStatus::Failed;
        state.rejection_details = serde_json::to_value(&details).ok();
        if let Err(err) = self.persist_create(&state).await {
            tracing::error!(plan_id = %state.plan_id, error = %err, "state store create failed");
        }
        self.events
            .emit(AuditEvent::plan(AuditEventKind::PlanFailed, &state.plan_id).with_detail(
                json!({"rejected_by": details.source}),
            ));
        state
    }

    // -------------------------------------------------------------------
    // DAG walk
    // -------------------------------------------------------------------

    async fn walk_dag(&self, plan: &Arc<Plan>, state: &mut ExecutionState, cancel: CancellationToken) {
        // Actions referenced as rollback targets never join the DAG walk.
        let rollback_only: HashSet<String> = plan
            .actions
            .iter()
            .filter_map(|a| a.rollback.as_ref().map(|r| r.action.clone()))
            .collect();

        let mut results: HashMap<String, Value> = HashMap::new();
        let mut ready_queue: VecDeque<String> = VecDeque::new();
        let mut queued: HashSet<String> = HashSet::new();
        let mut running: usize = 0;
        let mut aborted = false;
        let mut cancelled = false;

        let children_token = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<ChildMsg>();

        // Initial ready set; everything else schedulable is waiting.
        for action in &plan.actions {
            if rollback_only.contains(&action.id) {
                continue;
            }
            if self.deps_satisfied(action, state) {
                ready_queue.push_back(action.id.clone());
                queued.insert(action.id.clone());
            } else {
                self.set_status(state, &action.id, ActionStatus::Waiting).await;
            }
        }

        loop {
            // Spawn up to the per-plan cap.
            while !aborted
                && running < self.config.plan_max_concurrent
                && !ready_queue.is_empty()
            {
                let action_id = ready_queue.pop_front().expect("non-empty queue");
                queued.remove(&action_id);
                let action = plan
                    .get_action(&action_id)
                    .expect("queued action exists in plan")
                    .clone();
                self.events.emit(AuditEvent::action(
                    AuditEventKind::ActionRequested,
                    &plan.plan_id,
                    &action_id,
                ));
                self.spawn_child(
                    Arc::clone(plan),
                    action,
                    results.clone(),
                    children_token.child_token(),
                    tx.clone(),
                );
                running += 1;
            }

            if running == 0 && (ready_queue.is_empty() || aborted) {
                break;
            }

            let msg = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                msg = rx.recv() => msg,
            };
            let Some(msg) = msg else {
                if cancel.is_cancelled() {
                    cancelled = true;
                    children_token.cancel();
                    // Grace period: let running children wind down, then
                    // abandon whatever is left.
                    let deadline = tokio::time::Instant::now() + self.config.cancel_grace;
                    while running > 0 {
                        match tokio::time::timeout_at(deadline, rx.recv()).await {
                            Ok(Some(ChildMsg::Finished { action_id, outcome })) => {
                                running -= 1;
                                self.handle_finished(plan, state, &mut results, &action_id, outcome)
                                    .await;
                            }
                            Ok(Some(_)) => {}
                            Ok(None) | Err(_) => break,
                        }
                    }
                }
                break;
            };

            match msg {
                ChildMsg::Started { action_id } => {
                    if let Some(record) = state.actions.get_mut(&action_id) {
                        record.status = ActionStatus::Running;
                        record.started_at = Some(now_epoch());
                        record.attempt += 1;
                    }
                    self.persist_action(state, &action_id).await;
                    self.events.emit(AuditEvent::action(
                        AuditEventKind::ActionStarted,
                        &plan.plan_id,
                        &action_id,
                    ));
                }
                ChildMsg::AwaitingApproval { action_id } => {
                    self.set_status(state, &action_id, ActionStatus::AwaitingApproval)
                        .await;
                    self.events.emit(AuditEvent::action(
                        AuditEventKind::ApprovalRequested,
                        &plan.plan_id,
                        &action_id,
                    ));
                }
                ChildMsg::ApprovalDecided {
                    action_id,
                    metadata,
                } => {
                    let decision = metadata.decision.clone();
                    if let Some(record) = state.actions.get_mut(&action_id) {
                        record.status = ActionStatus::Running;
                        record.approval_metadata = Some(metadata);
                    }
                    self.persist_action(state, &action_id).await;
                    self.events.emit(
                        AuditEvent::action(
                            AuditEventKind::ApprovalDecided,
                            &plan.plan_id,
                            &action_id,
                        )
                        .with_detail(json!({"decision": decision})),
                    );
                }
                ChildMsg::Finished { action_id, outcome } => {
                    running -= 1;
                    let abort_now = self
                        .handle_finished(plan, state, &mut results, &action_id, outcome)
                        .await;
                    if abort_now {
                        aborted = true;
                        children_token.cancel();
                    }

                    // Requeue retries and newly unblocked actions.
                    if !aborted {
                        for action in &plan.actions {
                            if rollback_only.contains(&action.id) || queued.contains(&action.id) {
                                continue;
                            }
                            let status = state.actions[&action.id].status;
                            let waiting =
                                matches!(status, ActionStatus::Waiting | ActionStatus::Pending);
                            if waiting && self.deps_satisfied(action, state) {
                                ready_queue.push_back(action.id.clone());
                                queued.insert(action.id.clone());
                            }
                        }
                    }
                }
            }

        }

        // Terminal bookkeeping: every action settles exactly once.
        let abandoned: Vec<String> = state
            .actions
            .values()
            .filter(|a| !a.status.is_terminal())
            .map(|a| a.action_id.clone())
            .collect();
        for action_id in abandoned {
            let was_running = state.actions[&action_id].status == ActionStatus::Running;
            if let Some(record) = state.actions.get_mut(&action_id) {
                if was_running {
                    record.status = ActionStatus::Failed;
                    record.error = Some("cancelled before completion".to_string());
                } else {
                    record.status = ActionStatus::Skipped;
                }
                record.finished_at = Some(now_epoch());
            }
            self.persist_action(state, &action_id).await;
            if was_running {
                self.events.emit(AuditEvent::action(
                    AuditEventKind::ActionFailed,
                    &plan.plan_id,
                    &action_id,
                ));
            }
        }

        state.plan_status = if cancelled {
            PlanStatus::Cancelled
        } else if aborted || state.any_failed() {
            PlanStatus::Failed
        } else {
            PlanStatus::Completed
        };
    }

    fn deps_satisfied(&self, action: &Action, state: &ExecutionState) -> bool {
        action.depends_on.iter().all(|dep| {
            state
                .actions
                .get(dep)
                .is_some_and(|d| d.status.satisfies_dependency())
        })
    }

    /// Applies the action's outcome and its on_error policy.
    ///
    /// Returns true when the plan must abort.
    async fn handle_finished(
        &self,
        plan: &Arc<Plan>,
        state: &mut ExecutionState,
        results: &mut HashMap<String, Value>,
        action_id: &str,
        outcome: AttemptOutcome,
    ) -> bool {
        let action = plan.get_action(action_id).expect("finished action exists");

        match outcome {
            AttemptOutcome::Completed(result) => {
                // Templates see the full value; the stored record is
                // truncated to the byte budget.
                results.insert(action_id.to_string(), result.clone());
                if let Some(record) = state.actions.get_mut(action_id) {
                    record.status = ActionStatus::Completed;
                    record.finished_at = Some(now_epoch());
                    record.result =
                        Some(truncate_result(&result, self.config.result_truncate_bytes));
                    record.error = None;
                }
                self.persist_action(state, action_id).await;
                self.events.emit(AuditEvent::action(
                    AuditEventKind::ActionCompleted,
                    &plan.plan_id,
                    action_id,
                ));
                false
            }
            AttemptOutcome::Skipped { reason } => {
                if let Some(record) = state.actions.get_mut(action_id) {
                    record.status = ActionStatus::Skipped;
                    record.finished_at = Some(now_epoch());
                    record.error = reason;
                }
                self.persist_action(state, action_id).await;
                self.events.emit(
                    AuditEvent::action(AuditEventKind::ActionCompleted, &plan.plan_id, action_id)
                        .with_detail(json!({"skipped": true})),
                );
                false
            }
            AttemptOutcome::Failed { error } => {
                self.handle_failure(plan, state, results, action, error).await
            }
        }
    }

    async fn handle_failure(
        &self,
        plan: &Arc<Plan>,
        state: &mut ExecutionState,
        results: &HashMap<String, Value>,
        action: &Action,
        error: String,
    ) -> bool {
        let attempt = state.actions[&action.id].attempt;

        // Retry requeues until the attempt budget (retry_count + 1) is
        // exhausted, then aborts.
        if action.on_error == OnErrorPolicy::Retry && attempt <= action.retry_count {
            tracing::info!(
                plan_id = %plan.plan_id,
                action_id = %action.id,
                attempt,
                "action failed; retrying"
            );
            if let Some(record) = state.actions.get_mut(&action.id) {
                record.status = ActionStatus::Waiting;
                record.error = Some(error.clone());
            }
            self.persist_action(state, &action.id).await;
            self.events.emit(
                AuditEvent::action(AuditEventKind::ActionFailed, &plan.plan_id, &action.id)
                    .with_detail(json!({"retrying": true, "attempt": attempt})),
            );
            return false;
        }

        if let Some(record) = state.actions.get_mut(&action.id) {
            record.status = ActionStatus::Failed;
            record.finished_at = Some(now_epoch());
            record.error = Some(error.clone());
        }
        self.persist_action(state, &action.id).await;
        self.events.emit(
            AuditEvent::action(AuditEventKind::ActionFailed, &plan.plan_id, &action.id)
                .with_detail(json!({"attempt": attempt})),
        );

        match action.on_error {
            OnErrorPolicy::Continue => {
                self.skip_descendants(plan, state, &action.id).await;
                false
            }
            OnErrorPolicy::Skip => {
                // The action itself becomes skipped, not failed.
                if let Some(record) = state.actions.get_mut(&action.id) {
                    record.status = ActionStatus::Skipped;
                }
                self.persist_action(state, &action.id).await;
                self.skip_descendants(plan, state, &action.id).await;
                false
            }
            OnErrorPolicy::Rollback => {
                self.rollback
                    .execute(plan, action, results, CancellationToken::new(), 0)
                    .await;
                if let Some(record) = state.actions.get_mut(&action.id) {
                    record.status = ActionStatus::RolledBack;
                }
                self.persist_action(state, &action.id).await;
                self.events.emit(AuditEvent::action(
                    AuditEventKind::ActionRolledBack,
                    &plan.plan_id,
                    &action.id,
                ));
                true
            }
            // Abort, and Retry with the budget exhausted.
            _ => true,
        }
    }

    /// Marks every transitive descendant of `action_id` skipped.
    async fn skip_descendants(&self, plan: &Arc<Plan>, state: &mut ExecutionState, action_id: &str) {
        for descendant in plan.descendants_of(action_id) {
            let skippable = state
                .actions
                .get(&descendant)
                .is_some_and(|a| !a.status.is_terminal() && a.status != ActionStatus::Running);
            if skippable {
                if let Some(record) = state.actions.get_mut(&descendant) {
                    record.status = ActionStatus::Skipped;
                    record.finished_at = Some(now_epoch());
                    record.error = Some(format!("dependency '{action_id}' did not complete"));
                }
                self.persist_action(state, &descendant).await;
            }
        }
    }

    // -------------------------------------------------------------------
    // Child task: one attempt of one action
    // -------------------------------------------------------------------

    fn spawn_child(
        &self,
        plan: Arc<Plan>,
        action: Action,
        results: HashMap<String, Value>,
        token: CancellationToken,
        tx: mpsc::UnboundedSender<ChildMsg>,
    ) {
        let registry = Arc::clone(&self.registry);
        let gate = Arc::clone(&self.gate);
        let permissions = Arc::clone(&self.permissions);
        let memory = self.memory.clone();
        let config = self.config.clone();
        let global_slots = Arc::clone(&self.global_slots);

        tokio::spawn(async move {
            let outcome = run_attempt(
                &plan,
                &action,
                &results,
                token,
                &tx,
                registry,
                gate,
                permissions,
                memory,
                &config,
                global_slots,
            )
            .await;
            let _ = tx.send(ChildMsg::Finished {
                action_id: action.id.clone(),
                outcome,
            });
        });
    }

    // -------------------------------------------------------------------
    // Persistence helpers (best-effort after creation)
    // -------------------------------------------------------------------

    async fn persist_create(&self, state: &ExecutionState) -> Result<(), llmos_state::StateError> {
        self.store.lock().await.create_plan(state)
    }

    async fn persist_plan_status(&self, state: &ExecutionState) {
        if let Err(err) = self
            .store
            .lock()
            .await
            .update_plan_status(&state.plan_id, state.plan_status)
        {
            tracing::error!(plan_id = %state.plan_id, error = %err, "plan status persist failed");
        }
    }

    async fn persist_action(&self, state: &ExecutionState, action_id: &str) {
        let Some(record) = state.actions.get(action_id) else {
            return;
        };
        if let Err(err) = self.store.lock().await.update_action(&state.plan_id, record) {
            tracing::error!(
                plan_id = %state.plan_id,
                action_id,
                error = %err,
                "action persist failed"
            );
        }
    }

    async fn set_status(&self, state: &mut ExecutionState, action_id: &str, status: ActionStatus) {
        if let Some(record) = state.actions.get_mut(action_id) {
            record.status = status;
        }
        self.persist_action(state, action_id).await;
    }
}

/// One attempt: resolve, approve, authorize, validate, dispatch.
#[allow(clippy::too_many_arguments)]
async fn run_attempt(
    plan: &Arc<Plan>,
    action: &Action,
    results: &HashMap<String, Value>,
    token: CancellationToken,
    tx: &mpsc::UnboundedSender<ChildMsg>,
    registry: Arc<CapabilityRegistry>,
    gate: Arc<ApprovalGate>,
    permissions: Arc<PermissionManager>,
    memory: MemoryKv,
    config: &ServerConfig,
    global_slots: Arc<Semaphore>,
) -> AttemptOutcome {
    let _ = tx.send(ChildMsg::Started {
        action_id: action.id.clone(),
    });

    // 1. Template substitution, once per attempt, immediately before use.
    let memory_snapshot = memory.snapshot();
    let resolver = TemplateResolver::new(
        results,
        &memory_snapshot,
        permissions.profile().allow_env_templates,
    );
    let mut params = match resolver.resolve(&action.params) {
        Ok(params) => params,
        Err(err) => {
            return AttemptOutcome::Failed {
                error: err.to_string(),
            }
        }
    };

    // 2. The declared action spec drives risk, approval, and permission.
    let spec = match registry.action_spec(&action.module, &action.action) {
        Ok(spec) => spec,
        Err(err) => {
            return AttemptOutcome::Failed {
                error: err.to_string(),
            }
        }
    };

    // 3. Approval gate.
    let requires_approval_reason = if config.requires_approval(&action.module, &action.action) {
        Some("listed in the require-approval configuration".to_string())
    } else if spec.risk_level.requires_approval() {
        Some(format!("risk level {} requires approval", spec.risk_level))
    } else {
        None
    };

    if let Some(reason) = requires_approval_reason {
        if !gate.is_auto_approved(&action.module, &action.action) {
            let _ = tx.send(ChildMsg::AwaitingApproval {
                action_id: action.id.clone(),
            });
            let request = ApprovalRequest {
                plan_id: plan.plan_id.clone(),
                action_id: action.id.clone(),
                module: action.module.clone(),
                action_name: action.action.clone(),
                params: params.clone(),
                risk_level: spec.risk_level,
                description: format!(
                    "{}.{} in plan '{}'",
                    action.module, action.action, plan.plan_id
                ),
                requires_approval_reason: reason,
                clarification_options: Vec::new(),
                requested_at: now_epoch(),
            };
            let response = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    gate.withdraw(&plan.plan_id, &action.id);
                    return AttemptOutcome::Failed {
                        error: "cancelled while awaiting approval".to_string(),
                    };
                }
                response = gate.request_approval(request, None, None) => response,
            };
            let _ = tx.send(ChildMsg::ApprovalDecided {
                action_id: action.id.clone(),
                metadata: ApprovalMetadata {
                    decision: response.decision.as_str().to_string(),
                    approved_by: response.approved_by.clone(),
                    timestamp: response.timestamp,
                },
            });

            match response.decision {
                ApprovalDecision::Approve | ApprovalDecision::ApproveAlways => {}
                ApprovalDecision::Modify => {
                    if let Some(modified) = response.modified_params {
                        params = modified;
                    }
                }
                ApprovalDecision::Reject => {
                    return AttemptOutcome::Failed {
                        error: format!(
                            "approval rejected{}",
                            response
                                .reason
                                .map(|r| format!(": {r}"))
                                .unwrap_or_default()
                        ),
                    };
                }
                ApprovalDecision::Skip => {
                    return AttemptOutcome::Skipped {
                        reason: response.reason,
                    };
                }
            }
        }
    }

    // 4. OS-level permission.
    if let Some(permission) = &spec.permission {
        if let Err(err) = permissions
            .check_or_raise(permission, &action.module, &action.action)
            .await
        {
            return AttemptOutcome::Failed {
                error: err.to_string(),
            };
        }
    }

    // 5. Params must match the declared schema (post-modify).
    if let Err(err) = registry.validate_params(&action.module, &action.action, &params) {
        return AttemptOutcome::Failed {
            error: err.to_string(),
        };
    }

    // 6. Dispatch under the process-wide cap and the per-action deadline.
    let permit = match global_slots.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            return AttemptOutcome::Failed {
                error: "executor shutting down".to_string(),
            }
        }
    };

    let capability = match registry.get(&action.module) {
        Ok(capability) => capability,
        Err(err) => {
            return AttemptOutcome::Failed {
                error: err.to_string(),
            }
        }
    };

    let ctx = CapabilityContext::new(&plan.plan_id, &action.id, token.clone())
        .with_perception(action.perception.clone());
    let deadline = std::time::Duration::from_secs(action.timeout_seconds.max(1));
    let dispatched = tokio::time::timeout(deadline, capability.execute(&action.action, &params, &ctx));

    let outcome = match dispatched.await {
        Ok(Ok(result)) => AttemptOutcome::Completed(result),
        Ok(Err(CapabilityError::Cancelled { reason })) => AttemptOutcome::Failed {
            error: format!("cancelled: {reason}"),
        },
        Ok(Err(err)) => AttemptOutcome::Failed {
            error: err.to_string(),
        },
        Err(_) => {
            // Deadline exceeded: same token, reason discriminator in the
            // error.
            token.cancel();
            AttemptOutcome::Failed {
                error: format!(
                    "action timed out after {}s",
                    action.timeout_seconds.max(1)
                ),
            }
        }
    };
    drop(permit);
    outcome
}

/// Truncates an oversized result to the byte budget, keeping a marker
/// with the original size.
fn truncate_result(value: &Value, max_bytes: usize) -> Value {
    let serialized = value.to_string();
    if serialized.len() <= max_bytes {
        return value.clone();
    }
    let preview: String = serialized.chars().take(max_bytes / 4).collect();
    json!({
        "truncated": true,
        "original_size": serialized.len(),
        "preview": preview,
    })
}
