//! The plan data model: a declarative DAG of capability invocations.
//!
//! A [`Plan`] is immutable once submitted. Each [`Action`] names a module
//! and an operation within it, carries JSON params (possibly containing
//! `{{...}}` template expressions), dependencies on sibling actions, and an
//! error policy. The dependency graph implied by `depends_on` must be
//! acyclic; see [`crate::validate`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The protocol version this daemon speaks natively.
pub const PROTOCOL_VERSION: &str = "2.0";

/// Plans without an explicit `protocol_version` are treated as this legacy
/// version and migrated forward.
pub const LEGACY_VERSION: &str = "1.0";

/// Default per-action timeout when the plan does not specify one.
pub const DEFAULT_ACTION_TIMEOUT_SECS: u64 = 60;

fn default_timeout() -> u64 {
    DEFAULT_ACTION_TIMEOUT_SECS
}

/// What the executor does when an action fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnErrorPolicy {
    /// Fail the action, drop all descendants, terminate the plan as failed.
    #[default]
    Abort,
    /// Fail the action but let independent branches keep running.
    Continue,
    /// Re-queue the action until `retry_count` is exhausted, then abort.
    Retry,
    /// Hand control to the rollback engine, then fail.
    Rollback,
    /// Mark the action skipped; descendants become ineligible.
    Skip,
}

/// Reference to a compensating action within the same plan.
///
/// `params` are overrides merged over the referenced action's own params
/// before template resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackRef {
    /// Id of the compensating action (must exist in the plan).
    pub action: String,
    /// Parameter overrides applied on top of the target action's params.
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// One node in a plan: a capability invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique id within the plan.
    pub id: String,

    /// Capability (module) identifier, e.g. `filesystem`.
    pub module: String,

    /// Operation name within the module, e.g. `read_file`.
    pub action: String,

    /// Operation parameters. String values may contain template
    /// expressions resolved immediately before dispatch.
    #[serde(default)]
    pub params: Map<String, Value>,

    /// Ids of sibling actions that must terminate successfully first.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Error policy applied when this action fails.
    #[serde(default)]
    pub on_error: OnErrorPolicy,

    /// Per-action deadline in seconds.
    #[serde(default = "default_timeout", alias = "timeout")]
    pub timeout_seconds: u64,

    /// Number of retries allowed under `on_error = retry`.
    #[serde(default)]
    pub retry_count: u32,

    /// Compensating action reference, required when `on_error = rollback`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackRef>,

    /// Perception directives (capture-before/after, OCR, validation).
    /// Opaque to the scheduler; passed through to the capability as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perception: Option<Value>,

    /// Reserved for a future distributed dispatcher. Always dispatched
    /// locally; the field round-trips but is never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node: Option<String>,
}

/// A declarative plan: a DAG of actions submitted as one JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique plan id. May be client-supplied; the daemon generates one
    /// when absent.
    #[serde(default)]
    pub plan_id: String,

    /// Protocol version of the document. Always `PROTOCOL_VERSION` after
    /// migration.
    #[serde(default = "default_version")]
    pub protocol_version: String,

    /// Free-form description of what the plan does. Scanned by the
    /// security pipeline.
    #[serde(default)]
    pub description: String,

    /// Ordered action list. Execution order is governed by `depends_on`,
    /// not list position.
    pub actions: Vec<Action>,

    /// Optional plan-level timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Optional client metadata, carried through to the audit trail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

fn default_version() -> String {
    PROTOCOL_VERSION.to_string()
}

impl Plan {
    /// Looks up an action by id.
    pub fn get_action(&self, id: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.id == id)
    }

    /// Returns the ids of all actions that (transitively) depend on `id`.
    pub fn descendants_of(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut frontier = vec![id.to_string()];
        while let Some(current) = frontier.pop() {
            for action in &self.actions {
                if action.depends_on.iter().any(|d| *d == current)
                    && !out.contains(&action.id)
                {
                    out.push(action.id.clone());
                    frontier.push(action.id.clone());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_plan_json() -> Value {
        json!({
            "plan_id": "p1",
            "protocol_version": "2.0",
            "description": "read a file",
            "actions": [
                {"id": "a1", "module": "filesystem", "action": "read_file",
                 "params": {"path": "/tmp/x"}}
            ]
        })
    }

    #[test]
    fn action_defaults_are_applied() {
        let plan: Plan = serde_json::from_value(minimal_plan_json()).unwrap();
        let action = &plan.actions[0];
        assert_eq!(action.on_error, OnErrorPolicy::Abort);
        assert_eq!(action.timeout_seconds, DEFAULT_ACTION_TIMEOUT_SECS);
        assert_eq!(action.retry_count, 0);
        assert!(action.depends_on.is_empty());
        assert!(action.rollback.is_none());
        assert!(action.target_node.is_none());
    }

    #[test]
    fn timeout_alias_is_accepted() {
        let mut value = minimal_plan_json();
        value["actions"][0]["timeout"] = json!(5);
        let plan: Plan = serde_json::from_value(value).unwrap();
        assert_eq!(plan.actions[0].timeout_seconds, 5);
    }

    #[test]
    fn serialize_then_parse_is_semantically_equal() {
        let plan: Plan = serde_json::from_value(minimal_plan_json()).unwrap();
        let round_tripped: Plan =
            serde_json::from_value(serde_json::to_value(&plan).unwrap()).unwrap();
        assert_eq!(plan, round_tripped);
    }

    #[test]
    fn descendants_walk_is_transitive() {
        let plan: Plan = serde_json::from_value(json!({
            "plan_id": "p",
            "actions": [
                {"id": "a", "module": "m", "action": "x", "params": {}},
                {"id": "b", "module": "m", "action": "x", "params": {}, "depends_on": ["a"]},
                {"id": "c", "module": "m", "action": "x", "params": {}, "depends_on": ["b"]},
                {"id": "d", "module": "m", "action": "x", "params": {}}
            ]
        }))
        .unwrap();

        let mut descendants = plan.descendants_of("a");
        descendants.sort();
        assert_eq!(descendants, vec!["b".to_string(), "c".to_string()]);
        assert!(plan.descendants_of("d").is_empty());
    }

    #[test]
    fn target_node_round_trips() {
        let mut value = minimal_plan_json();
        value["actions"][0]["target_node"] = json!("node_rack_2");
        let plan: Plan = serde_json::from_value(value).unwrap();
        assert_eq!(plan.actions[0].target_node.as_deref(), Some("node_rack_2"));

        let dumped = serde_json::to_value(&plan).unwrap();
        assert_eq!(dumped["actions"][0]["target_node"], json!("node_rack_2"));
    }
}
