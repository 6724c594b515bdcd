//! The capability dispatch contract.
//!
//! A capability is a named provider of operations callable by plan actions.
//! It receives already-resolved params, must honor the cancellation token
//! carried in the context, and raises a structured error on failure. It
//! may not retain references to params across calls.
//!
//! Each capability publishes a [`ModuleManifest`]: its actions with their
//! parameter schemas, required permissions, risk level, and platforms.
//! The manifest surface is stable enough for agents to introspect when
//! building tool catalogues, and the executor validates params against the
//! declared schema before dispatch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use llmos_security::RiskLevel;

/// Errors produced by capability lookup and dispatch.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// No module with the given id is registered.
    #[error("module '{0}' is not registered")]
    ModuleNotFound(String),

    /// The module does not expose the requested action.
    #[error("module '{module}' does not expose action '{action}'")]
    ActionNotFound { module: String, action: String },

    /// A module failed to initialise.
    #[error("module '{module}' failed to load: {reason}")]
    LoadFailure { module: String, reason: String },

    /// Params do not match the action's declared schema.
    #[error("invalid params for '{module}.{action}': {issues:?}")]
    InvalidParams {
        module: String,
        action: String,
        issues: Vec<String>,
    },

    /// The action raised an error during execution (wraps the cause).
    #[error("action '{module}.{action}' failed: {message}")]
    ExecutionFailed {
        module: String,
        action: String,
        message: String,
    },

    /// Execution was cancelled via the context token.
    #[error("action cancelled: {reason}")]
    Cancelled { reason: String },
}

/// Per-dispatch context handed to a capability.
#[derive(Debug, Clone)]
pub struct CapabilityContext {
    pub plan_id: String,
    pub action_id: String,
    /// Cancellation token the capability agrees to poll or select on.
    /// Deadline expiry uses the same token with a reason discriminator
    /// carried in the resulting error.
    pub cancel: CancellationToken,
    /// Perception directives from the action (capture-before/after, OCR,
    /// validation). Opaque to the scheduler; capability-defined.
    pub perception: Option<Value>,
}

impl CapabilityContext {
    pub fn new(plan_id: &str, action_id: &str, cancel: CancellationToken) -> Self {
        CapabilityContext {
            plan_id: plan_id.to_string(),
            action_id: action_id.to_string(),
            cancel,
            perception: None,
        }
    }

    pub fn with_perception(mut self, perception: Option<Value>) -> Self {
        self.perception = perception;
        self
    }
}

/// Declared type of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Any,
}

impl ParamKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Object => value.is_object(),
            ParamKind::Array => value.is_array(),
            ParamKind::Any => true,
        }
    }
}

/// Schema entry for one parameter of an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
}

impl ParamSpec {
    pub fn required(name: &str, kind: ParamKind) -> Self {
        ParamSpec {
            name: name.to_string(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: &str, kind: ParamKind) -> Self {
        ParamSpec {
            name: name.to_string(),
            kind,
            required: false,
        }
    }
}

/// One operation a module exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    /// OS permission the action needs, e.g. `filesystem.write`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    pub risk_level: RiskLevel,
}

impl ActionSpec {
    /// Checks resolved params against the declared schema.
    ///
    /// Unknown params are tolerated (capabilities ignore them); missing
    /// required params and type mismatches are not.
    pub fn validate_params(&self, params: &Map<String, Value>) -> Vec<String> {
        let mut issues = Vec::new();
        for spec in &self.params {
            match params.get(&spec.name) {
                None if spec.required => {
                    issues.push(format!("missing required param '{}'", spec.name));
                }
                Some(value) if !spec.kind.matches(value) => {
                    issues.push(format!(
                        "param '{}' has wrong type (expected {:?})",
                        spec.name, spec.kind
                    ));
                }
                _ => {}
            }
        }
        issues
    }
}

/// The manifest a capability publishes for introspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub module_id: String,
    pub version: String,
    pub description: String,
    pub actions: Vec<ActionSpec>,
    /// All OS permissions the module may request.
    pub permissions: Vec<String>,
    /// Risk level of the module as a whole.
    pub risk_level: RiskLevel,
    /// Platforms the module supports; empty means all.
    pub platforms: Vec<String>,
}

impl ModuleManifest {
    pub fn action(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|a| a.name == name)
    }
}

/// A named provider of operations callable by plan actions.
#[async_trait]
pub trait Capability: Send + Sync {
    /// The module's published manifest.
    fn manifest(&self) -> ModuleManifest;

    /// Executes one operation with already-resolved params.
    async fn execute(
        &self,
        action: &str,
        params: &Map<String, Value>,
        ctx: &CapabilityContext,
    ) -> Result<Value, CapabilityError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> ActionSpec {
        ActionSpec {
            name: "write_file".to_string(),
            description: "write a file".to_string(),
            params: vec![
                ParamSpec::required("path", ParamKind::String),
                ParamSpec::required("content", ParamKind::String),
                ParamSpec::optional("mode", ParamKind::Integer),
            ],
            permission: Some("filesystem.write".to_string()),
            risk_level: RiskLevel::Medium,
        }
    }

    #[test]
    fn valid_params_pass() {
        let params = json!({"path": "/tmp/x", "content": "hi"});
        assert!(spec()
            .validate_params(params.as_object().unwrap())
            .is_empty());
    }

    #[test]
    fn missing_required_param_is_reported() {
        let params = json!({"path": "/tmp/x"});
        let issues = spec().validate_params(params.as_object().unwrap());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("content"));
    }

    #[test]
    fn wrong_type_is_reported_but_unknown_params_are_tolerated() {
        let params = json!({"path": 42, "content": "hi", "extra": true});
        let issues = spec().validate_params(params.as_object().unwrap());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("path"));
    }
}
