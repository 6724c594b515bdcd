//! Memory capability: get/set/delete on the shared key-value store.
//!
//! Values written here become visible to `{{memory.key}}` templates in
//! subsequent actions.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use llmos_security::RiskLevel;

use crate::capability::{
    ActionSpec, Capability, CapabilityContext, CapabilityError, ModuleManifest, ParamKind,
    ParamSpec,
};
use crate::memory_store::MemoryKv;

/// Builtin key-value memory module.
pub struct MemoryCapability {
    kv: MemoryKv,
}

impl MemoryCapability {
    pub fn new(kv: MemoryKv) -> Self {
        MemoryCapability { kv }
    }

    fn key<'a>(params: &'a Map<String, Value>, action: &str) -> Result<&'a str, CapabilityError> {
        params.get("key").and_then(Value::as_str).ok_or_else(|| {
            CapabilityError::ExecutionFailed {
                module: "memory".to_string(),
                action: action.to_string(),
                message: "param 'key' must be a string".to_string(),
            }
        })
    }
}

#[async_trait]
impl Capability for MemoryCapability {
    fn manifest(&self) -> ModuleManifest {
        ModuleManifest {
            module_id: "memory".to_string(),
            version: "1.0.0".to_string(),
            description: "Key-value store shared with {{memory.*}} templates".to_string(),
            actions: vec![
                ActionSpec {
                    name: "get".to_string(),
                    description: "Read a key".to_string(),
                    params: vec![ParamSpec::required("key", ParamKind::String)],
                    permission: Some("memory.read".to_string()),
                    risk_level: RiskLevel::Low,
                },
                ActionSpec {
                    name: "set".to_string(),
                    description: "Write a key".to_string(),
                    params: vec![
                        ParamSpec::required("key", ParamKind::String),
                        ParamSpec::required("value", ParamKind::Any),
                    ],
                    permission: Some("memory.write".to_string()),
                    risk_level: RiskLevel::Low,
                },
                ActionSpec {
                    name: "delete".to_string(),
                    description: "Remove a key".to_string(),
                    params: vec![ParamSpec::required("key", ParamKind::String)],
                    permission: Some("memory.write".to_string()),
                    risk_level: RiskLevel::Low,
                },
            ],
            permissions: vec!["memory.read".to_string(), "memory.write".to_string()],
            risk_level: RiskLevel::Low,
            platforms: Vec::new(),
        }
    }

    async fn execute(
        &self,
        action: &str,
        params: &Map<String, Value>,
        _ctx: &CapabilityContext,
    ) -> Result<Value, CapabilityError> {
        match action {
            "get" => {
                let key = Self::key(params, action)?;
                Ok(json!({"key": key, "value": self.kv.get(key), "found": self.kv.get(key).is_some()}))
            }
            "set" => {
                let key = Self::key(params, action)?;
                let value = params.get("value").cloned().unwrap_or(Value::Null);
                self.kv.set(key, value.clone());
                Ok(json!({"key": key, "stored": true}))
            }
            "delete" => {
                let key = Self::key(params, action)?;
                Ok(json!({"key": key, "deleted": self.kv.delete(key)}))
            }
            other => Err(CapabilityError::ActionNotFound {
                module: "memory".to_string(),
                action: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn set_then_get_through_the_capability() {
        let kv = MemoryKv::new();
        let capability = MemoryCapability::new(kv.clone());
        let ctx = CapabilityContext::new("p", "a", CancellationToken::new());

        let set_params = json!({"key": "token", "value": {"n": 7}});
        capability
            .execute("set", set_params.as_object().unwrap(), &ctx)
            .await
            .unwrap();

        // Visible both through the capability and the template snapshot.
        let get_params = json!({"key": "token"});
        let got = capability
            .execute("get", get_params.as_object().unwrap(), &ctx)
            .await
            .unwrap();
        assert_eq!(got["value"], json!({"n": 7}));
        assert_eq!(kv.snapshot()["token"], json!({"n": 7}));
    }
}
