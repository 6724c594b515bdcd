//! Security capability: the module permission errors point the caller at.
//!
//! `permission_not_granted` failures suggest
//! `security.request_permission(<permission>, <module>)`; this module makes
//! that suggestion executable as a plan action.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use llmos_security::{PermissionScope, RiskLevel};

use crate::capability::{
    ActionSpec, Capability, CapabilityContext, CapabilityError, ModuleManifest, ParamKind,
    ParamSpec,
};
use crate::permissions::PermissionManager;

/// Builtin permission-management module.
pub struct SecurityCapability {
    permissions: Arc<PermissionManager>,
}

impl SecurityCapability {
    pub fn new(permissions: Arc<PermissionManager>) -> Self {
        SecurityCapability { permissions }
    }

    fn error(action: &str, message: impl Into<String>) -> CapabilityError {
        CapabilityError::ExecutionFailed {
            module: "security".to_string(),
            action: action.to_string(),
            message: message.into(),
        }
    }

    fn param_str<'a>(
        params: &'a Map<String, Value>,
        name: &str,
        action: &str,
    ) -> Result<&'a str, CapabilityError> {
        params
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| Self::error(action, format!("param '{name}' must be a string")))
    }
}

#[async_trait]
impl Capability for SecurityCapability {
    fn manifest(&self) -> ModuleManifest {
        ModuleManifest {
            module_id: "security".to_string(),
            version: "1.0.0".to_string(),
            description: "Permission grants: request, list, revoke".to_string(),
            actions: vec![
                ActionSpec {
                    name: "request_permission".to_string(),
                    description: "Grant a permission to a module".to_string(),
                    params: vec![
                        ParamSpec::required("permission", ParamKind::String),
                        ParamSpec::required("module", ParamKind::String),
                        ParamSpec::optional("scope", ParamKind::String),
                        ParamSpec::optional("reason", ParamKind::String),
                    ],
                    permission: None,
                    risk_level: RiskLevel::Critical,
                },
                ActionSpec {
                    name: "list_grants".to_string(),
                    description: "List active grants".to_string(),
                    params: vec![ParamSpec::optional("module", ParamKind::String)],
                    permission: None,
                    risk_level: RiskLevel::Low,
                },
                ActionSpec {
                    name: "revoke_permission".to_string(),
                    description: "Revoke a grant".to_string(),
                    params: vec![
                        ParamSpec::required("permission", ParamKind::String),
                        ParamSpec::required("module", ParamKind::String),
                    ],
                    permission: None,
                    risk_level: RiskLevel::Medium,
                },
            ],
            permissions: vec!["security.manage".to_string()],
            risk_level: RiskLevel::Critical,
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
            "request_permission" => {
                let permission = Self::param_str(params, "permission", action)?;
                let module = Self::param_str(params, "module", action)?;
                let scope = params
                    .get("scope")
                    .and_then(Value::as_str)
                    .unwrap_or("session")
                    .parse::<PermissionScope>()
                    .map_err(|err| Self::error(action, err))?;
                let reason = params
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or("requested via security module");

                let grant = self
                    .permissions
                    .grant(permission, module, scope, "agent", reason, None)
                    .await
                    .map_err(|err| Self::error(action, err.to_string()))?;
                Ok(json!({
                    "granted": true,
                    "permission": grant.permission,
                    "module": grant.module_id,
                    "scope": grant.scope.as_str(),
                }))
            }
            "list_grants" => {
                let module = params.get("module").and_then(Value::as_str);
                let grants = self
                    .permissions
                    .list_grants(module)
                    .await
                    .map_err(|err| Self::error(action, err.to_string()))?;
                let count = grants.len();
                Ok(json!({"grants": grants, "count": count}))
            }
            "revoke_permission" => {
                let permission = Self::param_str(params, "permission", action)?;
                let module = Self::param_str(params, "module", action)?;
                let revoked = self
                    .permissions
                    .revoke(permission, module)
                    .await
                    .map_err(|err| Self::error(action, err.to_string()))?;
                Ok(json!({"revoked": revoked}))
            }
            other => Err(CapabilityError::ActionNotFound {
                module: "security".to_string(),
                action: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::SharedStore;
    use llmos_security::SecurityProfile;
    use llmos_state::MemoryStore;
    use tokio::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    fn capability() -> (SecurityCapability, Arc<PermissionManager>) {
        let store: SharedStore = Arc::new(Mutex::new(Box::new(MemoryStore::new())));
        let permissions = Arc::new(PermissionManager::new(
            store,
            SecurityProfile::Standard.config(),
        ));
        (SecurityCapability::new(Arc::clone(&permissions)), permissions)
    }

    #[tokio::test]
    async fn request_then_list_then_revoke() {
        let (capability, permissions) = capability();
        let ctx = CapabilityContext::new("p", "a", CancellationToken::new());

        let request = json!({"permission": "filesystem.write", "module": "filesystem"});
        let granted = capability
            .execute("request_permission", request.as_object().unwrap(), &ctx)
            .await
            .unwrap();
        assert_eq!(granted["granted"], json!(true));
        assert!(permissions
            .check("filesystem.write", "filesystem")
            .await
            .unwrap());

        let listed = capability
            .execute("list_grants", &Map::new(), &ctx)
            .await
            .unwrap();
        assert_eq!(listed["count"], json!(1));

        let revoked = capability
            .execute("revoke_permission", request.as_object().unwrap(), &ctx)
            .await
            .unwrap();
        assert_eq!(revoked["revoked"], json!(true));
    }

    #[tokio::test]
    async fn bad_scope_is_an_execution_failure() {
        let (capability, _) = capability();
        let ctx = CapabilityContext::new("p", "a", CancellationToken::new());
        let request = json!({
            "permission": "filesystem.write",
            "module": "filesystem",
            "scope": "forever"
        });
        let err = capability
            .execute("request_permission", request.as_object().unwrap(), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::ExecutionFailed { .. }));
    }
}
