//! Capability registry: module id -> capability object.
//!
//! The registry is configured during daemon initialization and read-only
//! thereafter; `rebuild` swaps the entire table atomically rather than
//! mutating in place, so readers never observe a half-built table.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};

use crate::capability::{ActionSpec, Capability, CapabilityError, ModuleManifest};

type Table = HashMap<String, Arc<dyn Capability>>;

/// Lookup table from module id to capability object.
///
/// Owns the capability objects for the daemon's lifetime.
#[derive(Default)]
pub struct CapabilityRegistry {
    table: RwLock<Arc<Table>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from an initial capability set.
    pub fn with_capabilities(capabilities: Vec<Arc<dyn Capability>>) -> Self {
        let registry = Self::new();
        registry.rebuild(capabilities);
        registry
    }

    /// Atomically replaces the whole table.
    pub fn rebuild(&self, capabilities: Vec<Arc<dyn Capability>>) {
        let mut table = Table::new();
        for capability in capabilities {
            table.insert(capability.manifest().module_id, capability);
        }
        *self.table.write().expect("capability table lock") = Arc::new(table);
    }

    /// Adds one capability by rebuilding the table around it.
    pub fn register(&self, capability: Arc<dyn Capability>) {
        let mut table: Table = (**self.table.read().expect("capability table lock")).clone();
        table.insert(capability.manifest().module_id, capability);
        *self.table.write().expect("capability table lock") = Arc::new(table);
    }

    /// Looks up a capability by module id.
    pub fn get(&self, module: &str) -> Result<Arc<dyn Capability>, CapabilityError> {
        self.table
            .read()
            .expect("capability table lock")
            .get(module)
            .cloned()
            .ok_or_else(|| CapabilityError::ModuleNotFound(module.to_string()))
    }

    /// All published manifests, sorted by module id.
    pub fn manifests(&self) -> Vec<ModuleManifest> {
        let table: Arc<Table> = self.table.read().expect("capability table lock").clone();
        let mut manifests: Vec<ModuleManifest> =
            table.values().map(|c| c.manifest()).collect();
        manifests.sort_by(|a, b| a.module_id.cmp(&b.module_id));
        manifests
    }

    /// Resolves the action spec for `module.action`.
    pub fn action_spec(
        &self,
        module: &str,
        action: &str,
    ) -> Result<ActionSpec, CapabilityError> {
        let capability = self.get(module)?;
        let manifest = capability.manifest();
        manifest
            .action(action)
            .cloned()
            .ok_or_else(|| CapabilityError::ActionNotFound {
                module: module.to_string(),
                action: action.to_string(),
            })
    }

    /// Validates resolved params against the declared action schema.
    pub fn validate_params(
        &self,
        module: &str,
        action: &str,
        params: &Map<String, Value>,
    ) -> Result<(), CapabilityError> {
        let spec = self.action_spec(module, action)?;
        let issues = spec.validate_params(params);
        if issues.is_empty() {
            Ok(())
        } else {
            Err(CapabilityError::InvalidParams {
                module: module.to_string(),
                action: action.to_string(),
                issues,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{CapabilityContext, ParamKind, ParamSpec};
    use async_trait::async_trait;
    use llmos_security::RiskLevel;
    use serde_json::json;

    struct EchoCapability;

    #[async_trait]
    impl Capability for EchoCapability {
        fn manifest(&self) -> ModuleManifest {
            ModuleManifest {
                module_id: "echo".to_string(),
                version: "1.0.0".to_string(),
                description: "test echo module".to_string(),
                actions: vec![ActionSpec {
                    name: "say".to_string(),
                    description: "echo back".to_string(),
                    params: vec![ParamSpec::required("text", ParamKind::String)],
                    permission: None,
                    risk_level: RiskLevel::Low,
                }],
                permissions: Vec::new(),
                risk_level: RiskLevel::Low,
                platforms: Vec::new(),
            }
        }

        async fn execute(
            &self,
            _action: &str,
            params: &Map<String, Value>,
            _ctx: &CapabilityContext,
        ) -> Result<Value, CapabilityError> {
            Ok(json!({"echo": params.get("text").cloned()}))
        }
    }

    #[test]
    fn lookup_and_manifest_listing() {
        let registry = CapabilityRegistry::with_capabilities(vec![Arc::new(EchoCapability)]);
        assert!(registry.get("echo").is_ok());
        assert!(matches!(
            registry.get("missing"),
            Err(CapabilityError::ModuleNotFound(_))
        ));
        assert_eq!(registry.manifests().len(), 1);
    }

    #[test]
    fn rebuild_swaps_the_table() {
        let registry = CapabilityRegistry::with_capabilities(vec![Arc::new(EchoCapability)]);
        registry.rebuild(Vec::new());
        assert!(registry.get("echo").is_err());
    }

    #[test]
    fn param_validation_goes_through_the_schema() {
        let registry = CapabilityRegistry::with_capabilities(vec![Arc::new(EchoCapability)]);
        let good = json!({"text": "hi"});
        assert!(registry
            .validate_params("echo", "say", good.as_object().unwrap())
            .is_ok());

        let bad = json!({});
        assert!(matches!(
            registry.validate_params("echo", "say", bad.as_object().unwrap()),
            Err(CapabilityError::InvalidParams { .. })
        ));

        assert!(matches!(
            registry.validate_params("echo", "shout", good.as_object().unwrap()),
            Err(CapabilityError::ActionNotFound { .. })
        ));
    }
}
