//! The permission manager: profile rules plus the durable grant table.
//!
//! All grant state lives in the state store; this manager layers the
//! risk map, the active profile, and the auto-grant rule on top. A missing
//! low-risk permission may be granted automatically on first access when
//! the profile allows it; otherwise the caller receives a structured error
//! carrying the exact grant request the user could issue.

use std::sync::Arc;

use tokio::sync::Mutex;

use llmos_security::{
    risk_for_permission, PermissionGrant, PermissionScope, ProfileConfig, RiskLevel, SecurityError,
};
use llmos_state::{StateError, StateStore};

/// Shared handle to the daemon's state store.
pub type SharedStore = Arc<Mutex<Box<dyn StateStore>>>;

/// Maintains the grant table and answers permission checks.
pub struct PermissionManager {
    store: SharedStore,
    profile: ProfileConfig,
}

impl PermissionManager {
    pub fn new(store: SharedStore, profile: ProfileConfig) -> Self {
        PermissionManager { store, profile }
    }

    pub fn profile(&self) -> &ProfileConfig {
        &self.profile
    }

    /// Risk level of a permission string.
    pub fn get_risk_level(&self, permission: &str) -> RiskLevel {
        risk_for_permission(permission)
    }

    /// Whether the permission is currently granted (and not expired).
    pub async fn check(&self, permission: &str, module_id: &str) -> Result<bool, StateError> {
        let mut store = self.store.lock().await;
        Ok(store.get_grant(permission, module_id)?.is_some())
    }

    /// Checks a permission, auto-granting low-risk ones when the profile
    /// allows; otherwise fails with the suggested grant call.
    pub async fn check_or_raise(
        &self,
        permission: &str,
        module_id: &str,
        action: &str,
    ) -> Result<(), SecurityError> {
        if self.profile.denies_module(module_id) {
            return Err(SecurityError::ProfileDenied {
                module: module_id.to_string(),
                action: action.to_string(),
                profile: self.profile.name.as_str().to_string(),
            });
        }

        let granted = self
            .check(permission, module_id)
            .await
            .unwrap_or(false);
        if granted {
            return Ok(());
        }

        let risk = self.get_risk_level(permission);
        if risk <= RiskLevel::Low && self.profile.auto_grant_low_risk {
            let grant = PermissionGrant::new(
                permission,
                module_id,
                PermissionScope::Session,
                "auto",
                format!("auto-granted on first access by '{action}'"),
            );
            let mut store = self.store.lock().await;
            if store.upsert_grant(&grant).is_ok() {
                tracing::info!(permission, module_id, "permission auto-granted");
                return Ok(());
            }
        }

        Err(SecurityError::PermissionNotGranted {
            permission: permission.to_string(),
            module_id: module_id.to_string(),
            action: action.to_string(),
            risk_level: risk,
            suggestion: format!("security.request_permission({permission}, {module_id})"),
        })
    }

    /// Stores a grant.
    pub async fn grant(
        &self,
        permission: &str,
        module_id: &str,
        scope: PermissionScope,
        granted_by: &str,
        reason: &str,
        expires_at: Option<f64>,
    ) -> Result<PermissionGrant, StateError> {
        let mut grant = PermissionGrant::new(permission, module_id, scope, granted_by, reason);
        grant.expires_at = expires_at;
        self.store.lock().await.upsert_grant(&grant)?;
        tracing::info!(permission, module_id, scope = scope.as_str(), "permission granted");
        Ok(grant)
    }

    /// Revokes one grant. Returns true when a grant existed.
    pub async fn revoke(&self, permission: &str, module_id: &str) -> Result<bool, StateError> {
        self.store.lock().await.revoke_grant(permission, module_id)
    }

    /// Revokes every grant held by a module. Returns the count.
    pub async fn revoke_all_for_module(&self, module_id: &str) -> Result<usize, StateError> {
        self.store.lock().await.revoke_all_for_module(module_id)
    }

    /// Lists non-expired grants, optionally for one module.
    pub async fn list_grants(
        &self,
        module_id: Option<&str>,
    ) -> Result<Vec<PermissionGrant>, StateError> {
        self.store.lock().await.list_grants(module_id)
    }
}
