//! Permission grant records.
//!
//! A grant is keyed by `(permission, module_id)` so each module holds at
//! most one grant per permission string. Session-scoped grants are purged
//! on daemon start; expired grants are removed lazily on read.

use serde::{Deserialize, Serialize};

use llmos_protocol::now_epoch;

/// How long a grant survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermissionScope {
    /// Cleared on daemon restart.
    #[default]
    Session,
    /// Persists until explicitly revoked.
    Permanent,
}

impl PermissionScope {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionScope::Session => "session",
            PermissionScope::Permanent => "permanent",
        }
    }
}

impl std::str::FromStr for PermissionScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(PermissionScope::Session),
            "permanent" => Ok(PermissionScope::Permanent),
            other => Err(format!("unknown permission scope '{other}'")),
        }
    }
}

/// One granted OS-level permission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionGrant {
    /// Permission string, e.g. `filesystem.write`.
    pub permission: String,
    /// The module the grant applies to.
    pub module_id: String,
    pub scope: PermissionScope,
    /// Seconds since the Unix epoch.
    pub granted_at: f64,
    pub granted_by: String,
    pub reason: String,
    /// Optional expiry, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<f64>,
}

impl PermissionGrant {
    pub fn new(
        permission: impl Into<String>,
        module_id: impl Into<String>,
        scope: PermissionScope,
        granted_by: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        PermissionGrant {
            permission: permission.into(),
            module_id: module_id.into(),
            scope,
            granted_at: now_epoch(),
            granted_by: granted_by.into(),
            reason: reason.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: f64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| now_epoch() > at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_without_expiry_never_expire() {
        let grant = PermissionGrant::new(
            "filesystem.write",
            "filesystem",
            PermissionScope::Session,
            "user",
            "test",
        );
        assert!(!grant.is_expired());
    }

    #[test]
    fn past_expiry_is_expired() {
        let grant = PermissionGrant::new(
            "filesystem.write",
            "filesystem",
            PermissionScope::Permanent,
            "user",
            "test",
        )
        .with_expiry(now_epoch() - 10.0);
        assert!(grant.is_expired());

        let alive = PermissionGrant::new(
            "filesystem.write",
            "filesystem",
            PermissionScope::Permanent,
            "user",
            "test",
        )
        .with_expiry(now_epoch() + 3600.0);
        assert!(!alive.is_expired());
    }
}
