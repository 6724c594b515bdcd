//! Risk classification for permissions and actions.

use serde::{Deserialize, Serialize};

/// Ordinal risk classification attached to a permission and to an action.
///
/// Governs default approval requirements: high and critical risk actions
/// auto-require approval unless previously approve-always'd.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    /// Whether actions at this level require approval by default.
    pub fn requires_approval(self) -> bool {
        self >= RiskLevel::High
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static permission-string to risk mapping.
///
/// Unknown permissions default to medium: unclassified surface area should
/// not silently pass as low risk.
pub fn risk_for_permission(permission: &str) -> RiskLevel {
    match permission {
        "filesystem.read" | "filesystem.list" => RiskLevel::Low,
        "filesystem.write" => RiskLevel::Medium,
        "filesystem.delete" => RiskLevel::High,
        "process.list" => RiskLevel::Low,
        "process.spawn" => RiskLevel::High,
        "process.kill" => RiskLevel::Critical,
        "network.request" => RiskLevel::Medium,
        "network.listen" => RiskLevel::High,
        "gui.capture" => RiskLevel::Medium,
        "gui.input" => RiskLevel::High,
        "database.read" => RiskLevel::Medium,
        "database.write" => RiskLevel::High,
        "memory.read" | "memory.write" => RiskLevel::Low,
        "security.manage" => RiskLevel::Critical,
        _ => RiskLevel::Medium,
    }
}
