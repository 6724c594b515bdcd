//! Permission profiles: named bundles of security posture.
//!
//! A profile decides the ambient rules that apply before any per-action
//! checks: whether `{{env.*}}` templates resolve, whether low-risk
//! permissions auto-grant on first use, whether the intent verifier runs
//! in strict mode, and which modules are denied outright.

use serde::{Deserialize, Serialize};

/// The built-in profile names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecurityProfile {
    /// Everything locked down: no env templates, no auto-grant, strict
    /// intent verification.
    Strict,
    /// The daemon default.
    #[default]
    Standard,
    /// For trusted local development: env templates and auto-grant on.
    Permissive,
}

impl std::str::FromStr for SecurityProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(SecurityProfile::Strict),
            "standard" => Ok(SecurityProfile::Standard),
            "permissive" => Ok(SecurityProfile::Permissive),
            other => Err(format!("unknown security profile '{other}'")),
        }
    }
}

impl SecurityProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityProfile::Strict => "strict",
            SecurityProfile::Standard => "standard",
            SecurityProfile::Permissive => "permissive",
        }
    }

    /// Resolves the profile to its concrete configuration.
    pub fn config(self) -> ProfileConfig {
        match self {
            SecurityProfile::Strict => ProfileConfig {
                name: self,
                allow_env_templates: false,
                auto_grant_low_risk: false,
                verifier_strict: true,
                denied_modules: vec!["os_exec".to_string()],
            },
            SecurityProfile::Standard => ProfileConfig {
                name: self,
                allow_env_templates: true,
                auto_grant_low_risk: false,
                verifier_strict: false,
                denied_modules: Vec::new(),
            },
            SecurityProfile::Permissive => ProfileConfig {
                name: self,
                allow_env_templates: true,
                auto_grant_low_risk: true,
                verifier_strict: false,
                denied_modules: Vec::new(),
            },
        }
    }
}

/// Concrete settings derived from a [`SecurityProfile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub name: SecurityProfile,
    /// Whether `{{env.NAME}}` templates may resolve.
    pub allow_env_templates: bool,
    /// Whether a missing low-risk permission is granted on first access.
    pub auto_grant_low_risk: bool,
    /// Whether intent-verifier clarify verdicts and verifier errors abort.
    pub verifier_strict: bool,
    /// Modules rejected at permission-check time regardless of grants.
    pub denied_modules: Vec<String>,
}

impl ProfileConfig {
    pub fn denies_module(&self, module: &str) -> bool {
        self.denied_modules.iter().any(|m| m == module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_profile_locks_everything_down() {
        let config = SecurityProfile::Strict.config();
        assert!(!config.allow_env_templates);
        assert!(!config.auto_grant_low_risk);
        assert!(config.verifier_strict);
        assert!(config.denies_module("os_exec"));
    }

    #[test]
    fn permissive_profile_enables_auto_grant() {
        let config = SecurityProfile::Permissive.config();
        assert!(config.allow_env_templates);
        assert!(config.auto_grant_low_risk);
        assert!(!config.verifier_strict);
    }

    #[test]
    fn profile_parses_from_str() {
        assert_eq!(
            "strict".parse::<SecurityProfile>().unwrap(),
            SecurityProfile::Strict
        );
        assert!("root".parse::<SecurityProfile>().is_err());
    }
}
