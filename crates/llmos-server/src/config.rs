//! Daemon configuration, read from environment variables with defaults.
//!
//! Every knob has an `LLMOS_*` variable; unset or unparseable values fall
//! back to the default. See the binary entrypoint for the full list.

use std::time::Duration;

use llmos_security::SecurityProfile;

use crate::approval::TimeoutBehavior;

/// How the intent verifier participates in the security pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifierMode {
    /// No verifier; scanner chain only.
    #[default]
    Off,
    /// Verifier runs; clarify verdicts and verifier errors do not abort.
    Permissive,
    /// Clarify verdicts and verifier errors abort the plan.
    Strict,
}

impl std::str::FromStr for VerifierMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(VerifierMode::Off),
            "permissive" => Ok(VerifierMode::Permissive),
            "strict" => Ok(VerifierMode::Strict),
            other => Err(format!("unknown verifier mode '{other}'")),
        }
    }
}

/// All daemon settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// SQLite database file path.
    pub db_path: String,
    /// HTTP listen port.
    pub port: u16,
    /// Active security profile.
    pub profile: SecurityProfile,
    /// Process-wide maximum for concurrently running actions.
    pub max_concurrent_actions: usize,
    /// Plan submissions admitted per minute; 0 disables the limit.
    pub plan_admission_per_minute: u32,
    /// Per-plan maximum for concurrently running actions.
    pub plan_max_concurrent: usize,
    /// How long a synchronous submission blocks before advising async.
    pub sync_plan_timeout: Duration,
    /// Default approval-gate timeout.
    pub approval_timeout: Duration,
    /// What the gate resolves on timeout.
    pub approval_timeout_behavior: TimeoutBehavior,
    /// Byte budget above which action results are stored truncated.
    pub result_truncate_bytes: usize,
    /// Age after which terminal plans are purged by the retention sweep.
    pub retention_age: Duration,
    /// Interval between retention sweeps.
    pub retention_sweep_interval: Duration,
    /// Optional JSONL audit event log path.
    pub event_log_path: Option<String>,
    /// Grace period granted to running actions on cancellation.
    pub cancel_grace: Duration,
    /// Intent verifier participation.
    pub verifier_mode: VerifierMode,
    /// OpenAI-compatible endpoint for the verifier.
    pub verifier_base_url: Option<String>,
    pub verifier_api_key: Option<String>,
    pub verifier_model: Option<String>,
    /// `module.action` pairs that always require approval, on top of the
    /// risk-derived rule.
    pub require_approval: Vec<(String, String)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            db_path: "llmos.db".to_string(),
            port: 8765,
            profile: SecurityProfile::Standard,
            max_concurrent_actions: 16,
            plan_admission_per_minute: 0,
            plan_max_concurrent: 4,
            sync_plan_timeout: Duration::from_secs(120),
            approval_timeout: Duration::from_secs(300),
            approval_timeout_behavior: TimeoutBehavior::Reject,
            result_truncate_bytes: 64 * 1024,
            retention_age: Duration::from_secs(7 * 24 * 3600),
            retention_sweep_interval: Duration::from_secs(3600),
            event_log_path: None,
            cancel_grace: Duration::from_secs(5),
            verifier_mode: VerifierMode::Off,
            verifier_base_url: None,
            verifier_api_key: None,
            verifier_model: None,
            require_approval: Vec::new(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

impl ServerConfig {
    /// Reads configuration from `LLMOS_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        ServerConfig {
            db_path: std::env::var("LLMOS_DB_PATH").unwrap_or(defaults.db_path),
            port: env_parse("LLMOS_PORT", defaults.port),
            profile: env_parse("LLMOS_PROFILE", defaults.profile),
            max_concurrent_actions: env_parse(
                "LLMOS_MAX_CONCURRENT_ACTIONS",
                defaults.max_concurrent_actions,
            ),
            plan_admission_per_minute: env_parse(
                "LLMOS_PLAN_ADMISSION_PER_MINUTE",
                defaults.plan_admission_per_minute,
            ),
            plan_max_concurrent: env_parse(
                "LLMOS_PLAN_MAX_CONCURRENT",
                defaults.plan_max_concurrent,
            ),
            sync_plan_timeout: env_secs("LLMOS_SYNC_PLAN_TIMEOUT", defaults.sync_plan_timeout),
            approval_timeout: env_secs("LLMOS_APPROVAL_TIMEOUT", defaults.approval_timeout),
            approval_timeout_behavior: env_parse(
                "LLMOS_APPROVAL_TIMEOUT_BEHAVIOR",
                defaults.approval_timeout_behavior,
            ),
            result_truncate_bytes: env_parse(
                "LLMOS_RESULT_TRUNCATE_BYTES",
                defaults.result_truncate_bytes,
            ),
            retention_age: env_secs("LLMOS_RETENTION_SECONDS", defaults.retention_age),
            retention_sweep_interval: env_secs(
                "LLMOS_RETENTION_SWEEP_INTERVAL",
                defaults.retention_sweep_interval,
            ),
            event_log_path: std::env::var("LLMOS_EVENT_LOG_PATH").ok(),
            cancel_grace: env_secs("LLMOS_CANCEL_GRACE_SECONDS", defaults.cancel_grace),
            verifier_mode: env_parse("LLMOS_INTENT_VERIFIER", defaults.verifier_mode),
            verifier_base_url: std::env::var("LLMOS_VERIFIER_BASE_URL").ok(),
            verifier_api_key: std::env::var("LLMOS_VERIFIER_API_KEY").ok(),
            verifier_model: std::env::var("LLMOS_VERIFIER_MODEL").ok(),
            require_approval: std::env::var("LLMOS_REQUIRE_APPROVAL")
                .map(|raw| {
                    raw.split(',')
                        .filter_map(|entry| {
                            entry
                                .trim()
                                .split_once('.')
                                .map(|(m, a)| (m.to_string(), a.to_string()))
                        })
                        .collect()
                })
                .unwrap_or(defaults.require_approval),
        }
    }

    /// True when `module.action` is on the always-require-approval list.
    pub fn requires_approval(&self, module: &str, action: &str) -> bool {
        self.require_approval
            .iter()
            .any(|(m, a)| m == module && a == action)
    }
}
