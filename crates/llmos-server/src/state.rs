//! Application state shared across axum handlers.
//!
//! [`AppState`] wires the whole daemon together: the durable state store,
//! the capability registry with the builtin set, the approval gate, the
//! permission manager, the event bus, the security pipeline, and the plan
//! executor. Handlers clone it freely; everything inside is shared.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use llmos_protocol::now_epoch;

use llmos_security::{
    IntentVerifier, PromptComposer, ScannerChain, ThreatCategoryRegistry,
};
use llmos_state::{MemoryStore, SqliteStore, StateStore};

use crate::approval::ApprovalGate;
use crate::capabilities::{FilesystemCapability, MemoryCapability, SecurityCapability};
use crate::capability::Capability;
use crate::config::{ServerConfig, VerifierMode};
use crate::error::ApiError;
use crate::events::EventBus;
use crate::executor::PlanExecutor;
use crate::memory_store::MemoryKv;
use crate::permissions::{PermissionManager, SharedStore};
use crate::pipeline::SecurityPipeline;
use crate::registry::CapabilityRegistry;
use crate::rollback::RollbackEngine;
use crate::verifier::LlmIntentVerifier;

/// Fixed-window admission limiter for plan submissions.
///
/// The daemon is not a fair multi-tenant scheduler; this only bounds the
/// global intake rate.
pub struct AdmissionLimiter {
    per_minute: u32,
    window: StdMutex<(u64, u32)>,
}

impl AdmissionLimiter {
    pub fn new(per_minute: u32) -> Self {
        AdmissionLimiter {
            per_minute,
            window: StdMutex::new((0, 0)),
        }
    }

    /// Returns false when the current one-minute window is exhausted.
    pub fn try_admit(&self) -> bool {
        if self.per_minute == 0 {
            return true;
        }
        let minute = now_epoch() as u64 / 60;
        let mut window = self.window.lock().expect("admission window lock");
        if window.0 != minute {
            *window = (minute, 0);
        }
        if window.1 >= self.per_minute {
            false
        } else {
            window.1 += 1;
            true
        }
    }

    pub fn limit(&self) -> u32 {
        self.per_minute
    }
}

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: SharedStore,
    pub registry: Arc<CapabilityRegistry>,
    pub gate: Arc<ApprovalGate>,
    pub events: Arc<EventBus>,
    pub permissions: Arc<PermissionManager>,
    pub memory: MemoryKv,
    pub categories: Arc<ThreatCategoryRegistry>,
    pub executor: Arc<PlanExecutor>,
    pub admission: Arc<AdmissionLimiter>,
    /// Cancellation tokens of currently supervised plans.
    pub running: Arc<DashMap<String, CancellationToken>>,
}

impl AppState {
    /// Creates the state backed by the SQLite database at
    /// `config.db_path`.
    pub fn new(config: ServerConfig) -> Result<Self, ApiError> {
        let store = SqliteStore::new(&config.db_path)
            .map_err(|err| ApiError::InternalError(err.to_string()))?;
        Self::assemble(config, Box::new(store))
    }

    /// Creates the state backed by an in-memory SQLite database
    /// (for testing).
    pub fn in_memory(config: ServerConfig) -> Result<Self, ApiError> {
        let store = SqliteStore::in_memory()
            .map_err(|err| ApiError::InternalError(err.to_string()))?;
        Self::assemble(config, Box::new(store))
    }

    /// Creates the state backed by the HashMap store (for tests that do
    /// not need SQL semantics).
    pub fn ephemeral(config: ServerConfig) -> Result<Self, ApiError> {
        Self::assemble(config, Box::new(MemoryStore::new()))
    }

    fn assemble(config: ServerConfig, mut store: Box<dyn StateStore>) -> Result<Self, ApiError> {
        // Session-scoped grants do not survive a daemon restart.
        let cleared = store
            .clear_session_grants()
            .map_err(|err| ApiError::InternalError(err.to_string()))?;
        if cleared > 0 {
            tracing::info!(cleared, "session-scoped permission grants purged");
        }

        let store: SharedStore = Arc::new(Mutex::new(store));
        let profile = config.profile.config();
        let permissions = Arc::new(PermissionManager::new(Arc::clone(&store), profile.clone()));
        let memory = MemoryKv::new();

        let capabilities: Vec<Arc<dyn Capability>> = vec![
            Arc::new(FilesystemCapability),
            Arc::new(MemoryCapability::new(memory.clone())),
            Arc::new(SecurityCapability::new(Arc::clone(&permissions))),
        ];
        let registry = Arc::new(CapabilityRegistry::with_capabilities(capabilities));

        let gate = Arc::new(ApprovalGate::new(
            config.approval_timeout,
            config.approval_timeout_behavior,
        ));
        let events = Arc::new(EventBus::new(config.event_log_path.as_deref()));
        let categories = Arc::new(ThreatCategoryRegistry::with_builtins());

        let verifier: Option<Arc<dyn IntentVerifier>> = match config.verifier_mode {
            VerifierMode::Off => None,
            mode => match (&config.verifier_base_url, &config.verifier_model) {
                (Some(base_url), Some(model)) => Some(Arc::new(LlmIntentVerifier::new(
                    base_url,
                    config.verifier_api_key.as_deref().unwrap_or_default(),
                    model,
                    PromptComposer::new(Arc::clone(&categories)),
                    mode == VerifierMode::Strict || profile.verifier_strict,
                ))),
                _ => {
                    tracing::warn!(
                        "intent verifier enabled but LLMOS_VERIFIER_BASE_URL / \
                         LLMOS_VERIFIER_MODEL are not set; running without it"
                    );
                    None
                }
            },
        };
        let pipeline = Arc::new(SecurityPipeline::new(
            ScannerChain::with_defaults(),
            verifier,
        ));

        let rollback = Arc::new(RollbackEngine::new(
            Arc::clone(&registry),
            memory.clone(),
            profile.allow_env_templates,
        ));

        let executor = Arc::new(PlanExecutor::new(
            config.clone(),
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&gate),
            Arc::clone(&permissions),
            Arc::clone(&events),
            pipeline,
            rollback,
            memory.clone(),
        ));

        let admission = Arc::new(AdmissionLimiter::new(config.plan_admission_per_minute));

        Ok(AppState {
            config: Arc::new(config),
            store,
            registry,
            gate,
            events,
            permissions,
            memory,
            categories,
            executor,
            admission,
            running: Arc::new(DashMap::new()),
        })
    }

    /// Starts the background retention sweep. Terminal plans older than
    /// the configured age are purged; running plans never are.
    pub fn spawn_retention_sweep(&self) {
        let store = Arc::clone(&self.store);
        let age = self.config.retention_age.as_secs_f64();
        let interval = self.config.retention_sweep_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let purged = store.lock().await.purge_terminal_older_than(age);
                match purged {
                    Ok(0) => {}
                    Ok(count) => tracing::info!(count, "retention sweep purged terminal plans"),
                    Err(err) => tracing::warn!(error = %err, "retention sweep failed"),
                }
            }
        });
    }
}
