//! The intent verifier contract: stage B of the security pipeline.
//!
//! The verifier is a function from plan to verdict; anything that can
//! classify a plan against the threat category set can implement it. The
//! daemon ships an LLM-backed implementation (server crate) and runs
//! without one when verification is disabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use llmos_protocol::Plan;

use crate::error::SecurityError;
use crate::risk::RiskLevel;

/// What the verifier concluded about a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationVerdict {
    Approve,
    /// Logged, execution continues.
    Warn,
    /// Aborts the plan.
    Reject,
    /// Aborts only in strict mode; otherwise annotates and continues.
    Clarify,
}

/// The verifier's full answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verdict: VerificationVerdict,
    pub reasoning: String,
    /// Action ids the verdict applies to (empty = whole plan).
    #[serde(default)]
    pub affected_actions: Vec<String>,
    /// Matched threat category ids.
    #[serde(default)]
    pub threats: Vec<String>,
    #[serde(default)]
    pub risk_level: RiskLevel,
}

impl VerificationResult {
    pub fn approve(reasoning: impl Into<String>) -> Self {
        VerificationResult {
            verdict: VerificationVerdict::Approve,
            reasoning: reasoning.into(),
            affected_actions: Vec::new(),
            threats: Vec::new(),
            risk_level: RiskLevel::Low,
        }
    }
}

/// A plan-to-verdict classifier consulted before execution.
#[async_trait]
pub trait IntentVerifier: Send + Sync {
    /// Classifies the plan against the registered threat categories.
    async fn verify_plan(&self, plan: &Plan) -> Result<VerificationResult, SecurityError>;

    /// Strict mode: clarify verdicts and verifier failures abort the plan.
    fn strict(&self) -> bool {
        false
    }
}
