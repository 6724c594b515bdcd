//! Security model for the LLMOS Bridge daemon.
//!
//! Covers everything between "a plan was validated" and "an action may be
//! dispatched": risk classification, permission profiles and grants, the
//! input scanner chain, the threat category registry feeding the intent
//! verifier's system prompt, and the intent verifier contract itself.
//! The LLM-backed verifier implementation lives in the server crate; this
//! crate only defines its functional contract.

pub mod categories;
pub mod composer;
pub mod error;
pub mod grants;
pub mod profiles;
pub mod risk;
pub mod scanner;
pub mod verifier;

pub use categories::{ThreatCategory, ThreatCategoryRegistry, ThreatType};
pub use composer::PromptComposer;
pub use error::SecurityError;
pub use grants::{PermissionGrant, PermissionScope};
pub use profiles::{ProfileConfig, SecurityProfile};
pub use risk::{risk_for_permission, RiskLevel};
pub use scanner::{
    ChainOutcome, InputScanner, PatternScanner, RejectionDetails, ScanReport, ScanVerdict,
    ScannerChain, StructureScanner,
};
pub use verifier::{IntentVerifier, VerificationResult, VerificationVerdict};
