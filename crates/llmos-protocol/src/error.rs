//! Protocol error types for llmos-protocol.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! all anticipated failure modes in the plan protocol layer: JSON parsing,
//! schema validation, template resolution, and version migration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single validation failure, pointing at the offending field.
///
/// The `path` uses dotted notation (e.g. `actions[2].depends_on`) so a
/// correction prompt can direct an LLM at the exact field to fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Dotted path to the field that failed validation.
    pub path: String,
    /// Human-readable reason for the failure.
    pub reason: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors produced by the protocol layer.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The payload could not be decoded as JSON, even after repair.
    #[error("cannot parse plan JSON: {detail}")]
    Parse { detail: String },

    /// The plan failed structural validation.
    #[error("plan validation failed with {count} issue(s)", count = issues.len())]
    Validation { issues: Vec<ValidationIssue> },

    /// A `{{...}}` template expression could not be resolved.
    #[error("cannot resolve template '{expression}': {reason}")]
    TemplateResolution { expression: String, reason: String },

    /// No registered migration path reaches the current protocol version.
    #[error(
        "no migration path from protocol_version '{from}' to '{to}' (supported sources: {supported})",
        supported = supported.join(", ")
    )]
    MigrationPathMissing {
        from: String,
        to: String,
        supported: Vec<String>,
    },
}

impl ProtocolError {
    /// Convenience constructor for a single-issue validation error.
    pub fn validation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ProtocolError::Validation {
            issues: vec![ValidationIssue::new(path, reason)],
        }
    }

    /// Returns the validation issues if this is a validation error.
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            ProtocolError::Validation { issues } => issues,
            _ => &[],
        }
    }
}
