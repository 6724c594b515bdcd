//! The front door of the protocol layer.
//!
//! [`PlanParser`] chains the stages a raw submission passes through:
//! repair (when given text), version migration, typed decoding, and
//! structural validation. The output is a [`Plan`] that downstream stages
//! can trust.

use serde_json::Value;

use crate::error::ProtocolError;
use crate::migration::MigrationPipeline;
use crate::plan::Plan;
use crate::repair;
use crate::validate;

/// Parses raw plan submissions into validated [`Plan`]s.
pub struct PlanParser {
    migrations: MigrationPipeline,
}

impl Default for PlanParser {
    fn default() -> Self {
        PlanParser {
            migrations: MigrationPipeline::new(),
        }
    }
}

impl PlanParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses raw text: repair, migrate, decode, validate.
    pub fn parse_str(&self, text: &str) -> Result<Plan, ProtocolError> {
        let repaired = repair::repair(text)?;
        self.parse_value(repaired.parsed)
    }

    /// Parses a pre-decoded document: migrate, decode, validate.
    pub fn parse_value(&self, document: Value) -> Result<Plan, ProtocolError> {
        let migrated = self.migrations.upgrade(document)?;
        let plan: Plan = serde_json::from_value(migrated)
            .map_err(|err| ProtocolError::validation("plan", err.to_string()))?;
        validate::validate(&plan)?;
        Ok(plan)
    }
}
