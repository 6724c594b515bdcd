//! LLM correction feedback formatter.
//!
//! When a plan fails to parse or validate, the daemon can hand the caller a
//! plain-text correction block to append to the original LLM prompt for a
//! single corrected attempt. The block enumerates the failed fields and the
//! common fixes, so the model repairs the exact problem instead of
//! regenerating the whole plan.
//!
//! Output is plain text, not JSON, so it concatenates into any prompt
//! without further escaping.

use crate::error::ValidationIssue;

const HEADER: &str = "\n--- LLMOS BRIDGE CORRECTION REQUEST ---\n\
Your previous response contained an error in the plan.\n\
Fix ONLY the reported issue and return the corrected plan.\n\
Do not change any other part of the plan.\n";

const FOOTER: &str = "--- END CORRECTION REQUEST ---\n";

/// Formats correction request blocks for parse and validation failures.
pub struct CorrectionFeedback;

impl CorrectionFeedback {
    /// Formats a correction request for a JSON syntax error.
    pub fn format_parse_error(detail: &str) -> String {
        let mut out = String::from(HEADER);
        out.push_str("\nERROR TYPE: JSON syntax error\n");
        out.push_str(&format!("ERROR: {detail}\n"));
        out.push_str(
            "\nCOMMON FIXES:\n\
             \x20 - Remove trailing commas before } or ]\n\
             \x20 - Use double quotes for all strings and keys\n\
             \x20 - Replace Python True/False/None with JSON true/false/null\n\
             \x20 - Do not add comments (// or /* */)\n\
             \x20 - Ensure every opened { and [ is closed\n\n",
        );
        out.push_str(FOOTER);
        out
    }

    /// Formats a correction request for plan validation failures.
    pub fn format_validation_error(issues: &[ValidationIssue]) -> String {
        let mut out = String::from(HEADER);
        out.push_str("\nERROR TYPE: plan validation error\n");
        for issue in issues {
            out.push_str(&format!("  FIELD: {}\n  REASON: {}\n", issue.path, issue.reason));
        }
        out.push_str(
            "\nCOMMON FIXES:\n\
             \x20 - 'protocol_version' must be exactly \"2.0\"\n\
             \x20 - Each action needs: id, module, action, params\n\
             \x20 - Action 'id' must match [a-zA-Z0-9_-] and be unique\n\
             \x20 - 'module' must be lowercase snake_case (e.g. 'filesystem')\n\
             \x20 - 'depends_on' must reference existing action ids\n\
             \x20 - 'on_error' must be one of: abort, continue, retry, rollback, skip\n\n",
        );
        out.push_str(FOOTER);
        out
    }
}
