//! Best-effort JSON repair for LLM-generated plan payloads.
//!
//! LLMs frequently generate JSON that is *almost* valid but fails strict
//! parsing: markdown fences, trailing commas, unquoted keys, single quotes,
//! Python literals (`True`/`False`/`None`), C-style comments, and truncated
//! output. [`repair`] applies a fixed cascade of syntax-only transformations,
//! retrying the decoder after each one. The first clean parse wins.
//!
//! Every transformation is semantics-preserving: repair fixes syntax, never
//! meaning. A transformation that changes the text but does not yet yield a
//! clean parse is kept, so later transformations build on it.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::ProtocolError;

/// Outcome of a successful [`repair`] call.
#[derive(Debug, Clone)]
pub struct RepairResult {
    /// The input after fence stripping, before the transform cascade.
    pub original_text: String,
    /// The text that finally parsed.
    pub repaired_text: String,
    /// The parsed document.
    pub parsed: Value,
    /// Names of the transformations that were kept, in application order.
    pub transformations_applied: Vec<&'static str>,
    /// False when the input parsed as-is.
    pub was_modified: bool,
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static repair regex"))
}

/// Strip `//` line comments and `/* block comments */`.
fn remove_js_comments(text: &str) -> String {
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    static LINE: OnceLock<Regex> = OnceLock::new();
    let text = regex(&BLOCK, r"(?s)/\*.*?\*/").replace_all(text, "");
    // Line comments must not touch URLs (://), so require a non-colon
    // (or line start) before the slashes.
    regex(&LINE, r"(?m)(^|[^:])//[^\n]*")
        .replace_all(&text, "$1")
        .into_owned()
}

/// Remove trailing commas before `}` or `]` (illegal in JSON).
fn trailing_commas(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r",\s*([}\]])").replace_all(text, "$1").into_owned()
}

/// Replace Python literals `True`/`False`/`None` with JSON equivalents.
fn python_literals(text: &str) -> String {
    static TRUE: OnceLock<Regex> = OnceLock::new();
    static FALSE: OnceLock<Regex> = OnceLock::new();
    static NONE: OnceLock<Regex> = OnceLock::new();
    let text = regex(&TRUE, r"\bTrue\b").replace_all(text, "true");
    let text = regex(&FALSE, r"\bFalse\b").replace_all(&text, "false");
    regex(&NONE, r"\bNone\b").replace_all(&text, "null").into_owned()
}

/// Quote unquoted object keys: `{key: ...}` becomes `{"key": ...}`.
fn unquoted_keys(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:")
        .replace_all(text, "$1\"$2\":")
        .into_owned()
}

/// Heuristically convert single-quoted strings to double-quoted.
///
/// Only handles the common case where single quotes wrap values with no
/// internal single quotes; escaped quotes would need a full parser.
fn single_to_double_quotes(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"'([^']*)'").replace_all(text, "\"$1\"").into_owned()
}

/// Append missing closing delimiters for truncated output.
///
/// Tracks open `{`/`[` outside string literals and closes them in nesting
/// order; a string cut off mid-way is closed first.
fn close_open_structure(text: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }
    if stack.is_empty() && !in_string {
        return text.to_string();
    }
    let mut out = text.trim_end().to_string();
    if in_string {
        out.push('"');
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

/// The cascade, applied in fixed order.
const REPAIRS: &[(&str, fn(&str) -> String)] = &[
    ("remove_js_comments", remove_js_comments),
    ("trailing_commas", trailing_commas),
    ("python_literals", python_literals),
    ("unquoted_keys", unquoted_keys),
    ("single_to_double_quotes", single_to_double_quotes),
    ("close_open_structure", close_open_structure),
];

/// Strip common LLM wrapper patterns: ```json ... ``` or ``` ... ```.
fn strip_fences(text: &str) -> String {
    static OPEN: OnceLock<Regex> = OnceLock::new();
    static CLOSE: OnceLock<Regex> = OnceLock::new();
    let text = text.trim();
    let text = regex(&OPEN, r"(?i)^```(?:json)?\s*").replace(text, "");
    let text = regex(&CLOSE, r"\s*```$").replace(&text, "");
    text.trim().to_string()
}

/// Attempt to repair `text` into valid JSON.
///
/// Returns the parsed document plus metadata about which transformations
/// were applied. Fails with [`ProtocolError::Parse`] carrying the final
/// decoder error when the cascade is exhausted.
pub fn repair(text: &str) -> Result<RepairResult, ProtocolError> {
    let text = strip_fences(text);

    // Fast path: already valid.
    if let Ok(parsed) = serde_json::from_str::<Value>(&text) {
        return Ok(RepairResult {
            original_text: text.clone(),
            repaired_text: text,
            parsed,
            transformations_applied: Vec::new(),
            was_modified: false,
        });
    }

    let mut applied = Vec::new();
    let mut current = text.clone();
    let mut last_error = String::new();

    for (name, transform) in REPAIRS {
        let candidate = transform(&current);
        match serde_json::from_str::<Value>(&candidate) {
            Ok(parsed) => {
                applied.push(*name);
                return Ok(RepairResult {
                    original_text: text,
                    repaired_text: candidate,
                    parsed,
                    transformations_applied: applied,
                    was_modified: true,
                });
            }
            Err(err) => {
                if candidate != current {
                    // Keep the change even though it didn't fix things yet,
                    // so subsequent transforms build on it.
                    applied.push(*name);
                    current = candidate;
                }
                last_error = err.to_string();
            }
        }
    }

    Err(ProtocolError::Parse {
        detail: format!(
            "repair failed after {} transformation(s); last JSON error: {}",
            applied.len(),
            last_error
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_json_is_returned_unchanged() {
        let input = r#"{"plan_id": "p1", "actions": []}"#;
        let result = repair(input).unwrap();
        assert!(!result.was_modified);
        assert!(result.transformations_applied.is_empty());
        assert_eq!(result.repaired_text, input);
        assert_eq!(result.parsed["plan_id"], json!("p1"));
    }

    #[test]
    fn markdown_fences_are_stripped() {
        let input = "```json\n{\"a\": 1}\n```";
        let result = repair(input).unwrap();
        assert_eq!(result.parsed, json!({"a": 1}));
        // Fence stripping happens before the cascade, so a clean parse
        // afterwards still counts as unmodified.
        assert!(!result.was_modified);
    }

    #[test]
    fn trailing_commas_are_removed() {
        let result = repair(r#"{"a": [1, 2, 3,], "b": 2,}"#).unwrap();
        assert!(result.was_modified);
        assert!(result.transformations_applied.contains(&"trailing_commas"));
        assert_eq!(result.parsed, json!({"a": [1, 2, 3], "b": 2}));
    }

    #[test]
    fn python_literals_are_converted() {
        let result = repair(r#"{"ok": True, "bad": False, "missing": None}"#).unwrap();
        assert_eq!(
            result.parsed,
            json!({"ok": true, "bad": false, "missing": null})
        );
    }

    #[test]
    fn unquoted_keys_are_quoted() {
        let result = repair(r#"{plan_id: "p1", actions: []}"#).unwrap();
        assert_eq!(result.parsed["plan_id"], json!("p1"));
    }

    #[test]
    fn single_quotes_become_double_quotes() {
        let result = repair(r#"{'a': 'hello'}"#).unwrap();
        assert_eq!(result.parsed, json!({"a": "hello"}));
    }

    #[test]
    fn comments_are_stripped_but_urls_survive() {
        let input = "{\n  // the endpoint\n  \"url\": \"https://example.com\" /* inline */\n}";
        let result = repair(input).unwrap();
        assert_eq!(result.parsed["url"], json!("https://example.com"));
    }

    #[test]
    fn truncated_output_is_closed() {
        let result = repair(r#"{"a": {"b": [1, 2"#).unwrap();
        assert_eq!(result.parsed, json!({"a": {"b": [1, 2]}}));
    }

    #[test]
    fn multiple_defects_compose() {
        let input = "```json\n{plan_id: 'p1', \"steps\": [True,],}\n```";
        let result = repair(input).unwrap();
        assert_eq!(result.parsed, json!({"plan_id": "p1", "steps": [true]}));
        assert!(result.transformations_applied.len() >= 2);
    }

    #[test]
    fn unrepairable_garbage_fails_with_parse_error() {
        let err = repair("this is not even close to json }{").unwrap_err();
        assert!(matches!(err, ProtocolError::Parse { .. }));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_json(depth: u32) -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::from),
                any::<i64>().prop_map(Value::from),
                "[a-z :/,{}]{0,12}".prop_map(Value::from),
            ];
            leaf.prop_recursive(depth, 32, 4, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
                    prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                        .prop_map(|m| Value::Object(m.into_iter().collect())),
                ]
            })
        }

        proptest! {
            // Repair applied to already-valid JSON is the identity.
            #[test]
            fn repair_is_identity_on_valid_json(value in arb_json(3)) {
                let text = serde_json::to_string(&value).unwrap();
                let result = repair(&text).unwrap();
                prop_assert!(!result.was_modified);
                prop_assert_eq!(result.parsed, value);
            }
        }
    }
}
