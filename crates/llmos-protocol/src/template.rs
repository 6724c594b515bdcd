//! Template resolution engine.
//!
//! Resolves `{{result.action_id.field}}`, `{{memory.key}}`, and
//! `{{env.VAR_NAME}}` expressions in action params immediately before
//! dispatch. The grammar is fixed: one namespace, one reference, one
//! optional field — no nested expressions, no pipes, no code.
//!
//! If a parameter value equals exactly one expression, substitution
//! preserves the referenced value's original type. Otherwise every
//! expression is coerced to its string form and concatenated into the
//! surrounding text.
//!
//! Resolution is pure: inputs are the completed-results map, a memory
//! snapshot, and the process environment (which restrictive profiles
//! disable).

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ProtocolError;

fn template_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{(\w+)\.([\w-]+)(?:\.(\w+))?\}\}").expect("static template regex")
    })
}

/// Resolves template expressions in action params.
pub struct TemplateResolver<'a> {
    results: &'a HashMap<String, Value>,
    memory: &'a HashMap<String, Value>,
    allow_env: bool,
}

impl<'a> TemplateResolver<'a> {
    pub fn new(
        results: &'a HashMap<String, Value>,
        memory: &'a HashMap<String, Value>,
        allow_env: bool,
    ) -> Self {
        TemplateResolver {
            results,
            memory,
            allow_env,
        }
    }

    /// Returns a new params map with all template expressions resolved.
    pub fn resolve(&self, params: &Map<String, Value>) -> Result<Map<String, Value>, ProtocolError> {
        let mut out = Map::with_capacity(params.len());
        for (key, value) in params {
            out.insert(key.clone(), self.resolve_value(value)?);
        }
        Ok(out)
    }

    fn resolve_value(&self, value: &Value) -> Result<Value, ProtocolError> {
        match value {
            Value::String(s) => self.resolve_string(s),
            Value::Object(fields) => {
                let mut out = Map::with_capacity(fields.len());
                for (k, v) in fields {
                    out.insert(k.clone(), self.resolve_value(v)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => {
                let resolved: Result<Vec<Value>, ProtocolError> =
                    items.iter().map(|v| self.resolve_value(v)).collect();
                Ok(Value::Array(resolved?))
            }
            other => Ok(other.clone()),
        }
    }

    /// Resolves all expressions in one string value.
    ///
    /// A whole-string single expression keeps the referenced value's type;
    /// embedded expressions stringify into the surrounding text.
    fn resolve_string(&self, value: &str) -> Result<Value, ProtocolError> {
        let matches: Vec<regex::Captures> = template_re().captures_iter(value).collect();
        if matches.is_empty() {
            return Ok(Value::String(value.to_string()));
        }

        if matches.len() == 1 && matches[0].get(0).unwrap().as_str() == value {
            let caps = &matches[0];
            return self.resolve_expression(
                &caps[1],
                &caps[2],
                caps.get(3).map(|m| m.as_str()),
                caps.get(0).unwrap().as_str(),
            );
        }

        let mut out = value.to_string();
        for caps in &matches {
            let original = caps.get(0).unwrap().as_str();
            let resolved = self.resolve_expression(
                &caps[1],
                &caps[2],
                caps.get(3).map(|m| m.as_str()),
                original,
            )?;
            out = out.replace(original, &stringify(&resolved));
        }
        Ok(Value::String(out))
    }

    fn resolve_expression(
        &self,
        namespace: &str,
        reference: &str,
        field: Option<&str>,
        original: &str,
    ) -> Result<Value, ProtocolError> {
        match namespace {
            "result" => self.resolve_result(reference, field, original),
            "memory" => self.resolve_memory(reference, original),
            "env" => self.resolve_env(reference, original),
            other => Err(error(
                original,
                format!("unknown template namespace '{other}'; supported: result, memory, env"),
            )),
        }
    }

    fn resolve_result(
        &self,
        action_id: &str,
        field: Option<&str>,
        original: &str,
    ) -> Result<Value, ProtocolError> {
        let Some(result) = self.results.get(action_id) else {
            return Err(error(
                original,
                format!(
                    "action '{action_id}' has not produced a result yet; \
                     check that it appears in 'depends_on'"
                ),
            ));
        };
        let Some(field) = field else {
            return Ok(result.clone());
        };
        let Value::Object(fields) = result else {
            return Err(error(
                original,
                format!("action '{action_id}' result is not an object; cannot access field '{field}'"),
            ));
        };
        match fields.get(field) {
            Some(value) => Ok(value.clone()),
            None => {
                let mut available: Vec<&String> = fields.keys().collect();
                available.sort();
                Err(error(
                    original,
                    format!(
                        "action '{action_id}' result has no field '{field}'; available fields: {available:?}"
                    ),
                ))
            }
        }
    }

    fn resolve_memory(&self, key: &str, original: &str) -> Result<Value, ProtocolError> {
        match self.memory.get(key) {
            Some(value) => Ok(value.clone()),
            None => {
                let mut available: Vec<&String> = self.memory.keys().collect();
                available.sort();
                Err(error(
                    original,
                    format!("memory key '{key}' not found; available keys: {available:?}"),
                ))
            }
        }
    }

    fn resolve_env(&self, name: &str, original: &str) -> Result<Value, ProtocolError> {
        if !self.allow_env {
            return Err(error(
                original,
                "environment variable access is disabled in the current security profile",
            ));
        }
        match std::env::var(name) {
            Ok(value) => Ok(Value::String(value)),
            Err(_) => Err(error(
                original,
                format!("environment variable '{name}' is not set"),
            )),
        }
    }
}

fn error(expression: &str, reason: impl Into<String>) -> ProtocolError {
    ProtocolError::TemplateResolution {
        expression: expression.to_string(),
        reason: reason.into(),
    }
}

/// String form used when an expression is embedded in surrounding text.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn results() -> HashMap<String, Value> {
        HashMap::from([
            ("a1".to_string(), json!({"content": "hello", "size": 5})),
            ("a2".to_string(), json!(42)),
        ])
    }

    fn memory() -> HashMap<String, Value> {
        HashMap::from([("greeting".to_string(), json!("bonjour"))])
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn single_expression_preserves_type() {
        let results = results();
        let memory = memory();
        let resolver = TemplateResolver::new(&results, &memory, true);

        let out = resolver
            .resolve(&params(json!({
                "text": "{{result.a1.content}}",
                "size": "{{result.a1.size}}",
                "whole": "{{result.a1}}"
            })))
            .unwrap();

        assert_eq!(out["text"], json!("hello"));
        assert_eq!(out["size"], json!(5));
        assert_eq!(out["whole"], json!({"content": "hello", "size": 5}));
    }

    #[test]
    fn embedded_expressions_stringify() {
        let results = results();
        let memory = memory();
        let resolver = TemplateResolver::new(&results, &memory, true);

        let out = resolver
            .resolve(&params(json!({
                "msg": "got {{result.a1.content}} ({{result.a1.size}} bytes)"
            })))
            .unwrap();

        assert_eq!(out["msg"], json!("got hello (5 bytes)"));
    }

    #[test]
    fn nested_containers_are_walked() {
        let results = results();
        let memory = memory();
        let resolver = TemplateResolver::new(&results, &memory, true);

        let out = resolver
            .resolve(&params(json!({
                "nested": {"inner": ["{{memory.greeting}}", 1]}
            })))
            .unwrap();

        assert_eq!(out["nested"]["inner"], json!(["bonjour", 1]));
    }

    #[test]
    fn missing_result_hints_at_depends_on() {
        let results = results();
        let memory = memory();
        let resolver = TemplateResolver::new(&results, &memory, true);

        let err = resolver
            .resolve(&params(json!({"x": "{{result.ghost.field}}"})))
            .unwrap_err();
        match err {
            ProtocolError::TemplateResolution { reason, .. } => {
                assert!(reason.contains("depends_on"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_field_lists_available_fields() {
        let results = results();
        let memory = memory();
        let resolver = TemplateResolver::new(&results, &memory, true);

        let err = resolver
            .resolve(&params(json!({"x": "{{result.a1.nope}}"})))
            .unwrap_err();
        let reason = err.to_string();
        assert!(reason.contains("content"));
        assert!(reason.contains("size"));
    }

    #[test]
    fn field_access_on_non_object_result_fails() {
        let results = results();
        let memory = memory();
        let resolver = TemplateResolver::new(&results, &memory, true);

        let err = resolver
            .resolve(&params(json!({"x": "{{result.a2.field}}"})))
            .unwrap_err();
        assert!(err.to_string().contains("not an object"));
    }

    #[test]
    fn env_access_respects_profile_flag() {
        std::env::set_var("LLMOS_TEMPLATE_TEST_VAR", "on");
        let results = results();
        let memory = memory();

        let allowed = TemplateResolver::new(&results, &memory, true);
        let out = allowed
            .resolve(&params(json!({"v": "{{env.LLMOS_TEMPLATE_TEST_VAR}}"})))
            .unwrap();
        assert_eq!(out["v"], json!("on"));

        let denied = TemplateResolver::new(&results, &memory, false);
        let err = denied
            .resolve(&params(json!({"v": "{{env.LLMOS_TEMPLATE_TEST_VAR}}"})))
            .unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn unknown_namespace_is_rejected() {
        let results = results();
        let memory = memory();
        let resolver = TemplateResolver::new(&results, &memory, true);

        let err = resolver
            .resolve(&params(json!({"x": "{{secrets.api_key}}"})))
            .unwrap_err();
        assert!(err.to_string().contains("unknown template namespace"));
    }

    #[test]
    fn hyphenated_action_ids_resolve() {
        let results = HashMap::from([("fetch-1".to_string(), json!({"out": 1}))]);
        let memory = HashMap::new();
        let resolver = TemplateResolver::new(&results, &memory, true);

        let out = resolver
            .resolve(&params(json!({"x": "{{result.fetch-1.out}}"})))
            .unwrap();
        assert_eq!(out["x"], json!(1));
    }
}
