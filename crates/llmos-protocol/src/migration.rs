//! Protocol version migration registry and backward-compatibility policy.
//!
//! The daemon follows a rolling-upgrade policy: a server speaking protocol
//! v2.x accepts v1.x plans and silently upgrades them. Plans from a *newer*
//! version are rejected (forward compatibility is not guaranteed).
//!
//! Each migration is a pure function `Value -> Value` registered under a
//! `(from, to)` edge. [`MigrationRegistry::find_path`] searches the version
//! graph with BFS, so the shortest path (fewest migrations) always wins.
//! Migrations are idempotent within their target version.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::plan::{DEFAULT_ACTION_TIMEOUT_SECS, LEGACY_VERSION, PROTOCOL_VERSION};

/// A migration step: pure transformation of a raw plan document.
pub type MigrationFn = fn(Value) -> Value;

/// Registry of plan-document migrations, indexed by source version.
#[derive(Default)]
pub struct MigrationRegistry {
    // graph[from] = list of (to, migration_fn)
    graph: HashMap<String, Vec<(String, MigrationFn)>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a migration edge from one version to another.
    pub fn register(&mut self, from: &str, to: &str, migration: MigrationFn) {
        self.graph
            .entry(from.to_string())
            .or_default()
            .push((to.to_string(), migration));
    }

    /// Source versions with at least one registered outgoing migration.
    pub fn supported_sources(&self) -> Vec<String> {
        let mut versions: Vec<String> = self.graph.keys().cloned().collect();
        versions.sort();
        versions
    }

    /// Finds the shortest migration path between two versions via BFS.
    ///
    /// Returns the ordered steps, an empty list when the versions are
    /// equal, or `None` when no path exists.
    pub fn find_path(&self, from: &str, to: &str) -> Option<Vec<MigrationFn>> {
        if from == to {
            return Some(Vec::new());
        }

        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(from);
        let mut queue: VecDeque<(&str, Vec<MigrationFn>)> = VecDeque::new();
        queue.push_back((from, Vec::new()));

        while let Some((current, path)) = queue.pop_front() {
            for (next, migration) in self.graph.get(current).into_iter().flatten() {
                if visited.contains(next.as_str()) {
                    continue;
                }
                let mut new_path = path.clone();
                new_path.push(*migration);
                if next == to {
                    return Some(new_path);
                }
                visited.insert(next.as_str());
                queue.push_back((next.as_str(), new_path));
            }
        }
        None
    }
}

/// Upgrades raw plan documents to [`PROTOCOL_VERSION`].
pub struct MigrationPipeline {
    registry: MigrationRegistry,
}

impl Default for MigrationPipeline {
    fn default() -> Self {
        let mut registry = MigrationRegistry::new();
        registry.register(LEGACY_VERSION, PROTOCOL_VERSION, migrate_v1_to_v2);
        MigrationPipeline { registry }
    }
}

impl MigrationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a pipeline over a caller-assembled registry.
    pub fn with_registry(registry: MigrationRegistry) -> Self {
        MigrationPipeline { registry }
    }

    /// Migrates a raw plan document to the current protocol version.
    ///
    /// A document without a `protocol_version` field is treated as legacy
    /// ["1.0"](LEGACY_VERSION). Documents already at the current version
    /// pass through untouched, so the upgrade is idempotent.
    pub fn upgrade(&self, document: Value) -> Result<Value, ProtocolError> {
        let Value::Object(ref fields) = document else {
            return Err(ProtocolError::Parse {
                detail: "plan must be a JSON object at the top level".to_string(),
            });
        };

        let detected = fields
            .get("protocol_version")
            .and_then(Value::as_str)
            .unwrap_or(LEGACY_VERSION)
            .to_string();

        if detected == PROTOCOL_VERSION {
            return Ok(document);
        }

        let Some(path) = self.registry.find_path(&detected, PROTOCOL_VERSION) else {
            return Err(ProtocolError::MigrationPathMissing {
                from: detected,
                to: PROTOCOL_VERSION.to_string(),
                supported: self.registry.supported_sources(),
            });
        };

        let mut current = document;
        for migration in path {
            current = migration(current);
        }
        Ok(current)
    }
}

/// The built-in 1.0 -> 2.0 migration.
///
/// Changes:
/// - `steps` array renamed to `actions`
/// - each step gains `on_error` ("abort") and `timeout` (60) when missing
/// - steps without an `id` get `step_N` (1-based)
/// - positional param lists become `{"arg_0": ..., "arg_1": ...}`
/// - legacy `type`/`name` fields become `module`/`action`
fn migrate_v1_to_v2(document: Value) -> Value {
    let mut fields = match document {
        Value::Object(fields) => fields,
        other => return other,
    };

    fields.insert(
        "protocol_version".to_string(),
        Value::String(PROTOCOL_VERSION.to_string()),
    );

    let steps = fields
        .remove("steps")
        .or_else(|| fields.remove("actions"))
        .and_then(|v| match v {
            Value::Array(items) => Some(items),
            _ => None,
        })
        .unwrap_or_default();

    let actions: Vec<Value> = steps
        .into_iter()
        .enumerate()
        .map(|(i, step)| migrate_v1_step(i, step))
        .collect();

    fields.insert("actions".to_string(), Value::Array(actions));
    Value::Object(fields)
}

fn migrate_v1_step(index: usize, step: Value) -> Value {
    // Non-object steps pass through; validation rejects them later.
    let mut action = match step {
        Value::Object(action) => action,
        other => return other,
    };

    if !action.contains_key("id") {
        action.insert(
            "id".to_string(),
            Value::String(format!("step_{}", index + 1)),
        );
    }
    if !action.contains_key("on_error") {
        action.insert("on_error".to_string(), Value::String("abort".to_string()));
    }
    if !action.contains_key("timeout") && !action.contains_key("timeout_seconds") {
        action.insert(
            "timeout".to_string(),
            Value::from(DEFAULT_ACTION_TIMEOUT_SECS),
        );
    }

    // v1 allowed positional param lists for simple modules.
    if let Some(Value::Array(items)) = action.get("params").cloned() {
        let mut params = Map::new();
        for (j, item) in items.into_iter().enumerate() {
            params.insert(format!("arg_{j}"), item);
        }
        action.insert("params".to_string(), Value::Object(params));
    }

    // v1 used 'type' + 'name' instead of 'module' + 'action'.
    if !action.contains_key("module") {
        if let Some(module) = action.remove("type") {
            action.insert("module".to_string(), module);
        }
    }
    if !action.contains_key("action") {
        if let Some(name) = action.remove("name") {
            action.insert("action".to_string(), name);
        }
    }

    Value::Object(action)
}
