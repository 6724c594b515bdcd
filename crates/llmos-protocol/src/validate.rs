//! Structural plan validation.
//!
//! Enforces the plan invariants before anything is scheduled: unique action
//! ids, resolvable dependencies, an acyclic dependency graph, well-formed
//! module/action identifiers, and a resolvable rollback reference wherever
//! `on_error = rollback`. All violations are collected into one
//! [`ProtocolError::Validation`] so a correction prompt can enumerate every
//! field at once.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use regex::Regex;

use crate::error::{ProtocolError, ValidationIssue};
use crate::plan::{OnErrorPolicy, Plan};

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("static identifier regex"))
}

fn action_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static action id regex"))
}

/// Validates a migrated plan against the protocol invariants.
///
/// Returns all issues at once rather than failing on the first one.
pub fn validate(plan: &Plan) -> Result<(), ProtocolError> {
    let mut issues: Vec<ValidationIssue> = Vec::new();

    if plan.actions.is_empty() {
        issues.push(ValidationIssue::new(
            "actions",
            "plan must contain at least one action",
        ));
    }

    // Unique, well-formed action ids.
    let mut seen: HashSet<&str> = HashSet::new();
    for (i, action) in plan.actions.iter().enumerate() {
        let path = format!("actions[{i}].id");
        if action.id.is_empty() {
            issues.push(ValidationIssue::new(path.clone(), "action id must not be empty"));
        } else if !action_id_re().is_match(&action.id) {
            issues.push(ValidationIssue::new(
                path.clone(),
                format!(
                    "action id '{}' must match [A-Za-z0-9_-]+",
                    action.id
                ),
            ));
        }
        if !seen.insert(action.id.as_str()) {
            issues.push(ValidationIssue::new(
                path,
                format!("duplicate action id '{}'", action.id),
            ));
        }
    }

    let ids: HashSet<&str> = plan.actions.iter().map(|a| a.id.as_str()).collect();

    for (i, action) in plan.actions.iter().enumerate() {
        // Module/action identifiers are lowercase snake_case.
        if !identifier_re().is_match(&action.module) {
            issues.push(ValidationIssue::new(
                format!("actions[{i}].module"),
                format!(
                    "module '{}' must be lowercase snake_case (e.g. 'filesystem')",
                    action.module
                ),
            ));
        }
        if !identifier_re().is_match(&action.action) {
            issues.push(ValidationIssue::new(
                format!("actions[{i}].action"),
                format!(
                    "action name '{}' must be lowercase snake_case (e.g. 'read_file')",
                    action.action
                ),
            ));
        }

        // Every dependency resolves within the plan.
        for dep in &action.depends_on {
            if !ids.contains(dep.as_str()) {
                issues.push(ValidationIssue::new(
                    format!("actions[{i}].depends_on"),
                    format!(
                        "action '{}' depends on unknown action '{}'",
                        action.id, dep
                    ),
                ));
            }
        }

        // on_error = rollback requires a resolvable compensating reference.
        match (&action.on_error, &action.rollback) {
            (OnErrorPolicy::Rollback, None) => {
                issues.push(ValidationIssue::new(
                    format!("actions[{i}].rollback"),
                    format!(
                        "action '{}' has on_error=rollback but no rollback reference",
                        action.id
                    ),
                ));
            }
            (_, Some(rollback)) => {
                if !ids.contains(rollback.action.as_str()) {
                    issues.push(ValidationIssue::new(
                        format!("actions[{i}].rollback.action"),
                        format!(
                            "rollback references unknown action '{}'",
                            rollback.action
                        ),
                    ));
                }
            }
            _ => {}
        }
    }

    issues.extend(find_cycles(plan));

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::Validation { issues })
    }
}

/// Detects dependency cycles, naming every node in each cycle.
fn find_cycles(plan: &Plan) -> Vec<ValidationIssue> {
    let mut graph = DiGraph::<&str, ()>::new();
    let mut indices = HashMap::new();
    for action in &plan.actions {
        // Duplicate ids are reported separately; keep the first node.
        indices
            .entry(action.id.as_str())
            .or_insert_with(|| graph.add_node(action.id.as_str()));
    }
    for action in &plan.actions {
        let Some(&target) = indices.get(action.id.as_str()) else {
            continue;
        };
        for dep in &action.depends_on {
            if let Some(&source) = indices.get(dep.as_str()) {
                graph.add_edge(source, target, ());
            }
        }
    }

    let mut issues = Vec::new();
    for component in tarjan_scc(&graph) {
        let is_cycle = component.len() > 1
            || component
                .iter()
                .any(|&node| graph.find_edge(node, node).is_some());
        if is_cycle {
            let mut members: Vec<&str> = component.iter().map(|&n| graph[n]).collect();
            members.sort_unstable();
            issues.push(ValidationIssue::new(
                "actions",
                format!("dependency cycle detected: {}", members.join(" -> ")),
            ));
        }
    }
    issues
}
