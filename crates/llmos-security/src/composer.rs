//! Security analysis prompt composition.
//!
//! [`PromptComposer`] renders the enabled threat categories into the system
//! prompt handed to the intent verifier. The composed prompt is cached and
//! keyed by the registry revision, so category changes invalidate it
//! automatically.

use std::sync::{Arc, Mutex};

use crate::categories::ThreatCategoryRegistry;

const PREAMBLE: &str = "\
You are the security analyst of a local automation daemon. You receive a \
declarative JSON plan that a language-model agent wants to execute on the \
host machine. Analyse the plan against the threat categories below and \
answer with a single JSON object:\n\
{\"verdict\": \"approve|warn|reject|clarify\", \"reasoning\": \"...\", \
\"affected_actions\": [\"action_id\", ...], \"threats\": [\"category_id\", ...], \
\"risk_level\": \"low|medium|high|critical\"}\n\n\
Verdict rules: use \"reject\" only for clear threats, \"warn\" for \
suspicious but plausible plans, \"clarify\" when you cannot decide without \
more context, and \"approve\" otherwise.\n";

/// Composes (and caches) the verifier system prompt.
pub struct PromptComposer {
    registry: Arc<ThreatCategoryRegistry>,
    cache: Mutex<Option<(u64, Arc<String>)>>,
}

impl PromptComposer {
    pub fn new(registry: Arc<ThreatCategoryRegistry>) -> Self {
        PromptComposer {
            registry,
            cache: Mutex::new(None),
        }
    }

    /// Returns the composed system prompt, rebuilding it only when the
    /// category registry changed since the last call.
    pub fn compose(&self) -> Arc<String> {
        let revision = self.registry.revision();
        let mut cache = self.cache.lock().expect("prompt cache lock");
        if let Some((cached_revision, prompt)) = cache.as_ref() {
            if *cached_revision == revision {
                return Arc::clone(prompt);
            }
        }

        let prompt = Arc::new(self.render());
        *cache = Some((revision, Arc::clone(&prompt)));
        prompt
    }

    fn render(&self) -> String {
        let mut out = String::from(PREAMBLE);
        out.push_str("\nTHREAT CATEGORIES:\n");
        for category in self.registry.list_enabled() {
            out.push_str(&format!(
                "\n## {} ({})\n{}\n",
                category.name, category.id, category.description
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::{ThreatCategory, ThreatType};

    #[test]
    fn composed_prompt_contains_enabled_categories() {
        let registry = Arc::new(ThreatCategoryRegistry::with_builtins());
        let composer = PromptComposer::new(Arc::clone(&registry));

        let prompt = composer.compose();
        assert!(prompt.contains("prompt_injection"));
        assert!(prompt.contains("resource_abuse"));
        assert!(prompt.contains("\"verdict\""));
    }

    #[test]
    fn cache_is_reused_until_the_registry_changes() {
        let registry = Arc::new(ThreatCategoryRegistry::with_builtins());
        let composer = PromptComposer::new(Arc::clone(&registry));

        let first = composer.compose();
        let second = composer.compose();
        assert!(Arc::ptr_eq(&first, &second));

        registry.set_enabled("resource_abuse", false);
        let third = composer.compose();
        assert!(!Arc::ptr_eq(&second, &third));
        assert!(!third.contains("Resource Abuse"));
    }

    #[test]
    fn custom_categories_appear_after_registration() {
        let registry = Arc::new(ThreatCategoryRegistry::with_builtins());
        let composer = PromptComposer::new(Arc::clone(&registry));
        composer.compose();

        registry.register(ThreatCategory {
            id: "data_retention".to_string(),
            name: "Data Retention Violations".to_string(),
            description: "Flag plans storing personal data beyond policy.".to_string(),
            threat_type: ThreatType::Custom,
            enabled: true,
            builtin: false,
        });

        assert!(composer.compose().contains("data_retention"));
    }
}
