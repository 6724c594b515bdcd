//! LLM-backed intent verifier.
//!
//! Talks to an OpenAI-compatible chat endpoint in JSON mode. The system
//! prompt is composed from the threat category registry and cached until
//! the registry changes.

use serde::Deserialize;
use serde_json::json;

use llmos_protocol::Plan;
use llmos_security::{
    IntentVerifier, PromptComposer, SecurityError, VerificationResult,
};

use async_trait::async_trait;

/// Reqwest-based verifier against an OpenAI-compatible provider.
pub struct LlmIntentVerifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    composer: PromptComposer,
    strict: bool,
}

impl LlmIntentVerifier {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        composer: PromptComposer,
        strict: bool,
    ) -> Self {
        LlmIntentVerifier {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            composer,
            strict,
        }
    }

    fn verification_error(plan: &Plan, reason: impl Into<String>) -> SecurityError {
        SecurityError::IntentVerification {
            plan_id: plan.plan_id.clone(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl IntentVerifier for LlmIntentVerifier {
    async fn verify_plan(&self, plan: &Plan) -> Result<VerificationResult, SecurityError> {
        let system_prompt = self.composer.compose();
        let plan_json = serde_json::to_string_pretty(plan)
            .map_err(|err| Self::verification_error(plan, err.to_string()))?;

        let endpoint = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt.as_str()},
                {"role": "user", "content": format!("Analyse this plan:\n{plan_json}")}
            ],
            "response_format": {"type": "json_object"}
        });

        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|err| Self::verification_error(plan, format!("provider request failed: {err}")))?;

        let status = response.status();
        let body_text = response.text().await.map_err(|err| {
            Self::verification_error(plan, format!("provider response read failed: {err}"))
        })?;

        if !status.is_success() {
            return Err(Self::verification_error(
                plan,
                format!("provider request failed ({status}): {body_text}"),
            ));
        }

        let parsed: ChatResponse = serde_json::from_str(&body_text).map_err(|err| {
            Self::verification_error(plan, format!("provider response parse failed: {err}"))
        })?;

        let content = parsed
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Self::verification_error(plan, "provider response missing assistant content")
            })?;

        // Tolerate fenced output from providers that ignore JSON mode.
        let content = content
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();

        serde_json::from_str(content).map_err(|err| {
            Self::verification_error(plan, format!("unparseable verifier verdict: {err}"))
        })
    }

    fn strict(&self) -> bool {
        self.strict
    }
}
