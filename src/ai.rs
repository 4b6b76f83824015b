//! Chat model abstraction and the Gemini provider.
//!
//! [`ChatModel`] is the single outbound seam to the external language model:
//! one prompt in, one completion out. The production implementation calls the
//! Gemini `generateContent` API. There is deliberately no retry or backoff —
//! a failed call surfaces to the chat caller, who may resend. A bounded
//! request timeout keeps a wedged provider from pinning the request cycle.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::config::AiConfig;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Returned when the model produces a response with no candidate text.
const EMPTY_RESPONSE_FALLBACK: &str = "I apologize, but I couldn't generate a response.";

/// The model call failed; the caller's user message stays persisted.
#[derive(Debug)]
pub enum ModelError {
    Unavailable(String),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::Unavailable(msg) => write!(f, "model unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {}

/// Black-box text completion.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

// ============ Disabled ============

/// Placeholder provider used when no AI provider is configured. Every call
/// fails, which the HTTP layer maps to a 502.
pub struct DisabledModel;

#[async_trait]
impl ChatModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ModelError> {
        Err(ModelError::Unavailable(
            "AI provider is disabled in configuration".to_string(),
        ))
    }
}

// ============ Gemini ============

/// Gemini chat provider. Requires the `GEMINI_API_KEY` environment variable.
pub struct GeminiModel {
    model: String,
    timeout: Duration,
    base_url: String,
}

impl GeminiModel {
    pub fn new(config: &AiConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("ai.model required for Gemini provider"))?;

        if std::env::var("GEMINI_API_KEY").is_err() {
            anyhow::bail!("GEMINI_API_KEY environment variable not set");
        }

        Ok(Self {
            model,
            timeout: Duration::from_secs(config.timeout_secs),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }
}

#[async_trait]
impl ChatModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ModelError::Unavailable("GEMINI_API_KEY not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;

        let body = serde_json::json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{ "text": prompt }],
                }
            ],
        });

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ModelError::Unavailable(format!(
                "Gemini API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;

        Ok(candidate_text(&json))
    }
}

/// Extract `candidates[0].content.parts[0].text`, falling back to a fixed
/// apology when the response carries no text.
fn candidate_text(json: &serde_json::Value) -> String {
    json.get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("text"))
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .unwrap_or_else(|| EMPTY_RESPONSE_FALLBACK.to_string())
}

/// Create the configured [`ChatModel`].
pub fn create_model(config: &AiConfig) -> Result<Box<dyn ChatModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledModel)),
        "gemini" => Ok(Box::new(GeminiModel::new(config)?)),
        other => anyhow::bail!("Unknown AI provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_text_happy_path() {
        let json = serde_json::json!({
            "candidates": [
                { "content": { "parts": [{ "text": "The answer is 42." }] } }
            ]
        });
        assert_eq!(candidate_text(&json), "The answer is 42.");
    }

    #[test]
    fn missing_candidates_yield_apology() {
        let json = serde_json::json!({ "candidates": [] });
        assert_eq!(candidate_text(&json), EMPTY_RESPONSE_FALLBACK);
        let json = serde_json::json!({});
        assert_eq!(candidate_text(&json), EMPTY_RESPONSE_FALLBACK);
    }

    #[test]
    fn empty_text_yields_apology() {
        let json = serde_json::json!({
            "candidates": [
                { "content": { "parts": [{ "text": "" }] } }
            ]
        });
        assert_eq!(candidate_text(&json), EMPTY_RESPONSE_FALLBACK);
    }

    #[tokio::test]
    async fn disabled_model_always_fails() {
        let err = DisabledModel.complete("hi").await.unwrap_err();
        assert!(matches!(err, ModelError::Unavailable(_)));
    }
}
