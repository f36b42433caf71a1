//! Text-generation provider client

use crate::config::ProviderSettings;
use crate::error::{ForgeError, Result};
use async_trait::async_trait;
use forge_types::ChatTurn;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Anything that turns a conversation into free-form text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a reply to `user`, given system instructions and prior turns
    async fn generate(&self, system: &str, history: &[ChatTurn], user: &str) -> Result<String>;
}

/// OpenAI-compatible chat-completions client
pub struct OpenAiProvider {
    http: Client,
    settings: ProviderSettings,
}

impl OpenAiProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self { http, settings })
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }
}

/// Chat-completions request body: system turn, history, trailing user turn
pub fn request_body(
    settings: &ProviderSettings,
    system: &str,
    history: &[ChatTurn],
    user: &str,
) -> Value {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(json!({ "role": "system", "content": system }));
    for turn in history {
        messages.push(json!(turn));
    }
    messages.push(json!({ "role": "user", "content": user }));

    json!({
        "model": settings.model,
        "messages": messages,
        "max_tokens": settings.max_tokens,
        "temperature": settings.temperature,
    })
}

/// Text of the first choice in a chat-completions response
pub fn completion_text(body: &Value) -> Option<String> {
    let choice = body["choices"].get(0)?;
    if choice["finish_reason"] == "length" {
        warn!("Provider stopped at the token limit; response is truncated");
    }
    choice["message"]["content"].as_str().map(|s| s.to_string())
}

/// Human readable message from a provider error body
pub fn error_message(body: &str) -> String {
    let parsed: Value = serde_json::from_str(body).unwrap_or_default();
    parsed["error"]["message"]
        .as_str()
        .or_else(|| parsed["error"].as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "no response body".to_string()
            } else {
                trimmed.chars().take(500).collect()
            }
        })
}

#[async_trait]
impl TextGenerator for OpenAiProvider {
    async fn generate(&self, system: &str, history: &[ChatTurn], user: &str) -> Result<String> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ForgeError::Config("No provider API key configured".to_string()))?;

        let body = request_body(&self.settings, system, history, user);
        debug!(
            "Sending generation request to {} ({} history turns)",
            self.settings.api_url,
            history.len()
        );

        let response = self
            .http
            .post(&self.settings.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ForgeError::Provider {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let parsed: Value = serde_json::from_str(&text)?;
        completion_text(&parsed).ok_or_else(|| ForgeError::Provider {
            status: status.as_u16(),
            message: "response contained no completion text".to_string(),
        })
    }
}
