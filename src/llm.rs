use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;

/// Word count above which the larger-context "turbo" model is used.
pub const TURBO_WORD_THRESHOLD: usize = 8000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn default_model(&self) -> &str {
        &self.config.model
    }

    /// Pick a model for the given context text: documents over the word
    /// threshold go to the turbo variant, everything else uses the default.
    pub fn select_model(&self, context: &str) -> &str {
        if context.split_whitespace().count() > TURBO_WORD_THRESHOLD {
            &self.config.turbo_model
        } else {
            &self.config.model
        }
    }

    /// One chat-completion round trip. `instruction` becomes the system
    /// message; `context`, if present, rides along as the user message.
    pub async fn complete(
        &self,
        instruction: &str,
        context: Option<&str>,
        model: &str,
    ) -> Result<String> {
        let mut messages = vec![ChatMessage {
            role: "system".to_string(),
            content: instruction.to_string(),
        }];
        if let Some(text) = context {
            messages.push(ChatMessage {
                role: "user".to_string(),
                content: text.to_string(),
            });
        }

        let request = ChatRequest {
            model: model.to_string(),
            messages,
        };

        let url = format!("{}/chat/completions", self.config.effective_base_url());

        debug!("Sending completion request to {} (model {})", url, model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send completion request")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion API error ({}): {}", status, error_body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .context("Completion response contained no choices")
    }
}
