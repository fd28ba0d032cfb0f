use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_turbo_model")]
    pub turbo_model: String,
}

impl LlmConfig {
    /// Returns the effective base_url: if the stored value is empty,
    /// fall back to the canonical OpenAI endpoint.
    pub fn effective_base_url(&self) -> &str {
        if !self.base_url.is_empty() {
            return &self.base_url;
        }
        "https://api.openai.com/v1"
    }
}

fn default_model() -> String {
    "gpt-4".to_string()
}

fn default_turbo_model() -> String {
    "gpt-4-turbo".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        // Secrets may live in the environment instead of the file.
        if config.telegram.bot_token.is_empty() {
            if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
                config.telegram.bot_token = token;
            }
        }
        if config.llm.api_key.is_empty() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                config.llm.api_key = key;
            }
        }

        if config.telegram.bot_token.is_empty() {
            anyhow::bail!(
                "Missing Telegram bot token: set [telegram] bot_token in {} or TELEGRAM_BOT_TOKEN",
                path.display()
            );
        }
        if config.llm.api_key.is_empty() {
            anyhow::bail!(
                "Missing completion API key: set [llm] api_key in {} or OPENAI_API_KEY",
                path.display()
            );
        }

        Ok(config)
    }
}
