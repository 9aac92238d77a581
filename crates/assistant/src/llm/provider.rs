//! LLM Provider Abstraction
//!
//! Provides a unified completion interface over different LLM providers using Rig.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use rig::completion::Prompt;
use rig::providers::{anthropic, openai};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: Some(0.5),
            timeout_seconds: Some(120),
        }
    }
}

/// Trait for LLM providers that can answer a system + user prompt pair
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

async fn with_timeout<F>(timeout: Option<Duration>, fut: F) -> Result<String>
where
    F: std::future::Future<Output = Result<String>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| anyhow::anyhow!("LLM request timed out after {:?}", limit))?,
        None => fut.await,
    }
}

/// Anthropic Claude provider using Rig
pub struct AnthropicProvider {
    client: anthropic::Client,
    model: String,
    temperature: Option<f64>,
    timeout: Option<Duration>,
}

impl AnthropicProvider {
    pub fn new(config: &LLMConfig) -> Result<Self> {
        let client = if let Some(key) = &config.api_key {
            anthropic::Client::new(
                key,
                "https://api.anthropic.com",
                None,
                anthropic::ANTHROPIC_VERSION_LATEST,
            )
        } else {
            // Reads ANTHROPIC_API_KEY
            anthropic::Client::from_env()
        };

        Ok(Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature.map(f64::from),
            timeout: config.timeout_seconds.map(Duration::from_secs),
        })
    }

    /// Map model name to Rig's model constant
    fn get_model_id(&self) -> &str {
        match self.model.as_str() {
            "claude-3-5-sonnet" | "claude-3-5-sonnet-20241022" => anthropic::CLAUDE_3_5_SONNET,
            "claude-3-7-sonnet" => anthropic::CLAUDE_3_7_SONNET,
            "claude-3-haiku" | "claude-3-haiku-20240307" => anthropic::CLAUDE_3_HAIKU,
            "claude-3-opus" | "claude-3-opus-20240229" => anthropic::CLAUDE_3_OPUS,
            other => other,
        }
    }
}

#[async_trait::async_trait]
impl LLMProvider for AnthropicProvider {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let mut builder = self.client.agent(self.get_model_id()).preamble(system);
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }
        let agent = builder.build();

        with_timeout(self.timeout, async {
            agent
                .prompt(prompt)
                .await
                .map_err(|e| anyhow::anyhow!("Anthropic API error: {:?}", e))
        })
        .await
    }
}

/// OpenAI provider using Rig
pub struct OpenAIProvider {
    client: openai::Client,
    model: String,
    temperature: Option<f64>,
    timeout: Option<Duration>,
}

impl OpenAIProvider {
    pub fn new(config: &LLMConfig) -> Result<Self> {
        let client = if let Some(key) = &config.api_key {
            openai::Client::new(key)
        } else {
            // Reads OPENAI_API_KEY
            openai::Client::from_env()
        };

        Ok(Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature.map(f64::from),
            timeout: config.timeout_seconds.map(Duration::from_secs),
        })
    }
}

#[async_trait::async_trait]
impl LLMProvider for OpenAIProvider {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let mut builder = self.client.agent(&self.model).preamble(system);
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }
        let agent = builder.build();

        with_timeout(self.timeout, async {
            agent
                .prompt(prompt)
                .await
                .map_err(|e| anyhow::anyhow!("OpenAI API error: {:?}", e))
        })
        .await
    }
}

/// Offline provider with canned, keyword-driven replies.
///
/// Understands the schema layout produced by `Database::describe_schema`
/// well enough to answer simple "how many"/"list" questions against it.
pub struct MockProvider;

impl MockProvider {
    fn tables(system: &str) -> Vec<String> {
        system
            .lines()
            .filter_map(|line| line.strip_prefix("Table: "))
            .map(|name| name.trim().to_string())
            .collect()
    }

    fn after<'a>(text: &'a str, marker: &str) -> &'a str {
        text.split_once(marker)
            .map(|(_, rest)| rest.lines().next().unwrap_or("").trim())
            .unwrap_or("")
    }

    fn mentioned_table(tables: &[String], question: &str) -> Option<String> {
        let question = question.to_lowercase();
        tables
            .iter()
            .find(|table| {
                let table = table.to_lowercase();
                question.contains(&table) || question.contains(table.trim_end_matches('s'))
            })
            .cloned()
    }
}

#[async_trait::async_trait]
impl LLMProvider for MockProvider {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let reply = if system.contains("not_relevant") {
            let question = Self::after(prompt, "Question:");
            match Self::mentioned_table(&Self::tables(system), question) {
                Some(_) => "relevant".to_string(),
                None => "not_relevant".to_string(),
            }
        } else if system.contains("single SQL statement") {
            let question = Self::after(prompt, "Question:");
            match Self::mentioned_table(&Self::tables(system), question) {
                Some(table) if question.to_lowercase().contains("how many") => {
                    format!("SELECT COUNT(*) AS count FROM {}", table)
                }
                Some(table) => format!("SELECT * FROM {} LIMIT 10", table),
                None => "SELECT 1 AS answer".to_string(),
            }
        } else if system.contains("reformulate") {
            format!(
                "Please answer precisely: {}",
                Self::after(prompt, "Original Question:")
            )
        } else if system.contains("playful") {
            "I can't help with that one, but every question brings you closer to the answer!"
                .to_string()
        } else {
            format!("Here is what I found: {}", Self::after(prompt, "Result:\n"))
        };

        Ok(reply)
    }
}

/// Accepted values for `LLMConfig::provider`.
pub const SUPPORTED_PROVIDERS: &[&str] = &["anthropic", "claude", "openai", "mock"];

/// Create a provider from configuration
pub fn create_provider(config: &LLMConfig) -> Result<Arc<dyn LLMProvider>> {
    match config.provider.as_str() {
        "anthropic" | "claude" => Ok(Arc::new(AnthropicProvider::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "mock" => {
            warn!("Using the offline mock provider; answers are canned");
            Ok(Arc::new(MockProvider))
        }
        other => Err(anyhow::anyhow!(
            "Unknown LLM provider '{}' (expected one of: {})",
            other,
            SUPPORTED_PROVIDERS.join(", ")
        )),
    }
}
