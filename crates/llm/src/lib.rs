//! LLM client abstraction for verdict
//!
//! Provides a unified chat-completion interface for the providers the
//! timestamp extractor can run against (OpenAI-compatible endpoints).

use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client as OpenAIClient,
};
use serde::{Deserialize, Serialize};

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (openai, or any OpenAI-compatible endpoint)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model to use for chat completions
    #[serde(default = "default_model")]
    pub model: String,
    /// API key (optional if using env var or local provider)
    pub api_key: Option<String>,
    /// Base URL override (for custom endpoints)
    pub base_url: Option<String>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
        }
    }
}

/// Token usage reported by a completion call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A chat completion together with its usage metadata
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// A message in a chat conversation
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// LLM client abstraction
pub struct LlmClient {
    config: LlmConfig,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }

    /// Create a client from environment variables
    ///
    /// Reads `VERDICT_LLM_MODEL`, `VERDICT_LLM_BASE_URL`, and
    /// `OPENAI_API_KEY` (all optional; defaults to gpt-4o-mini on the
    /// standard OpenAI endpoint).
    pub fn from_env() -> Result<Self> {
        let mut config = LlmConfig::default();

        if let Ok(model) = std::env::var("VERDICT_LLM_MODEL") {
            config.model = model;
        }
        if let Ok(base_url) = std::env::var("VERDICT_LLM_BASE_URL") {
            config.base_url = Some(base_url);
        }
        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            config.api_key = Some(api_key);
        }

        Ok(Self::new(config))
    }

    /// Generate a chat completion
    pub async fn chat(&self, messages: Vec<Message>) -> Result<Completion> {
        match self.config.provider.as_str() {
            "openai" => self.chat_openai(messages).await,
            provider => anyhow::bail!("Unsupported LLM provider: {}", provider),
        }
    }

    /// Simple completion with a system prompt and user message
    pub async fn complete(&self, system: &str, user: &str) -> Result<Completion> {
        self.chat(vec![Message::system(system), Message::user(user)])
            .await
    }

    async fn chat_openai(&self, messages: Vec<Message>) -> Result<Completion> {
        let mut openai_config = OpenAIConfig::new();

        if let Some(api_key) = &self.config.api_key {
            openai_config = openai_config.with_api_key(api_key);
        }

        if let Some(base_url) = &self.config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        let client = OpenAIClient::with_config(openai_config);

        let openai_messages: Vec<ChatCompletionRequestMessage> = messages
            .into_iter()
            .map(|msg| match msg.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(msg.content)
                    .build()
                    .unwrap()
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.content)
                    .build()
                    .unwrap()
                    .into(),
                Role::Assistant => {
                    use async_openai::types::ChatCompletionRequestAssistantMessageArgs;
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(msg.content)
                        .build()
                        .unwrap()
                        .into()
                }
            })
            .collect();

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages(openai_messages)
            .build()
            .context("Failed to build chat completion request")?;

        let response = client
            .chat()
            .create(request)
            .await
            .context("Failed to create chat completion")?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(Completion { content, usage })
    }

    /// Get the configured model name
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Get the configured provider name
    pub fn provider(&self) -> &str {
        &self.config.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn test_message_builders() {
        let sys = Message::system("You extract timestamps");
        assert_eq!(sys.role, Role::System);
        assert_eq!(sys.content, "You extract timestamps");

        let user = Message::user("Hello");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.content, "Hello");
    }
}
