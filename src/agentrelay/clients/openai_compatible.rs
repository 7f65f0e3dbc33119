//! The `OpenAICompatibleClient` struct implements `ClientWrapper` for any server speaking the
//! OpenAI Chat Completions wire format (OpenAI itself, LM Studio, vLLM, Ollama's OpenAI shim).
//!
//! # Key Features
//!
//! - **send_message(...)**: posts the full message list to `{api_base}/chat/completions`.
//! - **Retry budget**: transport errors, `429` and `5xx` answers are retried up to
//!   `max_retries` times with a linear backoff before the error is returned.
//! - **Usage capture**: the latest `TokenUsage` is kept for `get_last_usage()`.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentrelay::clients::openai_compatible::OpenAICompatibleClient;
//! use agentrelay::client_wrapper::{ClientWrapper, Message, Role};
//! use agentrelay::config::LlmConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = OpenAICompatibleClient::from_config(&LlmConfig::from_env());
//!     let resp = client
//!         .send_message(&[Message::new(Role::User, "Hello!")])
//!         .await
//!         .unwrap();
//!     println!("Assistant: {}", resp.content);
//! }
//! ```

use crate::agentrelay::client_wrapper::{ClientWrapper, Message, Role, TokenUsage};
use crate::agentrelay::config::LlmConfig;
use crate::agentrelay::http_client_pool::get_or_create_client;
use async_trait::async_trait;
use serde::Deserialize;
use std::error::Error;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
    #[serde(default)]
    total_tokens: usize,
}

/// Client wrapper for OpenAI-compatible chat completion endpoints.
pub struct OpenAICompatibleClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    max_retries: u32,
    retry_backoff: Duration,
    token_usage: Mutex<Option<TokenUsage>>,
}

impl OpenAICompatibleClient {
    /// Build a client from explicit settings.
    pub fn from_config(config: &LlmConfig) -> Self {
        let api_base = config.api_base.trim_end_matches('/').to_string();
        Self {
            client: get_or_create_client(&api_base, config.request_timeout),
            api_base,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(500),
            token_usage: Mutex::new(None),
        }
    }

    /// Override the delay unit between retries (attempt `n` waits `n * backoff`).
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn post_once(&self, body: &serde_json::Value) -> Result<ChatCompletion, Attempt> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Attempt::Retryable(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Attempt::Retryable(format!("provider returned {}", status)));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Attempt::Fatal(format!("provider returned {}: {}", status, text)));
        }
        response
            .json::<ChatCompletion>()
            .await
            .map_err(|e| Attempt::Fatal(format!("unreadable completion: {}", e)))
    }
}

enum Attempt {
    Retryable(String),
    Fatal(String),
}

#[async_trait]
impl ClientWrapper for OpenAICompatibleClient {
    async fn send_message(
        &self,
        messages: &[Message],
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        let formatted: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| serde_json::json!({"role": m.role.as_str(), "content": m.content}))
            .collect();
        let body = serde_json::json!({
            "model": self.model,
            "messages": formatted,
            "temperature": 0,
        });

        let mut attempt = 0;
        let completion = loop {
            match self.post_once(&body).await {
                Ok(completion) => break completion,
                Err(Attempt::Retryable(reason)) if attempt < self.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "agentrelay::clients::openai_compatible: {} (retry {}/{})",
                        reason,
                        attempt,
                        self.max_retries
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(Attempt::Retryable(reason)) | Err(Attempt::Fatal(reason)) => {
                    log::error!("agentrelay::clients::openai_compatible: {}", reason);
                    return Err(reason.into());
                }
            }
        };

        if let Some(usage) = completion.usage {
            if let Ok(mut slot) = self.token_usage.lock() {
                *slot = Some(TokenUsage {
                    input_tokens: usage.prompt_tokens,
                    output_tokens: usage.completion_tokens,
                    total_tokens: usage.total_tokens,
                });
            }
        }

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or("completion contained no choices")?;

        Ok(Message::new(Role::Assistant, content))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}
