//! The `llm_session` module keeps one rolling conversation with an LLM.
//!
//! A specialist agent keeps one session per conversation (`context_id`) so follow-up tasks in the
//! same conversation see earlier turns.  The session:
//! - **prepends the system prompt** to every request without storing it in the history,
//! - **trims the oldest turns** once the history exceeds `max_history` messages,
//! - **rolls back** the pending user turn when the model call fails, so a failed task leaves the
//!   conversation untouched.
//!
//! ## Quickstart
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agentrelay::client_wrapper::Role;
//! use agentrelay::clients::openai_compatible::OpenAICompatibleClient;
//! use agentrelay::config::LlmConfig;
//! use agentrelay::LLMSession;
//!
//! # async {
//! let client = OpenAICompatibleClient::from_config(&LlmConfig::from_env());
//! let mut session = LLMSession::new(Arc::new(client), "You are a translator.".into(), 20);
//! let reply = session
//!     .send_message(Role::User, "Translate 'hello' to Japanese".into())
//!     .await
//!     .unwrap();
//! println!("Assistant: {}", reply.content);
//! # };
//! ```

use crate::agentrelay::client_wrapper::{ClientWrapper, Message, Role};
use std::error::Error;
use std::sync::Arc;

/// A conversation session with an LLM.
///
/// - `client`: the `ClientWrapper` that performs completions.
/// - `system_prompt`: the context-steering system message.
/// - `conversation_history`: user and assistant messages, system prompt excluded.
/// - `max_history`: how many messages to keep before dropping the oldest.
pub struct LLMSession {
    client: Arc<dyn ClientWrapper>,
    system_prompt: Message,
    conversation_history: Vec<Message>,
    max_history: usize,
}

impl LLMSession {
    /// Creates a new `LLMSession` with the given client, system prompt and history cap.
    pub fn new(client: Arc<dyn ClientWrapper>, system_prompt: String, max_history: usize) -> Self {
        LLMSession {
            client,
            system_prompt: Message::new(Role::System, system_prompt),
            conversation_history: Vec::new(),
            max_history: max_history.max(2),
        }
    }

    /// Sends a message, records the assistant's reply and returns it.
    pub async fn send_message(
        &mut self,
        role: Role,
        content: String,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        self.conversation_history.push(Message::new(role, content));

        let mut request = Vec::with_capacity(self.conversation_history.len() + 1);
        if !self.system_prompt.content.is_empty() {
            request.push(self.system_prompt.clone());
        }
        request.extend(self.conversation_history.iter().cloned());

        let response = match self.client.send_message(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.conversation_history.pop();
                return Err(e);
            }
        };

        if let Some(usage) = self.client.get_last_usage() {
            log::debug!(
                "{}: {} input / {} output tokens",
                self.client.model_name(),
                usage.input_tokens,
                usage.output_tokens
            );
        }

        self.conversation_history.push(response.clone());
        if self.conversation_history.len() > self.max_history {
            let excess = self.conversation_history.len() - self.max_history;
            self.conversation_history.drain(..excess);
        }

        Ok(response)
    }

    /// Messages exchanged so far, oldest first.
    pub fn history(&self) -> &[Message] {
        &self.conversation_history
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt.content
    }
}
