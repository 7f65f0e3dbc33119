//! A ClientWrapper is a wrapper around a text-completion service.
//! It provides a common interface to interact with the LLM behind a specialist agent.
//! It does not keep track of the conversation, for that we use an LLMSession
//! which keeps the history and uses a ClientWrapper to talk to the model.

use async_trait::async_trait;
use std::error::Error;
use std::sync::Mutex;

/// Represents the possible roles for a message.
#[derive(Clone, Debug, PartialEq)]
pub enum Role {
    System,    // steers the model's responses
    User,      // the delegated request text, or a tool result fed back to the model
    Assistant, // content generated by the model in reply
}

impl Role {
    /// Role name as used by OpenAI-compatible chat APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// How many tokens were spent on prompt vs. completion.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

/// Represents a generic message to be sent to an LLM.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// The role associated with the message.
    pub role: Role,
    /// The actual content of the message.
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Trait defining the interface to a completion provider.
///
/// Errors returned here are folded into the owning task's `failed` state; implementations that
/// retry internally should only return once their own retry budget is exhausted.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// Send the prompt plus conversation history and get the model's reply.
    async fn send_message(
        &self,
        messages: &[Message],
    ) -> Result<Message, Box<dyn Error + Send + Sync>>;

    /// Model identifier used for requests, for logging.
    fn model_name(&self) -> &str;

    /// Hook to retrieve usage from the *last* send_message() call.
    fn get_last_usage(&self) -> Option<TokenUsage> {
        self.usage_slot()
            .and_then(|slot| slot.lock().ok().and_then(|u| u.clone()))
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        // Wrappers that track usage return their slot here.
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    #[async_trait]
    impl ClientWrapper for Silent {
        async fn send_message(
            &self,
            _messages: &[Message],
        ) -> Result<Message, Box<dyn Error + Send + Sync>> {
            Ok(Message::new(Role::Assistant, ""))
        }

        fn model_name(&self) -> &str {
            "silent"
        }
    }

    #[test]
    fn test_role_names_match_chat_api() {
        assert_eq!(Role::System.as_str(), "system");
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }

    #[test]
    fn test_usage_defaults_to_none_without_a_slot() {
        assert!(Silent.get_last_usage().is_none());
    }
}
