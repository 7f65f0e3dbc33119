//! Configuration for agentrelay.
//!
//! Everything is a plain struct with a `Default` impl; users construct these however they want.
//! The `from_env` helpers read the handful of environment variables the `agentrelay` binary
//! understands.  No config-file parsing dependency is introduced.
//!
//! # Example
//!
//! ```rust
//! use agentrelay::config::{ListenerConfig, RemoteAgentClientConfig};
//! use std::time::Duration;
//!
//! let listener = ListenerConfig {
//!     retention: Duration::from_secs(60),
//!     ..ListenerConfig::default()
//! };
//! let client = RemoteAgentClientConfig::default().with_timeout(Duration::from_secs(10));
//! assert_eq!(client.timeout, Duration::from_secs(10));
//! ```

use crate::agentrelay::error::ConfigError;
use std::time::Duration;

/// Environment variable holding the OpenAI-compatible API base.
pub const ENV_API_BASE: &str = "OPENAI_API_BASE";
/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
/// Environment variable holding the model name.
pub const ENV_MODEL: &str = "LOCAL_LLM_MODEL";
/// Overall delegation timeout, in seconds.
pub const ENV_TIMEOUT_SECS: &str = "A2A_TIMEOUT_SECS";
/// Status poll interval, in milliseconds.
pub const ENV_POLL_INTERVAL_MS: &str = "A2A_POLL_INTERVAL_MS";

/// Settings for the completion provider behind a specialist agent.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API, e.g. a local LM Studio server.
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    /// Attempts after the first one on transient provider errors.
    pub max_retries: u32,
    pub request_timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:1234/v1".to_string(),
            api_key: "not-needed".to_string(),
            model: "google/gemma-3n-e4b".to_string(),
            max_retries: 2,
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl LlmConfig {
    /// Read `OPENAI_API_BASE`, `OPENAI_API_KEY` and `LOCAL_LLM_MODEL`, falling back to defaults.
    ///
    /// A LiteLLM-style `openai/` prefix on the model name is stripped.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let model = std::env::var(ENV_MODEL).unwrap_or(defaults.model);
        Self {
            api_base: std::env::var(ENV_API_BASE).unwrap_or(defaults.api_base),
            api_key: std::env::var(ENV_API_KEY).unwrap_or(defaults.api_key),
            model: normalize_model_name(&model),
            ..Self::default()
        }
    }
}

/// Strip the `openai/` routing prefix some launchers add to model names.
pub fn normalize_model_name(model: &str) -> String {
    model.strip_prefix("openai/").unwrap_or(model).to_string()
}

/// Settings for a transport listener.
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerConfig {
    /// How long terminal tasks stay queryable before they are purged.
    pub retention: Duration,
    /// How often the purge sweep runs.
    pub sweep_interval: Duration,
    /// How long shutdown waits for in-flight tasks.
    pub drain_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Settings for [`RemoteAgentClient`](crate::client::RemoteAgentClient).
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAgentClientConfig {
    /// Overall budget for one delegation, from discovery to terminal state.
    pub timeout: Duration,
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Upper bound for any single HTTP request.
    pub request_timeout: Duration,
}

impl Default for RemoteAgentClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl RemoteAgentClientConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Read `A2A_TIMEOUT_SECS` and `A2A_POLL_INTERVAL_MS` on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(secs) = parse_env_u64(ENV_TIMEOUT_SECS)? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_env_u64(ENV_POLL_INTERVAL_MS)? {
            config.poll_interval = Duration::from_millis(ms.max(1));
        }
        Ok(config)
    }
}

fn parse_env_u64(key: &str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_prefix_is_stripped() {
        assert_eq!(
            normalize_model_name("openai/google/gemma-3n-e4b"),
            "google/gemma-3n-e4b"
        );
        assert_eq!(normalize_model_name("qwen3"), "qwen3");
    }

    #[test]
    fn test_defaults_are_bounded() {
        let config = RemoteAgentClientConfig::default();
        assert!(config.poll_interval < config.timeout);
        assert!(config.request_timeout <= config.timeout);
    }
}
