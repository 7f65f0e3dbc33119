//! Error taxonomy for agent-to-agent delegation.
//!
//! Every failure a caller of [`RemoteAgentClient`](crate::client::RemoteAgentClient) can observe
//! maps onto one [`A2AError`] variant.  Transport level problems (`AgentUnreachable`) are the only
//! ones the client retries, and only once; everything else is surfaced as-is.

use crate::agentrelay::task::TaskState;
use std::error::Error;
use std::fmt;

/// Errors produced while discovering, submitting to, or observing a remote agent.
#[derive(Debug, Clone, PartialEq)]
pub enum A2AError {
    /// No registry entry exists for the requested agent name.
    UnknownAgent(String),
    /// The agent's listener could not be reached at the transport level.
    AgentUnreachable { agent: String, reason: String },
    /// The agent's card does not declare what this caller needs.
    AgentIncompatible { agent: String, reason: String },
    /// The listener refused the submission (duplicate id, malformed body, shutting down).
    Rejected { task_id: String, reason: String },
    /// No terminal state was observed within the caller's budget.
    Timeout { task_id: String, waited_ms: u64 },
    /// The specialist's completion logic failed; carries the specialist's error detail.
    ExecutionFailed { task_id: String, detail: String },
    /// The task was canceled before it produced a result.
    Canceled { task_id: String },
    /// The listener has no record of the task.
    TaskNotFound(String),
    /// A state machine transition was attempted that the lifecycle forbids.
    InvalidTransition {
        task_id: String,
        from: TaskState,
        to: TaskState,
    },
    /// The listener answered with something that is not a valid protocol document.
    Protocol(String),
    /// Local configuration is unusable (bad registry entry, invalid card).
    Configuration(ConfigError),
}

impl A2AError {
    /// `true` for failures worth a single reconnect attempt.
    pub fn is_transport(&self) -> bool {
        matches!(self, A2AError::AgentUnreachable { .. })
    }
}

impl fmt::Display for A2AError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            A2AError::UnknownAgent(name) => write!(f, "Unknown agent: {}", name),
            A2AError::AgentUnreachable { agent, reason } => {
                write!(f, "Agent '{}' is unreachable: {}", agent, reason)
            }
            A2AError::AgentIncompatible { agent, reason } => {
                write!(f, "Agent '{}' is incompatible: {}", agent, reason)
            }
            A2AError::Rejected { task_id, reason } => {
                write!(f, "Task {} was rejected: {}", task_id, reason)
            }
            A2AError::Timeout { task_id, waited_ms } => write!(
                f,
                "Task {} did not finish within {} ms",
                task_id, waited_ms
            ),
            A2AError::ExecutionFailed { task_id, detail } => {
                write!(f, "Task {} failed: {}", task_id, detail)
            }
            A2AError::Canceled { task_id } => write!(f, "Task {} was canceled", task_id),
            A2AError::TaskNotFound(task_id) => write!(f, "Task not found: {}", task_id),
            A2AError::InvalidTransition { task_id, from, to } => write!(
                f,
                "Task {} cannot move from {} to {}",
                task_id, from, to
            ),
            A2AError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            A2AError::Configuration(err) => write!(f, "Configuration error: {}", err),
        }
    }
}

impl Error for A2AError {}

/// Errors raised while assembling configuration at start-up.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// An agent card failed validation and must not be served.
    InvalidAgentCard(String),
    /// An environment variable or registry entry could not be parsed.
    InvalidValue { key: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAgentCard(msg) => write!(f, "Invalid agent card: {}", msg),
            ConfigError::InvalidValue { key, reason } => {
                write!(f, "Invalid value for {}: {}", key, reason)
            }
        }
    }
}

impl Error for ConfigError {}

impl From<ConfigError> for A2AError {
    fn from(err: ConfigError) -> Self {
        A2AError::Configuration(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unreachable_counts_as_transport() {
        let unreachable = A2AError::AgentUnreachable {
            agent: "translator".into(),
            reason: "connection refused".into(),
        };
        assert!(unreachable.is_transport());

        let failed = A2AError::ExecutionFailed {
            task_id: "t2".into(),
            detail: "model offline".into(),
        };
        assert!(!failed.is_transport());
        assert!(!A2AError::UnknownAgent("x".into()).is_transport());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = A2AError::ExecutionFailed {
            task_id: "t2".into(),
            detail: "model offline".into(),
        };
        assert_eq!(err.to_string(), "Task t2 failed: model offline");
    }
}
