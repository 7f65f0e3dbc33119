//! Task envelopes and their lifecycle.
//!
//! A [`Task`] is the unit of work an orchestrator hands to a specialist.  The submitting side
//! creates it in [`TaskState::Submitted`]; from then on only the owning
//! [`TaskExecutor`](crate::executor::TaskExecutor) moves it forward:
//!
//! ```text
//! submitted ──► working ──► completed
//!     │            ├──────► failed
//!     └────────────┴──────► canceled
//! ```
//!
//! Terminal states never change again.  Once a task is `completed` it carries a result and no
//! error; once `failed` it carries an error and no result.
//!
//! ```rust
//! use agentrelay::task::{Task, TaskMessage, TaskState};
//!
//! let mut task = Task::new("t1", TaskMessage::text("translate 'hello' to Japanese"));
//! task.start().unwrap();
//! task.complete("こんにちは".to_string()).unwrap();
//! assert_eq!(task.state(), TaskState::Completed);
//! assert!(task.start().is_err());
//! ```

use crate::agentrelay::error::A2AError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Submitted,
    Working,
    Completed,
    Failed,
    Canceled,
}

impl TaskState {
    /// `completed`, `failed` and `canceled` admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Canceled
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Submitted, Working)
                | (Submitted, Canceled)
                | (Working, Completed)
                | (Working, Failed)
                | (Working, Canceled)
        )
    }

    /// Wire name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input of a task: free text plus optional structured parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    /// Conversation the message belongs to; completions keep history per context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

impl TaskMessage {
    /// A plain text message with no parameters.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: None,
            context_id: None,
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = Some(context_id.into());
        self
    }
}

/// Generate a fresh task identifier.
pub fn new_task_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The authoritative record of one delegated unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: String,
    message: TaskMessage,
    status: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a task in the `submitted` state.
    pub fn new(id: impl Into<String>, message: TaskMessage) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            message,
            status: TaskState::Submitted,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn message(&self) -> &TaskMessage {
        &self.message
    }

    pub fn state(&self) -> TaskState {
        self.status
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `submitted -> working`.
    pub fn start(&mut self) -> Result<(), A2AError> {
        self.transition(TaskState::Working)
    }

    /// `working -> completed`, storing the result payload.
    pub fn complete(&mut self, result: String) -> Result<(), A2AError> {
        self.transition(TaskState::Completed)?;
        self.result = Some(result);
        Ok(())
    }

    /// `working -> failed`, storing a caller-facing error detail.
    pub fn fail(&mut self, detail: String) -> Result<(), A2AError> {
        self.transition(TaskState::Failed)?;
        self.error = Some(detail);
        Ok(())
    }

    /// Any non-terminal state `-> canceled`.
    pub fn cancel(&mut self) -> Result<(), A2AError> {
        self.transition(TaskState::Canceled)
    }

    fn transition(&mut self, next: TaskState) -> Result<(), A2AError> {
        if !self.status.can_transition_to(next) {
            return Err(A2AError::InvalidTransition {
                task_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Body of `POST /tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTaskRequest {
    pub id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

impl SubmitTaskRequest {
    /// Turn the wire request into a fresh `submitted` task.
    pub fn into_task(self) -> Task {
        Task::new(
            self.id,
            TaskMessage {
                text: self.message,
                parameters: self.parameters,
                context_id: self.context_id,
            },
        )
    }
}

impl From<&Task> for SubmitTaskRequest {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            message: task.message.text.clone(),
            parameters: task.message.parameters.clone(),
            context_id: task.message.context_id.clone(),
        }
    }
}

/// Outcome field of [`SubmitTaskResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitStatus {
    Submitted,
    Rejected,
}

/// Body returned by `POST /tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTaskResponse {
    pub id: String,
    pub status: SubmitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Body returned by `GET /tasks/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    pub id: String,
    pub status: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Task> for TaskStatusResponse {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            status: task.status,
            result: task.result.clone(),
            error: task.error.clone(),
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Body returned by `POST /tasks/{id}/cancel`.
///
/// `status` is `"canceled"`, `"not_found"`, or the terminal state the task had already reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelTaskResponse {
    pub id: String,
    pub status: String,
}
