//! The specialist-side task executor.
//!
//! [`TaskExecutor`] owns the authoritative copy of every task submitted to one agent and is the
//! only component that moves tasks through their lifecycle.  Each accepted task runs on its own
//! tokio task, so any number of tasks can be `working` at once while the listener keeps
//! accepting new submissions.
//!
//! The work itself is delegated to a [`CompletionLogic`] implementation:
//!
//! - [`LlmCompletion`] asks a [`ClientWrapper`] for a reply, keeping one [`LLMSession`] per
//!   conversation.
//! - [`FnCompletion`] wraps an async closure.
//!
//! Cancellation is cooperative.  [`TaskExecutor::cancel`] marks the task `canceled` right away and
//! raises the task's [`CancellationFlag`]; the running completion future is dropped at its next
//! await point and completion logic may poll the flag between steps.  Whatever the logic
//! produces afterwards is discarded.
//!
//! # Example
//!
//! ```rust
//! use agentrelay::executor::{FnCompletion, SubmitOutcome, TaskExecutor};
//! use agentrelay::task::{Task, TaskMessage, TaskState};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let logic = FnCompletion::new(|message: TaskMessage| async move {
//!     Ok(format!("echo: {}", message.text))
//! });
//! let executor = Arc::new(TaskExecutor::new(Arc::new(logic)));
//!
//! let outcome = executor.submit(Task::new("t1", TaskMessage::text("hi"))).await;
//! assert_eq!(outcome, SubmitOutcome::Accepted);
//!
//! executor.drain(Duration::from_secs(1)).await;
//! let task = executor.get_status("t1").unwrap();
//! assert_eq!(task.state(), TaskState::Completed);
//! assert_eq!(task.result(), Some("echo: hi"));
//! # }
//! ```

use crate::agentrelay::client_wrapper::{ClientWrapper, Role};
use crate::agentrelay::error::A2AError;
use crate::agentrelay::event::{EventHandler, RelayEvent};
use crate::agentrelay::llm_session::LLMSession;
use crate::agentrelay::task::{Task, TaskMessage, TaskState};
use crate::agentrelay::tool_protocol::ToolRegistry;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Notify};

/// Result text used when completion logic succeeds with an empty reply.
pub const EMPTY_RESPONSE_FALLBACK: &str = "No response could be generated.";

/// Cooperative cancellation signal handed to completion logic.
#[derive(Debug, Default)]
pub struct CancellationFlag {
    canceled: AtomicBool,
    notify: Notify,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake every waiter.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Safe-point check for completion logic.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Resolves once the flag is raised.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_canceled() {
                return;
            }
            notified.await;
        }
    }
}

/// The specialist's private logic turning a task message into a result.
#[async_trait]
pub trait CompletionLogic: Send + Sync {
    /// Produce the result text for `message`.
    ///
    /// Errors become the task's `failed` detail; they are never retried by the executor.
    async fn complete(
        &self,
        message: &TaskMessage,
        cancel: &CancellationFlag,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;

    /// Drop per-conversation state untouched for at least `idle_for`; returns how many
    /// conversations were forgotten.  Called whenever the executor purges expired tasks.
    fn evict_idle(&self, _idle_for: Duration) -> usize {
        0
    }
}

/// Boxed future returned by [`CompletionFunction`]s.
pub type CompletionFuture =
    Pin<Box<dyn Future<Output = Result<String, Box<dyn Error + Send + Sync>>> + Send>>;

/// Type alias for async closures usable as completion logic.
pub type CompletionFunction = Arc<dyn Fn(TaskMessage) -> CompletionFuture + Send + Sync>;

/// Completion logic built from an async closure.
pub struct FnCompletion {
    function: CompletionFunction,
}

impl FnCompletion {
    pub fn new<F, Fut>(function: F) -> Self
    where
        F: Fn(TaskMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, Box<dyn Error + Send + Sync>>> + Send + 'static,
    {
        Self {
            function: Arc::new(move |message: TaskMessage| -> CompletionFuture {
                Box::pin(function(message))
            }),
        }
    }
}

#[async_trait]
impl CompletionLogic for FnCompletion {
    async fn complete(
        &self,
        message: &TaskMessage,
        _cancel: &CancellationFlag,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        (self.function)(message.clone()).await
    }
}

/// Completion logic backed by an LLM, with one conversation per `context_id`.
///
/// Messages without a context get a fresh, history-less session.  Conversations idle for longer
/// than the listener's retention window are forgotten when the executor purges expired tasks.
///
/// With a [`ToolRegistry`] attached, the system prompt lists the registered tools and the model
/// may answer with `{"tool_call": {"name": "...", "parameters": {...}}}`.  The tool's result is
/// fed back as the next user turn until the model replies without a tool call, up to
/// `max_tool_iterations` calls per task.
pub struct LlmCompletion {
    client: Arc<dyn ClientWrapper>,
    system_prompt: String,
    max_history: usize,
    tools: Option<Arc<ToolRegistry>>,
    max_tool_iterations: usize,
    sessions: DashMap<String, SessionSlot>,
}

struct SessionSlot {
    session: Arc<Mutex<LLMSession>>,
    last_used: Instant,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub parameters: serde_json::Value,
}

impl LlmCompletion {
    pub fn new(client: Arc<dyn ClientWrapper>, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
            max_history: 20,
            tools: None,
            max_tool_iterations: 5,
            sessions: DashMap::new(),
        }
    }

    /// Cap the number of remembered messages per conversation.
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    /// Let the model call the tools in `tools`.
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        let listed = tools.list_tools();
        if !listed.is_empty() {
            self.system_prompt.push_str("\n\nYou have access to the following tools:\n");
            for tool in listed {
                self.system_prompt
                    .push_str(&format!("- {}: {}\n", tool.name, tool.description));
                if !tool.parameters.is_empty() {
                    self.system_prompt.push_str("  Parameters:\n");
                    for param in &tool.parameters {
                        self.system_prompt.push_str(&format!(
                            "    - {} ({:?}): {}\n",
                            param.name,
                            param.param_type,
                            param.description.as_deref().unwrap_or("No description")
                        ));
                    }
                }
            }
            self.system_prompt.push_str(
                "\nTo use a tool, respond with a JSON object in the following format:\n\
                 {\"tool_call\": {\"name\": \"tool_name\", \"parameters\": {...}}}\n\
                 After tool execution, I'll provide the result and you can continue.\n",
            );
        }
        self.tools = Some(tools);
        self
    }

    pub fn with_max_tool_iterations(mut self, max_tool_iterations: usize) -> Self {
        self.max_tool_iterations = max_tool_iterations;
        self
    }

    /// System prompt sent with every request, tool instructions included.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Number of conversations with remembered history.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn session_for(&self, context_id: Option<&str>) -> Arc<Mutex<LLMSession>> {
        let fresh = || {
            Arc::new(Mutex::new(LLMSession::new(
                self.client.clone(),
                self.system_prompt.clone(),
                self.max_history,
            )))
        };
        match context_id {
            Some(id) => {
                let mut slot = self
                    .sessions
                    .entry(id.to_string())
                    .or_insert_with(|| SessionSlot {
                        session: fresh(),
                        last_used: Instant::now(),
                    });
                slot.last_used = Instant::now();
                slot.session.clone()
            }
            None => fresh(),
        }
    }

    fn touch(&self, context_id: Option<&str>) {
        if let Some(mut slot) = context_id.and_then(|id| self.sessions.get_mut(id)) {
            slot.last_used = Instant::now();
        }
    }

    async fn run_tool(&self, tools: &ToolRegistry, call: ToolCall) -> String {
        match tools.execute_tool(&call.name, call.parameters).await {
            Ok(result) if result.success => format!(
                "Tool '{}' executed successfully. Result: {}",
                call.name,
                serde_json::to_string_pretty(&result.output)
                    .unwrap_or_else(|_| result.output.to_string())
            ),
            Ok(result) => format!(
                "Tool '{}' failed. Error: {}",
                call.name,
                result.error.unwrap_or_else(|| "Unknown error".to_string())
            ),
            Err(e) => format!("Tool execution error: {}", e),
        }
    }
}

/// Find the first `{"tool_call": {...}}` object in a model reply, prose around it allowed.
pub fn parse_tool_call(reply: &str) -> Option<ToolCall> {
    let start = reply.find("{\"tool_call\"")?;
    let mut depth = 0usize;
    let mut end = None;
    for (offset, ch) in reply[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(start + offset + 1);
                    break;
                }
            }
            _ => {}
        }
    }
    let parsed: serde_json::Value = serde_json::from_str(&reply[start..end?]).ok()?;
    let call = parsed.get("tool_call")?;
    Some(ToolCall {
        name: call.get("name")?.as_str()?.to_string(),
        parameters: call
            .get("parameters")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({})),
    })
}

#[async_trait]
impl CompletionLogic for LlmCompletion {
    async fn complete(
        &self,
        message: &TaskMessage,
        cancel: &CancellationFlag,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let mut prompt = message.text.clone();
        if let Some(parameters) = &message.parameters {
            prompt.push_str("\n\nParameters: ");
            prompt.push_str(&parameters.to_string());
        }

        let context_id = message.context_id.as_deref();
        let session = self.session_for(context_id);
        let mut session = session.lock().await;
        if cancel.is_canceled() {
            return Err("canceled before the model was called".into());
        }
        let mut reply = session.send_message(Role::User, prompt).await?;

        if let Some(tools) = &self.tools {
            let mut iterations = 0;
            while let Some(call) = parse_tool_call(&reply.content) {
                if iterations >= self.max_tool_iterations {
                    return Err(format!(
                        "model requested more than {} tool calls",
                        self.max_tool_iterations
                    )
                    .into());
                }
                iterations += 1;
                log::debug!("tool call {} ({}): {}", iterations, call.name, call.parameters);
                let feedback = self.run_tool(tools, call).await;
                if cancel.is_canceled() {
                    return Err("canceled during tool use".into());
                }
                reply = session.send_message(Role::User, feedback).await?;
            }
        }

        self.touch(context_id);
        Ok(reply.content)
    }

    fn evict_idle(&self, idle_for: Duration) -> usize {
        let mut evicted = 0;
        // A session handed out to a running task has a second owner and is kept.
        self.sessions.retain(|_, slot| {
            let keep =
                Arc::strong_count(&slot.session) > 1 || slot.last_used.elapsed() < idle_for;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }
}

/// Why a submission was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// The id is, or once was, in use on this executor.
    Duplicate,
    /// The envelope itself is unusable.
    Malformed(String),
    /// The executor is draining for shutdown.
    ShuttingDown,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Duplicate => write!(f, "task id already used"),
            RejectReason::Malformed(msg) => write!(f, "malformed task: {}", msg),
            RejectReason::ShuttingDown => write!(f, "agent is shutting down"),
        }
    }
}

/// Result of [`TaskExecutor::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted,
    Rejected(RejectReason),
}

/// Result of [`TaskExecutor::cancel`].
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Acknowledged,
    NotFound,
    /// The task had already reached this terminal state; nothing changed.
    AlreadyTerminal(TaskState),
}

/// Per-task cancellation flag, plus the lock that keeps the task's state events in the order
/// its transitions were applied.
#[derive(Clone, Default)]
struct TaskControl {
    flag: Arc<CancellationFlag>,
    events: Arc<Mutex<()>>,
}

/// Owns and advances the task state machine for one agent.
pub struct TaskExecutor {
    logic: Arc<dyn CompletionLogic>,
    tasks: DashMap<String, Task>,
    retired: DashSet<String>,
    controls: DashMap<String, TaskControl>,
    accepting: AtomicBool,
    in_flight: AtomicUsize,
    idle: Notify,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl TaskExecutor {
    pub fn new(logic: Arc<dyn CompletionLogic>) -> Self {
        Self {
            logic,
            tasks: DashMap::new(),
            retired: DashSet::new(),
            controls: DashMap::new(),
            accepting: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            event_handler: None,
        }
    }

    /// Attach a handler that receives intake and lifecycle events.
    ///
    /// State changes of one task reach the handler in the order they were applied.  The handler
    /// must not cancel the task it is being told about from inside the callback.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Accept a `submitted` task and start processing it on its own tokio task.
    ///
    /// Ids are single-use: a task id that is live, terminal, or already purged is rejected.
    pub async fn submit(self: &Arc<Self>, task: Task) -> SubmitOutcome {
        let task_id = task.id().to_string();
        let outcome = self.admit(task);
        match &outcome {
            SubmitOutcome::Accepted => {
                self.emit(RelayEvent::TaskAccepted {
                    task_id: task_id.clone(),
                })
                .await;
                self.spawn(task_id);
            }
            SubmitOutcome::Rejected(reason) => {
                self.emit(RelayEvent::TaskRejected {
                    task_id,
                    reason: reason.to_string(),
                })
                .await;
            }
        }
        outcome
    }

    fn admit(&self, task: Task) -> SubmitOutcome {
        if !self.accepting.load(Ordering::SeqCst) {
            return SubmitOutcome::Rejected(RejectReason::ShuttingDown);
        }
        if task.id().trim().is_empty() {
            return SubmitOutcome::Rejected(RejectReason::Malformed("empty task id".into()));
        }
        if task.state() != TaskState::Submitted {
            return SubmitOutcome::Rejected(RejectReason::Malformed(format!(
                "expected a submitted task, got {}",
                task.state()
            )));
        }

        // The entry guard serializes concurrent submissions of the same id.
        match self.tasks.entry(task.id().to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                SubmitOutcome::Rejected(RejectReason::Duplicate)
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                if self.retired.contains(task.id()) {
                    return SubmitOutcome::Rejected(RejectReason::Duplicate);
                }
                self.controls
                    .insert(task.id().to_string(), TaskControl::default());
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                slot.insert(task);
                SubmitOutcome::Accepted
            }
        }
    }

    fn spawn(self: &Arc<Self>, task_id: String) {
        let executor = Arc::clone(self);
        tokio::spawn(async move {
            executor.run(&task_id).await;
            executor.finish(&task_id);
        });
    }

    async fn run(&self, task_id: &str) {
        let flag = match self.controls.get(task_id) {
            Some(control) => Arc::clone(&control.flag),
            None => return,
        };
        if let Err(e) = self.transition(task_id, |t| t.start()).await {
            log::debug!("task {} not started: {}", task_id, e);
            return;
        }
        let message = match self.tasks.get(task_id) {
            Some(task) => task.message().clone(),
            None => return,
        };

        let outcome = tokio::select! {
            result = self.logic.complete(&message, &flag) => Some(result),
            _ = flag.cancelled() => None,
        };

        let applied = match outcome {
            Some(Ok(text)) => {
                let text = if text.is_empty() {
                    EMPTY_RESPONSE_FALLBACK.to_string()
                } else {
                    text
                };
                self.transition(task_id, |t| t.complete(text)).await
            }
            Some(Err(e)) => {
                log::warn!("task {} failed: {}", task_id, e);
                self.transition(task_id, |t| t.fail(e.to_string())).await
            }
            None => Ok(()),
        };
        if let Err(e) = applied {
            // Canceled while the logic was finishing; its output is dropped.
            log::debug!("discarding late outcome for task {}: {}", task_id, e);
        }
    }

    fn finish(&self, task_id: &str) {
        self.controls.remove(task_id);
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    async fn transition<F>(&self, task_id: &str, apply: F) -> Result<(), A2AError>
    where
        F: FnOnce(&mut Task) -> Result<(), A2AError>,
    {
        let control = self.control(task_id);
        let _ordered = match &control {
            Some(control) => Some(control.events.lock().await),
            None => None,
        };
        let (from, to) = {
            let mut task = self
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| A2AError::TaskNotFound(task_id.to_string()))?;
            let from = task.state();
            apply(&mut *task)?;
            (from, task.state())
        };
        self.emit(RelayEvent::TaskStateChanged {
            task_id: task_id.to_string(),
            from,
            to,
        })
        .await;
        Ok(())
    }

    fn control(&self, task_id: &str) -> Option<TaskControl> {
        self.controls.get(task_id).map(|c| c.value().clone())
    }

    /// Snapshot of a task, if this executor knows it.
    pub fn get_status(&self, task_id: &str) -> Option<Task> {
        self.tasks.get(task_id).map(|t| t.value().clone())
    }

    /// Request cancellation of a non-terminal task.
    pub async fn cancel(&self, task_id: &str) -> CancelOutcome {
        let control = self.control(task_id);
        let _ordered = match &control {
            Some(control) => Some(control.events.lock().await),
            None => None,
        };
        let mut canceled_from = None;
        let outcome = match self.tasks.get_mut(task_id) {
            None => CancelOutcome::NotFound,
            Some(task) if task.is_terminal() => CancelOutcome::AlreadyTerminal(task.state()),
            Some(mut task) => {
                let from = task.state();
                match task.cancel() {
                    Ok(()) => {
                        canceled_from = Some(from);
                        CancelOutcome::Acknowledged
                    }
                    Err(_) => CancelOutcome::AlreadyTerminal(task.state()),
                }
            }
        };

        if let Some(from) = canceled_from {
            if let Some(control) = &control {
                control.flag.cancel();
            }
            self.emit(RelayEvent::TaskStateChanged {
                task_id: task_id.to_string(),
                from,
                to: TaskState::Canceled,
            })
            .await;
        }
        self.emit(RelayEvent::CancelRequested {
            task_id: task_id.to_string(),
            found: outcome != CancelOutcome::NotFound,
        })
        .await;
        outcome
    }

    /// Stop accepting submissions; running tasks continue.
    pub fn close(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Number of tasks whose processing unit has not finished yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Number of tasks currently stored, terminal ones included.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Wait until no task is in flight or `timeout` elapses; returns how many are still running.
    pub async fn drain(&self, timeout: Duration) -> usize {
        let wait_idle = async {
            loop {
                let notified = self.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };
        let _ = tokio::time::timeout(timeout, wait_idle).await;
        self.in_flight()
    }

    /// Drop terminal tasks last updated more than `retention` ago, and conversations the
    /// completion logic has not used for as long.
    ///
    /// Purged ids stay retired, so they can never be resubmitted.
    pub async fn purge_expired(&self, retention: Duration) -> usize {
        let expired = |task: &Task| {
            task.is_terminal()
                && chrono::Utc::now()
                    .signed_duration_since(task.updated_at())
                    .to_std()
                    .map(|age| age >= retention)
                    .unwrap_or(false)
        };

        let candidates: Vec<String> = self
            .tasks
            .iter()
            .filter(|entry| expired(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut count = 0;
        for task_id in candidates {
            self.retired.insert(task_id.clone());
            if self.tasks.remove_if(&task_id, |_, task| expired(task)).is_some() {
                count += 1;
            } else {
                self.retired.remove(&task_id);
            }
        }
        let sessions = self.logic.evict_idle(retention);
        if sessions > 0 {
            log::debug!("forgot {} idle conversation(s)", sessions);
        }
        if count > 0 {
            self.emit(RelayEvent::TasksPurged { count }).await;
        }
        count
    }

    async fn emit(&self, event: RelayEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_relay_event(&event).await;
        }
    }
}
