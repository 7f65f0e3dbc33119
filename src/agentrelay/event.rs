//! Listener and executor event system.
//!
//! Provides a callback-based observability layer for the transport listener and the task
//! executor.  Implement [`EventHandler`] to receive notifications about:
//!
//! - **Listener lifecycle**: bind, card discovery, drain start/finish
//! - **Task intake**: accepted and rejected submissions
//! - **Task lifecycle**: every state transition, cancellation requests, retention purges
//!
//! The single method has a default no-op implementation, so handlers only override what they
//! care about.  Handlers are shared as `Arc<dyn EventHandler>`.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentrelay::event::{EventHandler, RelayEvent};
//! use async_trait::async_trait;
//!
//! struct PrintTransitions;
//!
//! #[async_trait]
//! impl EventHandler for PrintTransitions {
//!     async fn on_relay_event(&self, event: &RelayEvent) {
//!         if let RelayEvent::TaskStateChanged { task_id, from, to } = event {
//!             println!("{}: {} -> {}", task_id, from, to);
//!         }
//!     }
//! }
//! ```

use crate::agentrelay::task::TaskState;
use async_trait::async_trait;

/// Events emitted by a [`TaskExecutor`](crate::executor::TaskExecutor) and the listener that
/// hosts it.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    // ── Listener lifecycle ───────────────────────────────────────────────
    /// The listener bound its socket and is serving the card.
    ServerStarted {
        agent_name: String,
        /// Address actually bound (useful when port 0 was requested).
        addr: String,
    },
    /// A client fetched the agent card.
    CardServed { agent_name: String },
    /// Shutdown began; new submissions are now refused.
    DrainStarted { in_flight: usize },
    /// Shutdown finished waiting for in-flight work.
    ///
    /// `remaining` is non-zero when the drain timeout elapsed first.
    DrainCompleted { remaining: usize },

    // ── Task intake ──────────────────────────────────────────────────────
    TaskAccepted { task_id: String },
    TaskRejected { task_id: String, reason: String },

    // ── Task lifecycle ───────────────────────────────────────────────────
    /// A task moved between lifecycle states.
    TaskStateChanged {
        task_id: String,
        from: TaskState,
        to: TaskState,
    },
    /// A cancel request arrived; `found` is false for unknown ids.
    CancelRequested { task_id: String, found: bool },
    /// Terminal tasks older than the retention window were dropped.
    TasksPurged { count: usize },
}

/// Receives [`RelayEvent`]s.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called for every event.  The default implementation is a no-op.
    async fn on_relay_event(&self, _event: &RelayEvent) {}
}

/// Forwards every event to the `log` facade.
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn on_relay_event(&self, event: &RelayEvent) {
        match event {
            RelayEvent::ServerStarted { agent_name, addr } => {
                log::info!("{} listening on {}", agent_name, addr)
            }
            RelayEvent::CardServed { agent_name } => {
                log::debug!("served agent card for {}", agent_name)
            }
            RelayEvent::DrainStarted { in_flight } => {
                log::info!("draining {} in-flight task(s)", in_flight)
            }
            RelayEvent::DrainCompleted { remaining } if *remaining > 0 => {
                log::warn!("drain timed out with {} task(s) still running", remaining)
            }
            RelayEvent::DrainCompleted { .. } => log::info!("drain complete"),
            RelayEvent::TaskAccepted { task_id } => log::info!("task {} accepted", task_id),
            RelayEvent::TaskRejected { task_id, reason } => {
                log::warn!("task {} rejected: {}", task_id, reason)
            }
            RelayEvent::TaskStateChanged { task_id, from, to } => {
                log::debug!("task {}: {} -> {}", task_id, from, to)
            }
            RelayEvent::CancelRequested { task_id, found } => {
                log::info!("cancel requested for task {} (known: {})", task_id, found)
            }
            RelayEvent::TasksPurged { count } => {
                log::debug!("purged {} expired task(s)", count)
            }
        }
    }
}
