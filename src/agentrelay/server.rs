//! HTTP transport listener for a specialist agent.
//!
//! One listener serves one [`AgentCard`] and owns one [`TaskExecutor`].  Routes:
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `GET`  | `/capabilities` | the agent card |
//! | `GET`  | `/.well-known/agent-card.json` | same card, conventional discovery path |
//! | `POST` | `/tasks` | submit a task (`202`, or `409`/`400`/`503` when rejected) |
//! | `GET`  | `/tasks/{id}` | task status (`404` when unknown) |
//! | `POST` | `/tasks/{id}/cancel` | request cancellation |
//!
//! Status reads never block on task processing; each accepted task runs on its own tokio task.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentrelay::agent_card::{AgentCard, AgentSkill, SkillKind};
//! use agentrelay::executor::FnCompletion;
//! use agentrelay::server::{shutdown_signal, A2AServerBuilder};
//! use agentrelay::task::TaskMessage;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let card = AgentCard::new("Echo", "Repeats what it is told", "http://localhost:8001")
//!         .with_skill(AgentSkill::new("echo", SkillKind::GeneralAssistant, "Echo"));
//!     let logic = FnCompletion::new(|message: TaskMessage| async move { Ok(message.text) });
//!
//!     let server = A2AServerBuilder::new(card, Arc::new(logic))
//!         .start_on(8001)
//!         .await?;
//!     server.run_until(shutdown_signal()?).await?;
//!     Ok(())
//! }
//! ```

use crate::agentrelay::agent_card::AgentCard;
use crate::agentrelay::config::ListenerConfig;
use crate::agentrelay::event::{EventHandler, RelayEvent};
use crate::agentrelay::executor::{
    CancelOutcome, CompletionLogic, RejectReason, SubmitOutcome, TaskExecutor,
};
use crate::agentrelay::task::{
    CancelTaskResponse, SubmitStatus, SubmitTaskRequest, SubmitTaskResponse, TaskStatusResponse,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::error::Error;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Clone)]
struct ListenerState {
    card: Arc<AgentCard>,
    executor: Arc<TaskExecutor>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

/// Build the listener's router around an existing executor.
///
/// Useful for embedding the routes into a larger axum application; [`A2AServerBuilder`] is the
/// usual entry point.
pub fn router(
    card: Arc<AgentCard>,
    executor: Arc<TaskExecutor>,
    event_handler: Option<Arc<dyn EventHandler>>,
) -> Router {
    let state = ListenerState {
        card,
        executor,
        event_handler,
    };
    Router::new()
        .route("/capabilities", get(get_card))
        .route("/.well-known/agent-card.json", get(get_card))
        .route("/tasks", post(submit_task))
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/{id}/cancel", post(cancel_task))
        .with_state(state)
}

async fn get_card(State(state): State<ListenerState>) -> Json<AgentCard> {
    if let Some(handler) = &state.event_handler {
        handler
            .on_relay_event(&RelayEvent::CardServed {
                agent_name: state.card.name.clone(),
            })
            .await;
    }
    Json(state.card.as_ref().clone())
}

fn reject_status(reason: &RejectReason) -> StatusCode {
    match reason {
        RejectReason::Duplicate => StatusCode::CONFLICT,
        RejectReason::Malformed(_) => StatusCode::BAD_REQUEST,
        RejectReason::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn submit_task(
    State(state): State<ListenerState>,
    payload: Result<Json<SubmitTaskRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            log::warn!("malformed task submission: {}", rejection.body_text());
            let body = SubmitTaskResponse {
                id: String::new(),
                status: SubmitStatus::Rejected,
                reason: Some(rejection.body_text()),
            };
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let id = request.id.clone();
    match state.executor.submit(request.into_task()).await {
        SubmitOutcome::Accepted => (
            StatusCode::ACCEPTED,
            Json(SubmitTaskResponse {
                id,
                status: SubmitStatus::Submitted,
                reason: None,
            }),
        )
            .into_response(),
        SubmitOutcome::Rejected(reason) => (
            reject_status(&reason),
            Json(SubmitTaskResponse {
                id,
                status: SubmitStatus::Rejected,
                reason: Some(reason.to_string()),
            }),
        )
            .into_response(),
    }
}

async fn get_task(State(state): State<ListenerState>, Path(id): Path<String>) -> Response {
    match state.executor.get_status(&id) {
        Some(task) => Json(TaskStatusResponse::from(&task)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"id": id, "status": "not_found"})),
        )
            .into_response(),
    }
}

async fn cancel_task(State(state): State<ListenerState>, Path(id): Path<String>) -> Response {
    let (code, status) = match state.executor.cancel(&id).await {
        CancelOutcome::Acknowledged => (StatusCode::OK, "canceled".to_string()),
        CancelOutcome::NotFound => (StatusCode::NOT_FOUND, "not_found".to_string()),
        CancelOutcome::AlreadyTerminal(terminal) => (StatusCode::OK, terminal.to_string()),
    };
    (code, Json(CancelTaskResponse { id, status })).into_response()
}

/// Builder for a specialist agent's listener.
pub struct A2AServerBuilder {
    card: AgentCard,
    logic: Arc<dyn CompletionLogic>,
    config: ListenerConfig,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl A2AServerBuilder {
    pub fn new(card: AgentCard, logic: Arc<dyn CompletionLogic>) -> Self {
        Self {
            card,
            logic,
            config: ListenerConfig::default(),
            event_handler: None,
        }
    }

    pub fn with_config(mut self, config: ListenerConfig) -> Self {
        self.config = config;
        self
    }

    /// How long terminal tasks remain queryable.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.config.retention = retention;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.config.drain_timeout = timeout;
        self
    }

    /// Receive listener and executor events.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Start on `127.0.0.1:<port>`.
    pub async fn start_on(
        self,
        port: u16,
    ) -> Result<A2AServerInstance, Box<dyn Error + Send + Sync>> {
        self.start_at(SocketAddr::from(([127, 0, 0, 1], port))).await
    }

    /// Validate the card, bind `addr` and start serving.
    ///
    /// An invalid card is refused before anything is bound.
    pub async fn start_at(
        self,
        addr: SocketAddr,
    ) -> Result<A2AServerInstance, Box<dyn Error + Send + Sync>> {
        self.card.validate()?;

        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;

        let mut executor = TaskExecutor::new(self.logic);
        if let Some(handler) = &self.event_handler {
            executor = executor.with_event_handler(handler.clone());
        }
        let executor = Arc::new(executor);
        let card = Arc::new(self.card);
        let app = router(card.clone(), executor.clone(), self.event_handler.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let sweeper = {
            let executor = executor.clone();
            let retention = self.config.retention;
            let period = self.config.sweep_interval.max(Duration::from_millis(10));
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    executor.purge_expired(retention).await;
                }
            })
        };

        log::info!("agent '{}' listening on {}", card.name, addr);
        if let Some(handler) = &self.event_handler {
            handler
                .on_relay_event(&RelayEvent::ServerStarted {
                    agent_name: card.name.clone(),
                    addr: addr.to_string(),
                })
                .await;
        }

        Ok(A2AServerInstance {
            addr,
            card,
            executor,
            drain_timeout: self.config.drain_timeout,
            event_handler: self.event_handler,
            shutdown_tx,
            server,
            sweeper,
        })
    }
}

/// A running listener.
pub struct A2AServerInstance {
    addr: SocketAddr,
    card: Arc<AgentCard>,
    executor: Arc<TaskExecutor>,
    drain_timeout: Duration,
    event_handler: Option<Arc<dyn EventHandler>>,
    shutdown_tx: oneshot::Sender<()>,
    server: JoinHandle<std::io::Result<()>>,
    sweeper: JoinHandle<()>,
}

impl A2AServerInstance {
    /// Address actually bound.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://<addr>`, suitable for a registry entry.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn card(&self) -> &AgentCard {
        &self.card
    }

    pub fn executor(&self) -> &Arc<TaskExecutor> {
        &self.executor
    }

    /// Serve until `signal` resolves, then shut down gracefully.
    pub async fn run_until<F>(self, signal: F) -> Result<usize, Box<dyn Error + Send + Sync>>
    where
        F: Future<Output = ()>,
    {
        signal.await;
        log::info!("shutdown requested for agent '{}'", self.card.name);
        self.shutdown().await
    }

    /// Stop accepting tasks, wait for in-flight ones up to the drain timeout, then stop serving.
    ///
    /// Status queries keep working while the drain is in progress.  Returns the number of tasks
    /// still running when the listener stopped.
    pub async fn shutdown(self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        self.executor.close();
        let in_flight = self.executor.in_flight();
        self.emit(RelayEvent::DrainStarted { in_flight }).await;

        let remaining = self.executor.drain(self.drain_timeout).await;
        self.emit(RelayEvent::DrainCompleted { remaining }).await;

        self.sweeper.abort();
        let _ = self.shutdown_tx.send(());
        self.server.await??;
        log::info!("agent '{}' stopped", self.card.name);
        Ok(remaining)
    }

    async fn emit(&self, event: RelayEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_relay_event(&event).await;
        }
    }
}

/// Resolves when the process is asked to stop: Ctrl-C, or SIGTERM on unix.
///
/// The SIGTERM handler is installed before this returns, so a signal sent right afterwards is
/// not lost.  Must be called from within a tokio runtime.
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = ()> + Send> {
    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::warn!("cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            terminate.recv().await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => log::info!("received Ctrl-C"),
            _ = terminate => log::info!("received SIGTERM"),
        }
    })
}
