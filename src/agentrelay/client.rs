//! Remote invocation client.
//!
//! [`RemoteAgentClient`] turns "ask agent X to do Y" into the full exchange with X's listener:
//!
//! 1. resolve X in the [`AgentRegistry`],
//! 2. fetch and check X's [`AgentCard`],
//! 3. submit a fresh [`Task`],
//! 4. poll until the task is terminal or the overall timeout elapses.
//!
//! The caller sees a single async call returning the result text or an [`A2AError`].  Transport
//! failures are retried once per request; application failures never are.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentrelay::client::RemoteAgentClient;
//! use agentrelay::registry::{AgentRegistry, RemoteAgentEntry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = AgentRegistry::new()
//!         .with_agent(RemoteAgentEntry::new("translator", "http://localhost:8001"));
//!     let client = RemoteAgentClient::new(registry);
//!
//!     match client
//!         .invoke_remote_agent("translator", "translate 'hello' to Japanese")
//!         .await
//!     {
//!         Ok(text) => println!("{}", text),
//!         Err(e) => eprintln!("delegation failed: {}", e),
//!     }
//! }
//! ```

use crate::agentrelay::agent_card::{AgentCard, TEXT_PLAIN};
use crate::agentrelay::config::RemoteAgentClientConfig;
use crate::agentrelay::error::A2AError;
use crate::agentrelay::http_client_pool::get_or_create_client;
use crate::agentrelay::registry::{AgentRegistry, RemoteAgentEntry};
use crate::agentrelay::task::{
    new_task_id, SubmitTaskRequest, SubmitTaskResponse, Task, TaskMessage, TaskState,
    TaskStatusResponse,
};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

/// What an orchestrator knows about one registered agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub name: String,
    pub url: String,
    pub description: String,
    /// Skill names from the live card; empty when the agent was unreachable.
    pub skills: Vec<String>,
    pub reachable: bool,
}

/// Render summaries as the text block shown to a model or a terminal.
pub fn render_agent_summaries(agents: &[AgentSummary]) -> String {
    if agents.is_empty() {
        return "No remote agents are registered.".to_string();
    }
    let mut lines = vec!["Available agents:".to_string()];
    for agent in agents {
        lines.push(String::new());
        lines.push(format!("[{}]", agent.name));
        lines.push(format!("  URL: {}", agent.url));
        if !agent.description.is_empty() {
            lines.push(format!("  Description: {}", agent.description));
        }
        if agent.reachable {
            lines.push(format!("  Skills: {}", agent.skills.join(", ")));
        } else {
            lines.push("  Status: unreachable".to_string());
        }
    }
    lines.join("\n")
}

/// Delegates tasks to the agents of one [`AgentRegistry`].
pub struct RemoteAgentClient {
    registry: AgentRegistry,
    config: RemoteAgentClientConfig,
}

impl RemoteAgentClient {
    pub fn new(registry: AgentRegistry) -> Self {
        Self::with_config(registry, RemoteAgentClientConfig::default())
    }

    pub fn with_config(registry: AgentRegistry, config: RemoteAgentClientConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RemoteAgentClientConfig {
        &self.config
    }

    /// Ask `target_name` to handle `message` and wait for its result text.
    pub async fn invoke_remote_agent(
        &self,
        target_name: &str,
        message: &str,
    ) -> Result<String, A2AError> {
        self.invoke(target_name, TaskMessage::text(message)).await
    }

    /// Like [`invoke_remote_agent`](Self::invoke_remote_agent) with structured parameters.
    pub async fn invoke_with_parameters(
        &self,
        target_name: &str,
        message: &str,
        parameters: serde_json::Value,
    ) -> Result<String, A2AError> {
        self.invoke(target_name, TaskMessage::text(message).with_parameters(parameters))
            .await
    }

    /// Run one full delegation for an arbitrary [`TaskMessage`].
    pub async fn invoke(
        &self,
        target_name: &str,
        message: TaskMessage,
    ) -> Result<String, A2AError> {
        let entry = self
            .registry
            .resolve(target_name)
            .ok_or_else(|| A2AError::UnknownAgent(target_name.to_string()))?;
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.config.timeout;
        let http = self.http_for(entry);

        let card = match tokio::time::timeout_at(deadline, self.discover(&http, entry)).await {
            Ok(card) => card?,
            Err(_) => {
                return Err(A2AError::AgentUnreachable {
                    agent: entry.name.clone(),
                    reason: "no agent card within the timeout".to_string(),
                })
            }
        };
        check_compatible(entry, &card)?;

        let task = Task::new(new_task_id(), message);
        let task_id = task.id().to_string();
        log::debug!(
            "delegating task {} to '{}' at {}",
            task_id,
            entry.name,
            entry.url
        );

        match tokio::time::timeout_at(deadline, self.submit(&http, entry, &task)).await {
            Ok(submitted) => submitted?,
            Err(_) => {
                self.cancel_best_effort(&http, entry, &task_id).await;
                return Err(A2AError::AgentUnreachable {
                    agent: entry.name.clone(),
                    reason: "submission did not finish within the timeout".to_string(),
                });
            }
        }

        match tokio::time::timeout_at(deadline, self.poll(&http, entry, &task_id)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                log::warn!(
                    "task {} on '{}' timed out after {:?}",
                    task_id,
                    entry.name,
                    self.config.timeout
                );
                self.cancel_best_effort(&http, entry, &task_id).await;
                Err(A2AError::Timeout {
                    task_id,
                    waited_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }

    /// Fetch the live card of a registered agent.
    pub async fn fetch_card(&self, name: &str) -> Result<AgentCard, A2AError> {
        let entry = self
            .registry
            .resolve(name)
            .ok_or_else(|| A2AError::UnknownAgent(name.to_string()))?;
        let http = self.http_for(entry);
        match tokio::time::timeout(self.config.timeout, self.discover(&http, entry)).await {
            Ok(card) => card,
            Err(_) => Err(A2AError::AgentUnreachable {
                agent: entry.name.clone(),
                reason: "no agent card within the timeout".to_string(),
            }),
        }
    }

    /// Every registered agent, enriched with its live card where reachable.
    pub async fn list_available_agents(&self) -> Vec<AgentSummary> {
        let mut summaries = Vec::with_capacity(self.registry.entries().len());
        for entry in self.registry.entries() {
            let summary = match self.fetch_card(&entry.name).await {
                Ok(card) => AgentSummary {
                    name: entry.name.clone(),
                    url: entry.url.clone(),
                    description: card.description,
                    skills: card.skills.into_iter().map(|s| s.name).collect(),
                    reachable: true,
                },
                Err(e) => {
                    log::debug!("agent '{}' not listed as reachable: {}", entry.name, e);
                    AgentSummary {
                        name: entry.name.clone(),
                        url: entry.url.clone(),
                        description: entry.description.clone(),
                        skills: Vec::new(),
                        reachable: false,
                    }
                }
            };
            summaries.push(summary);
        }
        summaries
    }

    fn http_for(&self, entry: &RemoteAgentEntry) -> reqwest::Client {
        get_or_create_client(&entry.url, self.config.request_timeout)
    }

    /// Send a request, reconnecting once on a transport error.
    ///
    /// The flag is true when the answer came from the second attempt.
    async fn send_with_reconnect<F>(
        &self,
        agent: &str,
        build: F,
    ) -> Result<(reqwest::Response, bool), A2AError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        match build().send().await {
            Ok(response) => Ok((response, false)),
            Err(first) => {
                let first = classify_send_error(agent, first);
                if !first.is_transport() {
                    return Err(first);
                }
                log::warn!("request to '{}' failed, reconnecting once: {}", agent, first);
                build()
                    .send()
                    .await
                    .map(|response| (response, true))
                    .map_err(|e| classify_send_error(agent, e))
            }
        }
    }

    async fn discover(
        &self,
        http: &reqwest::Client,
        entry: &RemoteAgentEntry,
    ) -> Result<AgentCard, A2AError> {
        let url = format!("{}/capabilities", entry.url);
        let (response, _) = self
            .send_with_reconnect(&entry.name, || http.get(&url))
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(A2AError::Protocol(format!("GET {} returned {}", url, status)));
        }
        response
            .json::<AgentCard>()
            .await
            .map_err(|e| A2AError::Protocol(format!("invalid agent card from {}: {}", url, e)))
    }

    async fn submit(
        &self,
        http: &reqwest::Client,
        entry: &RemoteAgentEntry,
        task: &Task,
    ) -> Result<(), A2AError> {
        let url = format!("{}/tasks", entry.url);
        let body = SubmitTaskRequest::from(task);
        let (response, retried) = self
            .send_with_reconnect(&entry.name, || http.post(&url).json(&body))
            .await?;
        let status = response.status();
        if submit_accepted(status, retried) {
            if !status.is_success() {
                log::debug!("task {} already accepted by '{}'", task.id(), entry.name);
            }
            return Ok(());
        }
        let reason = match response.json::<SubmitTaskResponse>().await {
            Ok(SubmitTaskResponse {
                reason: Some(reason),
                ..
            }) => reason,
            _ => status.to_string(),
        };
        Err(A2AError::Rejected {
            task_id: task.id().to_string(),
            reason,
        })
    }

    async fn poll(
        &self,
        http: &reqwest::Client,
        entry: &RemoteAgentEntry,
        task_id: &str,
    ) -> Result<String, A2AError> {
        let url = format!("{}/tasks/{}", entry.url, task_id);
        let mut ticker =
            tokio::time::interval(self.config.poll_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let (response, _) = self
                .send_with_reconnect(&entry.name, || http.get(&url))
                .await?;
            if response.status() == StatusCode::NOT_FOUND {
                return Err(A2AError::TaskNotFound(task_id.to_string()));
            }
            if !response.status().is_success() {
                return Err(A2AError::Protocol(format!(
                    "GET {} returned {}",
                    url,
                    response.status()
                )));
            }
            let observed = response
                .json::<TaskStatusResponse>()
                .await
                .map_err(|e| A2AError::Protocol(format!("invalid task status: {}", e)))?;

            match observed.status {
                TaskState::Submitted | TaskState::Working => continue,
                TaskState::Completed => {
                    return observed.result.ok_or_else(|| {
                        A2AError::Protocol(format!("task {} completed without a result", task_id))
                    })
                }
                TaskState::Failed => {
                    return Err(A2AError::ExecutionFailed {
                        task_id: task_id.to_string(),
                        detail: observed
                            .error
                            .unwrap_or_else(|| "no error detail reported".to_string()),
                    })
                }
                TaskState::Canceled => {
                    return Err(A2AError::Canceled {
                        task_id: task_id.to_string(),
                    })
                }
            }
        }
    }

    async fn cancel_best_effort(
        &self,
        http: &reqwest::Client,
        entry: &RemoteAgentEntry,
        task_id: &str,
    ) {
        let url = format!("{}/tasks/{}/cancel", entry.url, task_id);
        if let Err(e) = http.post(&url).send().await {
            log::debug!(
                "cancel of task {} on '{}' not delivered: {}",
                task_id,
                entry.name,
                e
            );
        }
    }
}

/// A request that never left the process is not worth a reconnect.
fn classify_send_error(agent: &str, err: reqwest::Error) -> A2AError {
    if err.is_builder() {
        A2AError::Protocol(format!("cannot build request for '{}': {}", agent, err))
    } else {
        A2AError::AgentUnreachable {
            agent: agent.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Whether a submission answered with `status` got the task registered.
///
/// A 409 on the reconnect attempt means the first attempt reached the listener before its
/// connection dropped, so the id is already ours.
fn submit_accepted(status: StatusCode, retried: bool) -> bool {
    status.is_success() || (status == StatusCode::CONFLICT && retried)
}

fn check_compatible(entry: &RemoteAgentEntry, card: &AgentCard) -> Result<(), A2AError> {
    if !card.accepts_input(TEXT_PLAIN) {
        return Err(A2AError::AgentIncompatible {
            agent: entry.name.clone(),
            reason: format!("card does not accept {} input", TEXT_PLAIN),
        });
    }
    if let Some(kind) = entry.required_skill {
        if !card.declares(kind) {
            return Err(A2AError::AgentIncompatible {
                agent: entry.name.clone(),
                reason: format!("card does not declare the '{}' skill", kind),
            });
        }
    }
    Ok(())
}
