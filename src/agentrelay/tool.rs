//! Remote agents as orchestrator tools.
//!
//! [`RemoteAgentProtocol`] exposes a [`RemoteAgentClient`] through the [`ToolProtocol`] trait so
//! an orchestrating model can delegate by calling a tool:
//!
//! - `invoke_remote_agent(target_agent, message)` returns the remote result text,
//! - `list_available_agents()` describes the registered agents.
//!
//! Delegation failures never surface as protocol errors.  They come back as a failed
//! [`ToolResult`] whose error states that the delegated task could not be completed and why, so
//! the model can relay that instead of inventing an answer.

use crate::agentrelay::client::{render_agent_summaries, RemoteAgentClient};
use crate::agentrelay::error::A2AError;
use crate::agentrelay::tool_protocol::{
    ToolError, ToolMetadata, ToolParameter, ToolParameterType, ToolProtocol, ToolResult,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::error::Error;
use std::sync::Arc;

pub const INVOKE_REMOTE_AGENT: &str = "invoke_remote_agent";
pub const LIST_AVAILABLE_AGENTS: &str = "list_available_agents";

#[derive(Deserialize)]
struct InvokeParams {
    target_agent: String,
    message: String,
    #[serde(default)]
    parameters: Option<serde_json::Value>,
}

/// Tool protocol backed by a [`RemoteAgentClient`].
pub struct RemoteAgentProtocol {
    client: Arc<RemoteAgentClient>,
}

impl RemoteAgentProtocol {
    pub fn new(client: Arc<RemoteAgentClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<RemoteAgentClient> {
        &self.client
    }

    fn invoke_metadata(&self) -> ToolMetadata {
        let names: Vec<&str> = self
            .client
            .registry()
            .entries()
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        ToolMetadata::new(
            INVOKE_REMOTE_AGENT,
            "Delegate a request to a remote agent and return its answer",
        )
        .with_parameter(
            ToolParameter::new("target_agent", ToolParameterType::String)
                .with_description(format!("Registered agent name, one of: {}", names.join(", ")))
                .required(),
        )
        .with_parameter(
            ToolParameter::new("message", ToolParameterType::String)
                .with_description("The request for the remote agent, in plain text")
                .required(),
        )
        .with_parameter(
            ToolParameter::new("parameters", ToolParameterType::Object)
                .with_description("Optional structured parameters passed along with the message"),
        )
        .with_protocol_metadata("agents", serde_json::json!(names))
    }

    fn list_metadata(&self) -> ToolMetadata {
        ToolMetadata::new(
            LIST_AVAILABLE_AGENTS,
            "List the remote agents that requests can be delegated to",
        )
    }

    async fn invoke(&self, parameters: serde_json::Value) -> Result<ToolResult, ToolError> {
        let params: InvokeParams = serde_json::from_value(parameters)
            .map_err(|e| ToolError::InvalidParameters(e.to_string()))?;

        let outcome = match params.parameters {
            Some(extra) => {
                self.client
                    .invoke_with_parameters(&params.target_agent, &params.message, extra)
                    .await
            }
            None => {
                self.client
                    .invoke_remote_agent(&params.target_agent, &params.message)
                    .await
            }
        };

        Ok(match outcome {
            Ok(text) => ToolResult::success(serde_json::Value::String(text))
                .with_metadata("agent", serde_json::json!(params.target_agent)),
            Err(e) => {
                log::warn!("delegation to '{}' failed: {}", params.target_agent, e);
                ToolResult::failure(describe_failure(&e))
                    .with_metadata("agent", serde_json::json!(params.target_agent))
            }
        })
    }
}

fn describe_failure(error: &A2AError) -> String {
    format!("The delegated task could not be completed: {}", error)
}

#[async_trait]
impl ToolProtocol for RemoteAgentProtocol {
    async fn execute(
        &self,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        match tool_name {
            INVOKE_REMOTE_AGENT => Ok(self.invoke(parameters).await?),
            LIST_AVAILABLE_AGENTS => {
                let agents = self.client.list_available_agents().await;
                let text = render_agent_summaries(&agents);
                Ok(ToolResult::success(serde_json::json!({
                    "agents": agents,
                    "text": text,
                })))
            }
            other => Err(Box::new(ToolError::NotFound(other.to_string()))),
        }
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        Ok(vec![self.invoke_metadata(), self.list_metadata()])
    }

    async fn get_tool_metadata(
        &self,
        tool_name: &str,
    ) -> Result<ToolMetadata, Box<dyn Error + Send + Sync>> {
        match tool_name {
            INVOKE_REMOTE_AGENT => Ok(self.invoke_metadata()),
            LIST_AVAILABLE_AGENTS => Ok(self.list_metadata()),
            other => Err(Box::new(ToolError::NotFound(other.to_string()))),
        }
    }

    fn protocol_name(&self) -> &str {
        "a2a"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agentrelay::registry::{AgentRegistry, RemoteAgentEntry};

    fn protocol() -> RemoteAgentProtocol {
        let registry = AgentRegistry::new()
            .with_agent(RemoteAgentEntry::new("translator", "http://127.0.0.1:9"));
        RemoteAgentProtocol::new(Arc::new(RemoteAgentClient::new(registry)))
    }

    #[tokio::test]
    async fn test_lists_both_tools() {
        let tools = protocol().list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![INVOKE_REMOTE_AGENT, LIST_AVAILABLE_AGENTS]);
        assert_eq!(
            tools[0].protocol_metadata["agents"],
            serde_json::json!(["translator"])
        );
    }

    #[tokio::test]
    async fn test_missing_parameters_are_invalid() {
        let err = protocol()
            .execute(INVOKE_REMOTE_AGENT, serde_json::json!({"message": "hi"}))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid parameters"));
    }

    #[tokio::test]
    async fn test_unknown_agent_is_a_failed_result() {
        let result = protocol()
            .execute(
                INVOKE_REMOTE_AGENT,
                serde_json::json!({"target_agent": "poet", "message": "a haiku"}),
            )
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.output, serde_json::Value::Null);
        assert_eq!(
            result.error.as_deref(),
            Some("The delegated task could not be completed: Unknown agent: poet")
        );
    }
}
