use agentrelay::agent_card::{AgentCard, AgentSkill, SkillKind};
use agentrelay::client::RemoteAgentClient;
use agentrelay::config::RemoteAgentClientConfig;
use agentrelay::executor::FnCompletion;
use agentrelay::registry::{AgentRegistry, RemoteAgentEntry};
use agentrelay::server::{A2AServerBuilder, A2AServerInstance};
use agentrelay::task::TaskMessage;
use agentrelay::tool::{RemoteAgentProtocol, INVOKE_REMOTE_AGENT, LIST_AVAILABLE_AGENTS};
use agentrelay::tool_protocol::{ToolProtocol, ToolRegistry};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn start_translator() -> A2AServerInstance {
    let card = AgentCard::new("Translator", "Japanese and English", "http://localhost:8001")
        .with_skill(AgentSkill::new(
            "translation",
            SkillKind::Translation,
            "Translation",
        ));
    let logic = FnCompletion::new(|message: TaskMessage| async move {
        if message.text.contains("fail") {
            return Err("model offline".into());
        }
        Ok("こんにちは".to_string())
    });
    A2AServerBuilder::new(card, Arc::new(logic))
        .start_on(0)
        .await
        .unwrap()
}

fn protocol_for(server: &A2AServerInstance) -> Arc<RemoteAgentProtocol> {
    let registry =
        AgentRegistry::new().with_agent(RemoteAgentEntry::new("translator", server.base_url()));
    let config = RemoteAgentClientConfig::default().with_poll_interval(Duration::from_millis(10));
    Arc::new(RemoteAgentProtocol::new(Arc::new(
        RemoteAgentClient::with_config(registry, config),
    )))
}

#[tokio::test]
async fn test_orchestrator_delegates_through_tool_registry() {
    let server = start_translator().await;
    let mut registry = ToolRegistry::new();
    let added = registry.add_protocol(protocol_for(&server)).await.unwrap();
    assert_eq!(added, 2);

    let result = registry
        .execute_tool(
            INVOKE_REMOTE_AGENT,
            json!({"target_agent": "translator", "message": "translate 'hello' to Japanese"}),
        )
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.output, json!("こんにちは"));
    assert_eq!(result.metadata["agent"], json!("translator"));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_delegation_is_reported_not_invented() {
    let server = start_translator().await;
    let protocol = protocol_for(&server);

    let result = protocol
        .execute(
            INVOKE_REMOTE_AGENT,
            json!({"target_agent": "translator", "message": "please fail"}),
        )
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.output, serde_json::Value::Null);
    let error = result.error.unwrap();
    assert!(error.starts_with("The delegated task could not be completed"));
    assert!(error.contains("model offline"));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_list_available_agents_tool() {
    let server = start_translator().await;
    let protocol = protocol_for(&server);

    let result = protocol
        .execute(LIST_AVAILABLE_AGENTS, json!({}))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.output["agents"][0]["name"], "translator");
    assert_eq!(result.output["agents"][0]["reachable"], true);
    let text = result.output["text"].as_str().unwrap();
    assert!(text.contains("[translator]"));
    assert!(text.contains("Translation"));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_tool_name_is_an_error() {
    let server = start_translator().await;
    let protocol = protocol_for(&server);

    assert!(protocol.execute("summon_dragon", json!({})).await.is_err());
    assert!(protocol.get_tool_metadata("summon_dragon").await.is_err());
    let metadata = protocol.get_tool_metadata(INVOKE_REMOTE_AGENT).await.unwrap();
    let required: Vec<&str> = metadata
        .parameters
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(required, vec!["target_agent", "message"]);

    server.shutdown().await.unwrap();
}
