#![cfg(unix)]

use agentrelay::agent_card::{AgentCard, AgentSkill, SkillKind};
use agentrelay::executor::{FnCompletion, SubmitOutcome};
use agentrelay::server::{shutdown_signal, A2AServerBuilder};
use agentrelay::task::{Task, TaskMessage, TaskState};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_sigterm_drains_in_flight_tasks() {
    let card = AgentCard::new("Translator", "Slow translator", "http://localhost:8001")
        .with_skill(AgentSkill::new(
            "translation",
            SkillKind::Translation,
            "Translation",
        ));
    let logic = FnCompletion::new(|_message: TaskMessage| async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok("こんにちは".to_string())
    });
    let server = A2AServerBuilder::new(card, Arc::new(logic))
        .with_drain_timeout(Duration::from_secs(5))
        .start_on(0)
        .await
        .unwrap();
    let executor = server.executor().clone();

    let outcome = executor
        .submit(Task::new("slow", TaskMessage::text("hello")))
        .await;
    assert_eq!(outcome, SubmitOutcome::Accepted);

    let signal = shutdown_signal().unwrap();
    let status = Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let remaining = tokio::time::timeout(Duration::from_secs(5), server.run_until(signal))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(remaining, 0);
    assert!(!executor.is_accepting());

    let task = executor.get_status("slow").unwrap();
    assert_eq!(task.state(), TaskState::Completed);
    assert_eq!(task.result(), Some("こんにちは"));
}
