use agentrelay::client_wrapper::{ClientWrapper, Message, Role};
use agentrelay::event::{EventHandler, RelayEvent};
use agentrelay::executor::{
    CancelOutcome, CompletionLogic, FnCompletion, LlmCompletion, RejectReason, SubmitOutcome,
    TaskExecutor,
};
use agentrelay::task::{Task, TaskMessage, TaskState};
use agentrelay::tool_protocol::ToolRegistry;
use agentrelay::tools::LocalToolProtocol;
use async_trait::async_trait;
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingHandler {
    events: Mutex<Vec<RelayEvent>>,
}

impl RecordingHandler {
    fn transitions(&self, task_id: &str) -> Vec<(TaskState, TaskState)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                RelayEvent::TaskStateChanged { task_id: id, from, to } if id == task_id => {
                    Some((*from, *to))
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn on_relay_event(&self, event: &RelayEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Translates the one phrase the scenarios need, fails on "fail", hangs on "hang".
fn scripted_logic() -> Arc<dyn CompletionLogic> {
    Arc::new(FnCompletion::new(|message: TaskMessage| async move {
        match message.text.as_str() {
            "translate 'hello' to Japanese" => Ok("こんにちは".to_string()),
            "fail" => Err("model offline".into()),
            "hang" => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok("too late".to_string())
            }
            other => Ok(other.to_string()),
        }
    }))
}

fn executor_with_recorder() -> (Arc<TaskExecutor>, Arc<RecordingHandler>) {
    let recorder = Arc::new(RecordingHandler::default());
    let executor = TaskExecutor::new(scripted_logic()).with_event_handler(recorder.clone());
    (Arc::new(executor), recorder)
}

async fn wait_for_state(executor: &TaskExecutor, task_id: &str, state: TaskState) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if executor.get_status(task_id).map(|t| t.state()) == Some(state) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("task never reached the expected state");
}

fn assert_monotonic(transitions: &[(TaskState, TaskState)]) {
    let mut current = TaskState::Submitted;
    for (from, to) in transitions {
        assert_eq!(*from, current, "transition history has a gap");
        assert!(from.can_transition_to(*to), "{} -> {} is not allowed", from, to);
        current = *to;
    }
}

#[tokio::test]
async fn test_translation_task_completes_with_exact_text() {
    let (executor, recorder) = executor_with_recorder();

    let outcome = executor
        .submit(Task::new("t1", TaskMessage::text("translate 'hello' to Japanese")))
        .await;
    assert_eq!(outcome, SubmitOutcome::Accepted);
    assert_eq!(executor.drain(Duration::from_secs(2)).await, 0);

    let task = executor.get_status("t1").unwrap();
    assert_eq!(task.state(), TaskState::Completed);
    assert_eq!(task.result(), Some("こんにちは"));
    assert_eq!(task.error(), None);
    assert!(task.updated_at() >= task.created_at());

    let transitions = recorder.transitions("t1");
    assert_eq!(
        transitions,
        vec![
            (TaskState::Submitted, TaskState::Working),
            (TaskState::Working, TaskState::Completed),
        ]
    );
}

#[tokio::test]
async fn test_failing_logic_marks_task_failed() {
    let (executor, recorder) = executor_with_recorder();

    executor.submit(Task::new("t2", TaskMessage::text("fail"))).await;
    executor.drain(Duration::from_secs(2)).await;

    let task = executor.get_status("t2").unwrap();
    assert_eq!(task.state(), TaskState::Failed);
    assert_eq!(task.error(), Some("model offline"));
    assert_eq!(task.result(), None);
    assert_monotonic(&recorder.transitions("t2"));
}

#[tokio::test]
async fn test_cancel_while_working() {
    let (executor, recorder) = executor_with_recorder();

    executor.submit(Task::new("t3", TaskMessage::text("hang"))).await;
    wait_for_state(&executor, "t3", TaskState::Working).await;

    assert_eq!(executor.cancel("t3").await, CancelOutcome::Acknowledged);
    assert_eq!(executor.get_status("t3").unwrap().state(), TaskState::Canceled);

    // The hanging completion is abandoned, so the drain finishes promptly.
    assert_eq!(executor.drain(Duration::from_secs(2)).await, 0);
    let task = executor.get_status("t3").unwrap();
    assert_eq!(task.state(), TaskState::Canceled);
    assert_eq!(task.result(), None);

    assert_eq!(
        executor.cancel("t3").await,
        CancelOutcome::AlreadyTerminal(TaskState::Canceled)
    );
    assert_eq!(
        recorder.transitions("t3"),
        vec![
            (TaskState::Submitted, TaskState::Working),
            (TaskState::Working, TaskState::Canceled),
        ]
    );
}

#[tokio::test]
async fn test_cancel_unknown_and_completed_tasks() {
    let (executor, _) = executor_with_recorder();
    assert_eq!(executor.cancel("nope").await, CancelOutcome::NotFound);

    executor.submit(Task::new("t1", TaskMessage::text("ok"))).await;
    executor.drain(Duration::from_secs(2)).await;
    assert_eq!(
        executor.cancel("t1").await,
        CancelOutcome::AlreadyTerminal(TaskState::Completed)
    );
    assert_eq!(executor.get_status("t1").unwrap().result(), Some("ok"));
}

#[tokio::test]
async fn test_task_ids_are_single_use() {
    let (executor, _) = executor_with_recorder();

    executor.submit(Task::new("t1", TaskMessage::text("first"))).await;
    executor.drain(Duration::from_secs(2)).await;

    let again = executor.submit(Task::new("t1", TaskMessage::text("second"))).await;
    assert_eq!(again, SubmitOutcome::Rejected(RejectReason::Duplicate));
    assert_eq!(executor.get_status("t1").unwrap().result(), Some("first"));
}

#[tokio::test]
async fn test_concurrent_duplicate_submissions_accept_once() {
    let (executor, _) = executor_with_recorder();

    let mut handles = Vec::new();
    for i in 0..16 {
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            executor
                .submit(Task::new("shared", TaskMessage::text(format!("copy {}", i))))
                .await
        }));
    }
    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap() == SubmitOutcome::Accepted {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
    executor.drain(Duration::from_secs(2)).await;
    assert_eq!(executor.task_count(), 1);
}

#[tokio::test]
async fn test_many_tasks_run_concurrently() {
    let gate = Arc::new(tokio::sync::Barrier::new(8));
    let logic = {
        let gate = gate.clone();
        FnCompletion::new(move |message: TaskMessage| {
            let gate = gate.clone();
            async move {
                // Every task must be working at once for the barrier to open.
                gate.wait().await;
                Ok(message.text)
            }
        })
    };
    let executor = Arc::new(TaskExecutor::new(Arc::new(logic)));
    for i in 0..8 {
        executor
            .submit(Task::new(format!("t{}", i), TaskMessage::text(format!("r{}", i))))
            .await;
    }
    assert_eq!(executor.drain(Duration::from_secs(2)).await, 0);
    for i in 0..8 {
        let task = executor.get_status(&format!("t{}", i)).unwrap();
        assert_eq!(task.result(), Some(format!("r{}", i).as_str()));
    }
}

#[tokio::test]
async fn test_close_refuses_new_work_and_drain_waits() {
    let logic = FnCompletion::new(|message: TaskMessage| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(message.text)
    });
    let executor = Arc::new(TaskExecutor::new(Arc::new(logic)));

    executor.submit(Task::new("slow", TaskMessage::text("done"))).await;
    executor.close();
    assert!(!executor.is_accepting());
    assert_eq!(
        executor.submit(Task::new("late", TaskMessage::text("x"))).await,
        SubmitOutcome::Rejected(RejectReason::ShuttingDown)
    );

    assert_eq!(executor.drain(Duration::from_secs(2)).await, 0);
    assert_eq!(
        executor.get_status("slow").unwrap().state(),
        TaskState::Completed
    );
    assert!(executor.get_status("late").is_none());
}

#[tokio::test]
async fn test_drain_reports_stragglers() {
    let (executor, _) = executor_with_recorder();
    executor.submit(Task::new("t", TaskMessage::text("hang"))).await;
    assert_eq!(executor.drain(Duration::from_millis(50)).await, 1);
    executor.cancel("t").await;
    assert_eq!(executor.drain(Duration::from_secs(2)).await, 0);
}

struct CountingClient {
    request_sizes: Mutex<Vec<usize>>,
}

#[async_trait]
impl ClientWrapper for CountingClient {
    async fn send_message(
        &self,
        messages: &[Message],
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        self.request_sizes.lock().unwrap().push(messages.len());
        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        Ok(Message::new(Role::Assistant, format!("re: {}", last)))
    }

    fn model_name(&self) -> &str {
        "counting"
    }
}

#[tokio::test]
async fn test_llm_completion_keeps_history_per_context() {
    let client = Arc::new(CountingClient {
        request_sizes: Mutex::new(Vec::new()),
    });
    let logic = Arc::new(LlmCompletion::new(client.clone(), "Be brief."));
    let executor = Arc::new(TaskExecutor::new(logic.clone()));

    let messages = [
        ("a", TaskMessage::text("one").with_context_id("c1")),
        ("b", TaskMessage::text("two").with_context_id("c1")),
        ("c", TaskMessage::text("three")),
    ];
    for (id, message) in messages {
        executor.submit(Task::new(id, message)).await;
        executor.drain(Duration::from_secs(2)).await;
    }

    // system + user, then system + user + assistant + user, then a fresh session
    assert_eq!(*client.request_sizes.lock().unwrap(), vec![2, 4, 2]);
    assert_eq!(executor.get_status("b").unwrap().result(), Some("re: two"));
    assert_eq!(logic.session_count(), 1);
}

#[tokio::test]
async fn test_idle_conversations_are_forgotten_on_purge() {
    let client = Arc::new(CountingClient {
        request_sizes: Mutex::new(Vec::new()),
    });
    let logic = Arc::new(LlmCompletion::new(client, "Be brief."));
    let executor = Arc::new(TaskExecutor::new(logic.clone()));

    for i in 0..50 {
        let message = TaskMessage::text("hi").with_context_id(format!("ctx-{}", i));
        executor.submit(Task::new(format!("t{}", i), message)).await;
    }
    assert_eq!(executor.drain(Duration::from_secs(5)).await, 0);
    assert_eq!(logic.session_count(), 50);

    assert_eq!(executor.purge_expired(Duration::from_secs(3600)).await, 0);
    assert_eq!(logic.session_count(), 50);

    assert_eq!(executor.purge_expired(Duration::ZERO).await, 50);
    assert_eq!(executor.task_count(), 0);
    assert_eq!(logic.session_count(), 0);
}

/// Records state changes, pausing before it records a task entering `working`.
#[derive(Default)]
struct SlowStartHandler {
    transitions: Mutex<Vec<(TaskState, TaskState)>>,
}

#[async_trait]
impl EventHandler for SlowStartHandler {
    async fn on_relay_event(&self, event: &RelayEvent) {
        if let RelayEvent::TaskStateChanged { from, to, .. } = event {
            if *to == TaskState::Working {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            self.transitions.lock().unwrap().push((*from, *to));
        }
    }
}

#[tokio::test]
async fn test_state_events_arrive_in_transition_order() {
    let handler = Arc::new(SlowStartHandler::default());
    let executor =
        Arc::new(TaskExecutor::new(scripted_logic()).with_event_handler(handler.clone()));

    executor.submit(Task::new("t", TaskMessage::text("hang"))).await;
    tokio::time::timeout(Duration::from_secs(2), async {
        while executor.get_status("t").map(|t| t.state()) != Some(TaskState::Working) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();

    // The working event is still being delivered when the cancel lands.
    assert_eq!(executor.cancel("t").await, CancelOutcome::Acknowledged);
    assert_eq!(executor.drain(Duration::from_secs(2)).await, 0);
    assert_eq!(
        *handler.transitions.lock().unwrap(),
        vec![
            (TaskState::Submitted, TaskState::Working),
            (TaskState::Working, TaskState::Canceled),
        ]
    );
}

/// Asks for a calculation on the first turn, then echoes whatever it is told.
struct ToolUsingClient {
    system_prompts: Mutex<Vec<String>>,
    tool_call: String,
}

#[async_trait]
impl ClientWrapper for ToolUsingClient {
    async fn send_message(
        &self,
        messages: &[Message],
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        if let Some(system) = messages.iter().find(|m| m.role == Role::System) {
            self.system_prompts.lock().unwrap().push(system.content.clone());
        }
        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        let reply = if last.starts_with("Tool ") {
            format!("answer: {}", last)
        } else {
            format!("Let me compute that. {}", self.tool_call)
        };
        Ok(Message::new(Role::Assistant, reply))
    }

    fn model_name(&self) -> &str {
        "tool-using"
    }
}

async fn calculator_registry() -> Arc<ToolRegistry> {
    let mut tools = ToolRegistry::new();
    tools
        .add_protocol(Arc::new(LocalToolProtocol::new().with_calculator()))
        .await
        .unwrap();
    Arc::new(tools)
}

#[tokio::test]
async fn test_llm_completion_runs_requested_tools() {
    let client = Arc::new(ToolUsingClient {
        system_prompts: Mutex::new(Vec::new()),
        tool_call: r#"{"tool_call": {"name": "calculate", "parameters": {"expression": "12 * 34"}}}"#
            .to_string(),
    });
    let logic = LlmCompletion::new(client.clone(), "Be brief.")
        .with_tools(calculator_registry().await);
    let executor = Arc::new(TaskExecutor::new(Arc::new(logic)));

    executor
        .submit(Task::new("calc", TaskMessage::text("What is 12 * 34?")))
        .await;
    assert_eq!(executor.drain(Duration::from_secs(2)).await, 0);

    let task = executor.get_status("calc").unwrap();
    assert_eq!(task.state(), TaskState::Completed);
    let result = task.result().unwrap();
    assert!(result.starts_with("answer: Tool 'calculate' executed successfully"));
    assert!(result.contains("12 * 34 = 408"));

    let prompts = client.system_prompts.lock().unwrap();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].starts_with("Be brief."));
    assert!(prompts[0].contains("- calculate: Evaluate an arithmetic expression"));
}

#[tokio::test]
async fn test_endless_tool_calls_fail_the_task() {
    /// Every reply, tool feedback included, asks for another calculation.
    struct Looping;

    #[async_trait]
    impl ClientWrapper for Looping {
        async fn send_message(
            &self,
            _messages: &[Message],
        ) -> Result<Message, Box<dyn Error + Send + Sync>> {
            Ok(Message::new(
                Role::Assistant,
                r#"{"tool_call": {"name": "calculate", "parameters": {"expression": "1"}}}"#,
            ))
        }

        fn model_name(&self) -> &str {
            "looping"
        }
    }

    let logic = LlmCompletion::new(Arc::new(Looping), "Be brief.")
        .with_tools(calculator_registry().await)
        .with_max_tool_iterations(3);
    let executor = Arc::new(TaskExecutor::new(Arc::new(logic)));

    executor.submit(Task::new("loop", TaskMessage::text("go"))).await;
    assert_eq!(executor.drain(Duration::from_secs(2)).await, 0);

    let task = executor.get_status("loop").unwrap();
    assert_eq!(task.state(), TaskState::Failed);
    assert!(task.error().unwrap().contains("more than 3 tool calls"));
}
