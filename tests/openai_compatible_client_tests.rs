use agentrelay::client_wrapper::{ClientWrapper, Message, Role};
use agentrelay::clients::openai_compatible::OpenAICompatibleClient;
use agentrelay::config::LlmConfig;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct MockProvider {
    /// Number of leading requests answered with 503.
    failures_first: usize,
    calls: Arc<AtomicUsize>,
    last_body: Arc<Mutex<Option<Value>>>,
    last_auth: Arc<Mutex<Option<String>>>,
}

async fn chat_completions(
    State(mock): State<MockProvider>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let call = mock.calls.fetch_add(1, Ordering::SeqCst);
    *mock.last_body.lock().unwrap() = Some(body.clone());
    *mock.last_auth.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if call < mock.failures_first {
        return (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response();
    }
    if body["model"] == "missing-model" {
        return (StatusCode::NOT_FOUND, "no such model").into_response();
    }
    let last = body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string();
    Json(json!({
        "choices": [{"message": {"role": "assistant", "content": format!("reply to {}", last)}}],
        "usage": {"prompt_tokens": 7, "completion_tokens": 3, "total_tokens": 10}
    }))
    .into_response()
}

async fn start_mock(mock: MockProvider) -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    format!("http://{}/v1", addr)
}

fn config(api_base: String, model: &str, max_retries: u32) -> LlmConfig {
    LlmConfig {
        api_base,
        api_key: "not-needed".to_string(),
        model: model.to_string(),
        max_retries,
        request_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_sends_chat_completion_request() {
    let mock = MockProvider::default();
    let base = start_mock(mock.clone()).await;
    let client = OpenAICompatibleClient::from_config(&config(base, "gemma-3n-e4b", 0));

    let reply = client
        .send_message(&[
            Message::new(Role::System, "You translate."),
            Message::new(Role::User, "hello"),
        ])
        .await
        .unwrap();
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content, "reply to hello");

    let body = mock.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "gemma-3n-e4b");
    assert_eq!(body["temperature"], 0);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "hello");
    assert_eq!(
        mock.last_auth.lock().unwrap().as_deref(),
        Some("Bearer not-needed")
    );

    let usage = client.get_last_usage().unwrap();
    assert_eq!(usage.input_tokens, 7);
    assert_eq!(usage.total_tokens, 10);
}

#[tokio::test]
async fn test_retries_transient_provider_errors() {
    let mock = MockProvider {
        failures_first: 2,
        ..MockProvider::default()
    };
    let base = start_mock(mock.clone()).await;
    let client = OpenAICompatibleClient::from_config(&config(base, "gemma", 2))
        .with_retry_backoff(Duration::from_millis(5));

    let reply = client
        .send_message(&[Message::new(Role::User, "again")])
        .await
        .unwrap();
    assert_eq!(reply.content, "reply to again");
    assert_eq!(mock.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_gives_up_after_retry_budget() {
    let mock = MockProvider {
        failures_first: 10,
        ..MockProvider::default()
    };
    let base = start_mock(mock.clone()).await;
    let client = OpenAICompatibleClient::from_config(&config(base, "gemma", 1))
        .with_retry_backoff(Duration::from_millis(5));

    let err = client
        .send_message(&[Message::new(Role::User, "x")])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("503"));
    assert_eq!(mock.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let mock = MockProvider::default();
    let base = start_mock(mock.clone()).await;
    let client = OpenAICompatibleClient::from_config(&config(base, "missing-model", 3))
        .with_retry_backoff(Duration::from_millis(5));

    let err = client
        .send_message(&[Message::new(Role::User, "x")])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no such model"));
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
}
