//! Integration tests for the Gemini client against a mock HTTP server.

#![allow(clippy::unwrap_used, clippy::panic)]

use docent::llm::{ChatBackend, GeminiClient, GenerationConfig, LlmError};
use docent::turn::run_turn;
use docent_core::{ChatSession, Message, Scope, SessionId};
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-1.5-flash";
const ENDPOINT: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new(
        format!("{}/v1beta", server.uri()),
        MODEL,
        "test-key",
        Duration::from_secs(5),
    )
    .unwrap()
}

fn reply(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

async fn last_request_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.unwrap();
    let last = requests.last().unwrap();
    serde_json::from_slice(&last.body).unwrap()
}

// =============================================================================
// SUCCESS PATHS
// =============================================================================

#[tokio::test]
async fn test_generate_sends_key_and_returns_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("A p-value is...")))
        .expect(1)
        .mount(&server)
        .await;

    let answer = client(&server).generate(&[], "What is a p-value?").await.unwrap();
    assert_eq!(answer, "A p-value is...");

    let body = last_request_body(&server).await;
    assert_eq!(body["contents"].as_array().unwrap().len(), 1);
    assert_eq!(body["contents"][0]["role"], "user");
    assert_eq!(body["contents"][0]["parts"][0]["text"], "What is a p-value?");
    assert!(body.get("generationConfig").is_none());
}

#[tokio::test]
async fn test_history_and_generation_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("ok")))
        .mount(&server)
        .await;

    let backend = client(&server).with_generation(GenerationConfig {
        temperature: Some(0.5),
        max_output_tokens: Some(128),
    });
    let history = [Message::user("q1"), Message::assistant("a1")];
    backend.generate(&history, "q2").await.unwrap();

    let body = last_request_body(&server).await;
    let roles: Vec<&str> = body["contents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, ["user", "model", "user"]);
    assert_eq!(body["generationConfig"]["temperature"], 0.5);
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 128);
}

#[tokio::test]
async fn test_session_replays_composed_prompts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("Sure.")))
        .mount(&server)
        .await;

    let backend = client(&server);
    let mut session = ChatSession::new(SessionId(1), Scope::data_science());
    run_turn(&backend, &mut session, "What is overfitting?").await.unwrap();
    run_turn(&backend, &mut session, "And underfitting?").await.unwrap();

    let body = last_request_body(&server).await;
    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    let first = contents[0]["parts"][0]["text"].as_str().unwrap();
    assert!(first.starts_with("You are a helpful assistant specialized in Data Science"));
    assert!(first.ends_with("User query: What is overfitting?"));
    // The transcript keeps the question as typed
    assert_eq!(session.transcript.messages()[0].content, "What is overfitting?");
}

// =============================================================================
// FAILURE PATHS
// =============================================================================

#[tokio::test]
async fn test_api_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "message": "Method doesn't allow unregistered callers.",
                "status": "PERMISSION_DENIED"
            }
        })))
        .mount(&server)
        .await;

    match client(&server).generate(&[], "hi").await {
        Err(LlmError::Api { code, status, .. }) => {
            assert_eq!(code, 403);
            assert_eq!(status, "PERMISSION_DENIED");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_blocked_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"promptFeedback": {"blockReason": "SAFETY"}})),
        )
        .mount(&server)
        .await;

    let result = client(&server).generate(&[], "something").await;
    assert!(matches!(result, Err(LlmError::Blocked(reason)) if reason == "SAFETY"));
}

#[tokio::test]
async fn test_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = client(&server).generate(&[], "hi").await;
    assert!(matches!(result, Err(LlmError::Malformed(_))));
}

#[tokio::test]
async fn test_failed_turn_recorded_in_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let backend = client(&server);
    let mut session = ChatSession::new(SessionId(7), Scope::open());
    let outcome = run_turn(&backend, &mut session, "hello").await.unwrap();

    assert!(!outcome.ok);
    assert!(outcome.answer.starts_with("Error: "));
    assert_eq!(session.turns, 0);
    assert!(session.model_history().is_empty());
    assert_eq!(session.transcript.len(), 2);
}

#[tokio::test]
async fn test_unreachable_server() {
    let backend = GeminiClient::new(
        "http://127.0.0.1:9/v1beta",
        MODEL,
        "test-key",
        Duration::from_millis(500),
    )
    .unwrap();
    let result = backend.generate(&[], "hi").await;
    assert!(matches!(result, Err(LlmError::Http(_))));
}
