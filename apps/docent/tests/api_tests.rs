//! Integration tests for the HTTP API.
//!
//! Drives the full router (guard, handlers, live cache, redb store) through
//! axum-test with scripted and gated model backends.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use docent::api::guard::Guard;
use docent::api::types::{
    AskResponse, CreateSessionResponse, ErrorResponse, HealthResponse, SessionListEntry,
    SessionView, UploadDocumentResponse,
};
use docent::api::{AppState, ServerConfig, router};
use docent::llm::{ChatBackend, LlmError, ScriptedBackend};
use docent_core::{Message, Scope, SessionStore};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

// =============================================================================
// HELPERS
// =============================================================================

const KEY: &str = "test-server-key";

struct Harness {
    _dir: TempDir,
    server: TestServer,
}

fn harness_with<B: ChatBackend + 'static>(backend: B, config: ServerConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(&dir.path().join("api.redb")).unwrap();
    let guard = Arc::new(Guard::new(
        config.api_key.clone(),
        config.requests_per_second,
    ));
    let state = Arc::new(AppState::new(backend, store, &config));
    let server = TestServer::new(router(state, guard)).unwrap();
    Harness { _dir: dir, server }
}

fn harness(backend: ScriptedBackend) -> Harness {
    harness_with(backend, ServerConfig::default())
}

async fn create(server: &TestServer) -> String {
    let response = server.post("/sessions").json(&json!({})).await;
    response.assert_status(StatusCode::CREATED);
    response.json::<CreateSessionResponse>().id
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

/// Backend whose first call waits until `release` is notified.
#[derive(Clone, Default)]
struct GatedBackend {
    entered: Arc<Notify>,
    release: Arc<Notify>,
    calls: Arc<AtomicUsize>,
}

impl ChatBackend for GatedBackend {
    fn name(&self) -> String {
        "gated".to_string()
    }

    async fn generate(&self, _history: &[Message], _prompt: &str) -> Result<String, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(format!("answer {}", n + 1))
    }
}

async fn release_later(backend: &GatedBackend) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    backend.release.notify_one();
}

// =============================================================================
// HEALTH AND GUARD
// =============================================================================

#[tokio::test]
async fn test_health() {
    let h = harness(ScriptedBackend::echo());
    let response = h.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<HealthResponse>().status, "ok");
}

#[tokio::test]
async fn test_auth_required_except_health() {
    let config = ServerConfig {
        api_key: Some(KEY.to_string()),
        ..ServerConfig::default()
    };
    let h = harness_with(ScriptedBackend::echo(), config);

    h.server.get("/health").await.assert_status_ok();
    h.server
        .get("/sessions")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    h.server
        .get("/sessions")
        .add_header(header::AUTHORIZATION, bearer("wrong"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    h.server
        .get("/sessions")
        .add_header(header::AUTHORIZATION, bearer(KEY))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_rate_limit() {
    let config = ServerConfig {
        requests_per_second: Some(1),
        ..ServerConfig::default()
    };
    let h = harness_with(ScriptedBackend::echo(), config);

    h.server.get("/sessions").await.assert_status_ok();
    h.server
        .get("/sessions")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
    // Health is outside the guard
    h.server.get("/health").await.assert_status_ok();
}

// =============================================================================
// SESSIONS
// =============================================================================

#[tokio::test]
async fn test_create_list_get_delete() {
    let h = harness(ScriptedBackend::echo());

    let response = h
        .server
        .post("/sessions")
        .json(&json!({"title": "Regression notes"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let id = response.json::<CreateSessionResponse>().id;

    let list = h.server.get("/sessions").await.json::<Vec<SessionListEntry>>();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].title, "Regression notes");

    let view = h
        .server
        .get(&format!("/sessions/{}", id))
        .await
        .json::<SessionView>();
    assert_eq!(view.turns, 0);
    assert_eq!(view.scope, "Data Science");
    assert!(view.messages.is_empty());
    assert!(view.document.is_none());

    h.server
        .delete(&format!("/sessions/{}", id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    h.server
        .get(&format!("/sessions/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    h.server
        .delete(&format!("/sessions/{}", id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bad_and_unknown_ids() {
    let h = harness(ScriptedBackend::echo());

    h.server
        .get("/sessions/not-an-id")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    h.server
        .get("/sessions/00000000000000aa")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    h.server
        .post("/sessions/00000000000000aa/messages")
        .json(&json!({"content": "hi"}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// =============================================================================
// DOCUMENTS AND QUESTIONS
// =============================================================================

#[tokio::test]
async fn test_upload_then_ask() {
    let h = harness(ScriptedBackend::echo());
    let id = create(&h.server).await;

    let text = "Gradient descent updates parameters against the gradient of the loss.";
    let response = h
        .server
        .post(&format!("/sessions/{}/document", id))
        .json(&json!({
            "name": "optim.txt",
            "content_base64": STANDARD.encode(text),
        }))
        .await;
    response.assert_status_ok();
    let upload = response.json::<UploadDocumentResponse>();
    assert_eq!(upload.document.name, "optim.txt");
    assert_eq!(upload.document.pages, 1);
    assert_eq!(upload.preview, text);

    let response = h
        .server
        .post(&format!("/sessions/{}/messages", id))
        .json(&json!({"content": "What does gradient descent do?"}))
        .await;
    response.assert_status_ok();
    let answer = response.json::<AskResponse>();
    assert!(answer.ok);
    assert_eq!(answer.turn, 1);
    assert_eq!(answer.answer, "[echo] What does gradient descent do?");

    let view = h
        .server
        .get(&format!("/sessions/{}", id))
        .await
        .json::<SessionView>();
    assert_eq!(view.messages.len(), 2);
    assert_eq!(view.title, "What does gradient descent do?");
    assert_eq!(view.document.unwrap().name, "optim.txt");
}

#[tokio::test]
async fn test_upload_rejects_bad_content() {
    let h = harness(ScriptedBackend::echo());
    let id = create(&h.server).await;
    let url = format!("/sessions/{}/document", id);

    h.server
        .post(&url)
        .json(&json!({"name": "x.txt", "content_base64": "%%% not base64"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    h.server
        .post(&url)
        .json(&json!({"name": "blank.txt", "content_base64": STANDARD.encode("  \n ")}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    h.server
        .post(&url)
        .json(&json!({"name": "bin", "content_base64": STANDARD.encode([0xff, 0xfe, 0x00])}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_question_rejected() {
    let h = harness(ScriptedBackend::echo());
    let id = create(&h.server).await;

    h.server
        .post(&format!("/sessions/{}/messages", id))
        .json(&json!({"content": "   "}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_model_failure_is_answered_inline() {
    let backend = ScriptedBackend::echo();
    backend.push_failure("quota exhausted");
    let h = harness(backend.clone());
    let id = create(&h.server).await;
    let url = format!("/sessions/{}/messages", id);

    let failed = h
        .server
        .post(&url)
        .json(&json!({"content": "first"}))
        .await
        .json::<AskResponse>();
    assert!(!failed.ok);
    assert!(failed.answer.starts_with("Error: "));
    assert_eq!(failed.turn, 0);

    let ok = h
        .server
        .post(&url)
        .json(&json!({"content": "second"}))
        .await
        .json::<AskResponse>();
    assert!(ok.ok);
    assert_eq!(ok.turn, 1);
    // The failed exchange is not replayed to the model
    assert_eq!(backend.calls()[1].history_len, 0);
}

#[tokio::test]
async fn test_evicted_session_reloads_from_store() {
    let config = ServerConfig {
        cache_capacity: 1,
        scope: Scope::open(),
        ..ServerConfig::default()
    };
    let backend = ScriptedBackend::echo();
    let h = harness_with(backend.clone(), config);

    let first = create(&h.server).await;
    h.server
        .post(&format!("/sessions/{}/messages", first))
        .json(&json!({"content": "one"}))
        .await
        .assert_status_ok();

    // Pushes `first` out of the live cache
    let _second = create(&h.server).await;

    let answer = h
        .server
        .post(&format!("/sessions/{}/messages", first))
        .json(&json!({"content": "two"}))
        .await
        .json::<AskResponse>();
    assert_eq!(answer.turn, 2);
    assert_eq!(backend.calls()[1].history_len, 2);
}

// =============================================================================
// CONCURRENT REQUESTS
// =============================================================================

#[tokio::test]
async fn test_session_evicted_mid_turn_keeps_both_turns() {
    let config = ServerConfig {
        cache_capacity: 1,
        scope: Scope::open(),
        ..ServerConfig::default()
    };
    let backend = GatedBackend::default();
    let h = harness_with(backend.clone(), config);
    let id = create(&h.server).await;
    let url = format!("/sessions/{}/messages", id);

    let (first, second, ()) = tokio::join!(
        async { h.server.post(&url).json(&json!({"content": "one"})).await },
        async {
            backend.entered.notified().await;
            // Evicts the session while its first turn is still running
            let _other = create(&h.server).await;
            h.server.post(&url).json(&json!({"content": "two"})).await
        },
        release_later(&backend),
    );

    assert_eq!(first.json::<AskResponse>().turn, 1);
    assert_eq!(second.json::<AskResponse>().turn, 2);

    let view = h
        .server
        .get(&format!("/sessions/{}", id))
        .await
        .json::<SessionView>();
    assert_eq!(view.turns, 2);
    assert_eq!(view.messages.len(), 4);
}

#[tokio::test]
async fn test_delete_during_turn_is_not_undone() {
    let backend = GatedBackend::default();
    let h = harness_with(backend.clone(), ServerConfig::default());
    let id = create(&h.server).await;
    let session_url = format!("/sessions/{}", id);
    let ask_url = format!("{}/messages", session_url);

    let (ask, delete, ()) = tokio::join!(
        async { h.server.post(&ask_url).json(&json!({"content": "first"})).await },
        async {
            backend.entered.notified().await;
            h.server.delete(&session_url).await
        },
        release_later(&backend),
    );

    ask.assert_status_ok();
    delete.assert_status(StatusCode::NO_CONTENT);

    let list = h.server.get("/sessions").await.json::<Vec<SessionListEntry>>();
    assert!(list.is_empty());
    h.server
        .get(&session_url)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    h.server
        .post(&ask_url)
        .json(&json!({"content": "again"}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// =============================================================================
// REQUEST BODIES
// =============================================================================

#[tokio::test]
async fn test_create_without_body() {
    let h = harness(ScriptedBackend::echo());

    let response = h.server.post("/sessions").await;
    response.assert_status(StatusCode::CREATED);
    let id = response.json::<CreateSessionResponse>().id;

    let view = h
        .server
        .get(&format!("/sessions/{}", id))
        .await
        .json::<SessionView>();
    assert!(view.title.is_empty());

    let bad = h.server.post("/sessions").text("{not json").await;
    bad.assert_status(StatusCode::BAD_REQUEST);
    assert!(!bad.json::<ErrorResponse>().error.is_empty());
}

#[tokio::test]
async fn test_malformed_bodies_render_json_errors() {
    let h = harness(ScriptedBackend::echo());
    let id = create(&h.server).await;

    let missing_field = h
        .server
        .post(&format!("/sessions/{}/messages", id))
        .json(&json!({"text": "hi"}))
        .await;
    missing_field.assert_status(StatusCode::BAD_REQUEST);
    assert!(missing_field.json::<ErrorResponse>().error.contains("content"));

    let wrong_type = h
        .server
        .post(&format!("/sessions/{}/messages", id))
        .text("hello")
        .await;
    wrong_type.assert_status(StatusCode::BAD_REQUEST);
    let _: ErrorResponse = wrong_type.json();

    let upload = h
        .server
        .post(&format!("/sessions/{}/document", id))
        .json(&json!({"name": "x.txt"}))
        .await;
    upload.assert_status(StatusCode::BAD_REQUEST);
    assert!(upload.json::<ErrorResponse>().error.contains("content_base64"));
}
