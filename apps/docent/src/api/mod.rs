//! # HTTP API
//!
//! axum server exposing chat sessions over JSON.
//!
//! ```text
//! GET    /health                      liveness (no auth)
//! POST   /sessions                    create a session
//! GET    /sessions                    list stored sessions
//! GET    /sessions/{id}               transcript and document info
//! DELETE /sessions/{id}               delete a session
//! POST   /sessions/{id}/document      attach a document (base64 body)
//! POST   /sessions/{id}/messages      ask a question
//! ```
//!
//! Live sessions sit in an LRU cache, each behind its own async mutex, so a
//! slow model call only blocks requests to the same session. Every mutation
//! is written through to the redb store before the response is sent, which
//! makes eviction from the cache a plain drop. A session evicted while a
//! request still holds it keeps its single handle (see [`live`]).

pub mod guard;
mod handlers;
mod live;
pub mod types;

use crate::error::{AppError, AppResult};
use crate::llm::ChatBackend;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use docent_core::{ChatSession, Scope, SessionId, SessionStore};
use guard::Guard;
use live::{LiveSession, LiveSessions, SessionHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Largest accepted request body (base64 inflates documents by a third).
pub const MAX_BODY_BYTES: usize = 48 * 1024 * 1024;

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bearer token required on every route but `/health`.
    pub api_key: Option<String>,
    /// Global request budget per second.
    pub requests_per_second: Option<u32>,
    /// Live sessions kept in memory.
    pub cache_capacity: usize,
    /// Scope given to new sessions.
    pub scope: Scope,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            requests_per_second: None,
            cache_capacity: docent_core::cache::DEFAULT_CAPACITY,
            scope: Scope::default(),
        }
    }
}

/// Shared server state.
pub struct AppState<B> {
    backend: B,
    store: SessionStore,
    sessions: Mutex<LiveSessions>,
    scope: Scope,
}

impl<B: ChatBackend> AppState<B> {
    /// Build state around a backend and an opened store.
    pub fn new(backend: B, store: SessionStore, config: &ServerConfig) -> Self {
        Self {
            backend,
            store,
            sessions: Mutex::new(LiveSessions::new(config.cache_capacity)),
            scope: config.scope.clone(),
        }
    }

    /// Fetch a live session, loading it from the store on a cache miss.
    async fn session(&self, id: SessionId) -> AppResult<SessionHandle> {
        let mut live = self.sessions.lock().await;
        if let Some(handle) = live.get(id) {
            return Ok(handle);
        }

        let session = self
            .store
            .load(id)?
            .ok_or_else(|| not_found(id))?;
        let handle = Arc::new(Mutex::new(LiveSession::new(session)));
        live.insert(id, Arc::clone(&handle));
        Ok(handle)
    }

    async fn create_session(&self, title: Option<String>) -> AppResult<SessionId> {
        let mut session = ChatSession::new(self.store.next_id()?, self.scope.clone());
        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
            session = session.titled(title.trim());
        }
        self.store.save(&session)?;

        let id = session.id;
        let handle = Arc::new(Mutex::new(LiveSession::new(session)));
        self.sessions.lock().await.insert(id, handle);
        Ok(id)
    }

    /// Delete a session once any request holding it has finished.
    ///
    /// The tombstone is set under the session lock, so requests that were
    /// waiting on the same handle see it and answer 404 without saving.
    async fn delete_session(&self, id: SessionId) -> AppResult<()> {
        let handle = self.session(id).await?;
        {
            let mut live = handle.lock().await;
            if live.deleted {
                return Err(not_found(id));
            }
            live.deleted = true;
            self.store.delete(id)?;
        }
        self.sessions.lock().await.forget(id);
        Ok(())
    }
}

fn not_found(id: SessionId) -> AppError {
    AppError::NotFound(format!("session {}", id))
}

/// Build the router.
pub fn router<B: ChatBackend + 'static>(state: Arc<AppState<B>>, guard: Arc<Guard>) -> Router {
    let protected = Router::new()
        .route(
            "/sessions",
            post(handlers::create_session::<B>).get(handlers::list_sessions::<B>),
        )
        .route(
            "/sessions/{id}",
            get(handlers::get_session::<B>).delete(handlers::delete_session::<B>),
        )
        .route("/sessions/{id}/document", post(handlers::upload_document::<B>))
        .route("/sessions/{id}/messages", post(handlers::ask::<B>))
        .route_layer(axum::middleware::from_fn_with_state(
            guard,
            guard::guard_requests,
        ))
        .with_state(state);

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
}

/// Run the server until Ctrl-C.
pub async fn serve<B: ChatBackend + 'static>(
    addr: SocketAddr,
    backend: B,
    store: SessionStore,
    config: ServerConfig,
) -> AppResult<()> {
    let guard = Arc::new(Guard::new(
        config.api_key.clone(),
        config.requests_per_second,
    ));
    let state = Arc::new(AppState::new(backend, store, &config));
    let app = router(state, guard);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "docent API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until the process is killed.
        std::future::pending::<()>().await;
    }
}
