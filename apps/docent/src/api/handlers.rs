//! Route handlers.

use super::AppState;
use super::types::{
    AskRequest, AskResponse, CreateSessionRequest, CreateSessionResponse, DocumentInfo,
    ErrorResponse, HealthResponse, SessionListEntry, SessionView, UploadDocumentRequest,
    UploadDocumentResponse,
};
use super::live::LiveSession;
use crate::error::AppError;
use crate::llm::ChatBackend;
use crate::turn::run_turn;
use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use docent_core::{CoreError, Document, SessionId};
use std::sync::Arc;
use tracing::{error, info};

// =============================================================================
// ERRORS
// =============================================================================

/// An error rendered as `{"error": "..."}` with a matching status.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = match &err {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Core(CoreError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Usage(_) | AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Core(
                CoreError::InvalidInput(_) | CoreError::EmptyDocument(_) | CoreError::Pdf(_),
            ) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %err, "request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        AppError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: rejection.body_text(),
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// `Json` whose rejections render as `{"error": ...}`.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

fn ensure_live(live: &LiveSession, id: SessionId) -> ApiResult<()> {
    if live.deleted {
        return Err(AppError::NotFound(format!("session {}", id)).into());
    }
    Ok(())
}

fn parse_id(raw: &str) -> ApiResult<SessionId> {
    raw.parse::<SessionId>()
        .map_err(|_| ApiError::bad_request(format!("invalid session id '{}'", raw)))
}

// =============================================================================
// HANDLERS
// =============================================================================

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn create_session<B: ChatBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<CreateSessionResponse>)> {
    // The body is optional: no body means an untitled session.
    let req: CreateSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {}", e)))?
    };
    let id = state.create_session(req.title).await?;
    info!(session = %id, "session created");
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse { id: id.to_string() }),
    ))
}

pub async fn list_sessions<B: ChatBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> ApiResult<Json<Vec<SessionListEntry>>> {
    let entries = state
        .store
        .list()?
        .into_iter()
        .map(|s| SessionListEntry {
            id: s.id.to_string(),
            title: s.title,
            turns: s.turns,
            messages: s.messages,
            document: s.document_name,
        })
        .collect();
    Ok(Json(entries))
}

pub async fn get_session<B: ChatBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<SessionView>> {
    let id = parse_id(&raw_id)?;
    let handle = state.session(id).await?;
    let live = handle.lock().await;
    ensure_live(&live, id)?;
    Ok(Json(SessionView::from(&live.session)))
}

pub async fn delete_session<B: ChatBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&raw_id)?;
    state.delete_session(id).await?;
    info!(session = %id, "session deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_document<B: ChatBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(raw_id): Path<String>,
    ApiJson(req): ApiJson<UploadDocumentRequest>,
) -> ApiResult<Json<UploadDocumentResponse>> {
    let id = parse_id(&raw_id)?;
    let bytes = STANDARD
        .decode(req.content_base64.trim())
        .map_err(|e| ApiError::bad_request(format!("content_base64: {}", e)))?;
    let name = if req.name.trim().is_empty() {
        "upload".to_string()
    } else {
        req.name.trim().to_string()
    };
    let document = Document::from_bytes(name, &bytes)?;

    let handle = state.session(id).await?;
    let mut live = handle.lock().await;
    ensure_live(&live, id)?;
    let info = DocumentInfo::from(&document);
    let preview = live.session.attach(document);
    state.store.save(&live.session)?;

    info!(session = %id, document = %info.id, pages = info.pages, "document attached");
    Ok(Json(UploadDocumentResponse {
        document: info,
        preview,
    }))
}

pub async fn ask<B: ChatBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(raw_id): Path<String>,
    ApiJson(req): ApiJson<AskRequest>,
) -> ApiResult<Json<AskResponse>> {
    let id = parse_id(&raw_id)?;
    let handle = state.session(id).await?;
    let mut live = handle.lock().await;
    ensure_live(&live, id)?;

    let outcome = run_turn(&state.backend, &mut live.session, &req.content).await?;
    state.store.save(&live.session)?;

    Ok(Json(AskResponse {
        answer: outcome.answer,
        ok: outcome.ok,
        turn: outcome.turn,
    }))
}
