//! Application error type.

use crate::llm::LlmError;
use docent_core::CoreError;
use thiserror::Error;

/// Errors surfaced by the CLI and the HTTP server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Session, document or prompt logic rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The model backend failed outside of a chat turn.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A requested session or file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad command-line usage (unknown format, malformed input file...).
    #[error("{0}")]
    Usage(String),

    /// Filesystem or socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for the application crate.
pub type AppResult<T> = Result<T, AppError>;
