//! # Model Backends
//!
//! Everything that turns a composed prompt into an answer sits behind
//! [`ChatBackend`]. The session logic in docent-core never talks to a model
//! directly; the CLI and the HTTP server pick a backend at startup and hand
//! it the session's model history plus the new prompt.
//!
//! - [`GeminiClient`]: the hosted Gemini `generateContent` endpoint
//! - [`ScriptedBackend`]: canned answers or an echo, for offline use and tests

mod gemini;
mod scripted;

pub use gemini::{GeminiClient, GenerationConfig};
pub use scripted::ScriptedBackend;

use docent_core::Message;
use std::future::Future;
use thiserror::Error;

/// Errors from a model backend.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The request never produced an HTTP response, or the body was unreadable.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an error payload.
    #[error("model API error {code} ({status}): {message}")]
    Api {
        code: u16,
        status: String,
        message: String,
    },

    /// The prompt was refused by the provider's safety filters.
    #[error("prompt blocked by the model provider: {0}")]
    Blocked(String),

    /// The response body did not have the expected shape.
    #[error("malformed model response: {0}")]
    Malformed(String),

    /// A successful response carried no text.
    #[error("model returned no text")]
    EmptyResponse,

    /// The backend could not be used at all.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// A model that can continue a conversation.
pub trait ChatBackend: Send + Sync {
    /// Short name used in logs and reports.
    fn name(&self) -> String;

    /// Generate the reply to `prompt`, given the prior exchange in `history`.
    ///
    /// `history` alternates user prompts and assistant answers, oldest first.
    fn generate(
        &self,
        history: &[Message],
        prompt: &str,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}
