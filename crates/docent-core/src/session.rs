//! # Session Module
//!
//! The state of one conversation.
//!
//! A session keeps two transcripts:
//! - `transcript`: what the user sees (raw questions, answers, error notes)
//! - `history`: what the model sees (composed prompts and answers)
//!
//! A turn is split in two so the caller can await the model in between:
//!
//! ```text
//! begin_turn(question) ──► PendingTurn ──► model ──► complete_turn(answer)
//!                                              └───► fail_turn(error)
//! ```
//!
//! A failed turn is shown to the user but never replayed to the model.

use crate::document::{DEFAULT_PREVIEW_CHARS, Document};
use crate::error::{CoreError, Result};
use crate::message::{Message, Transcript};
use crate::prompt::PromptComposer;
use crate::scope::Scope;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Characters of the first question used as the default title.
pub const TITLE_CHARS: usize = 48;

// =============================================================================
// SESSION ID
// =============================================================================

/// Identifier of a chat session, shown as 16 hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.len() > 16 {
            return Err(CoreError::invalid(format!("bad session id '{}'", s)));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| CoreError::invalid(format!("bad session id '{}'", s)))
    }
}

// =============================================================================
// PENDING TURN
// =============================================================================

/// A question that has been recorded and is waiting for the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    /// The question as the user typed it (trimmed).
    pub question: String,
    /// The composed prompt to send to the model.
    pub prompt: String,
}

// =============================================================================
// CHAT SESSION
// =============================================================================

/// One conversation, optionally grounded in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Session identifier.
    pub id: SessionId,
    /// Short human-readable title.
    pub title: String,
    /// Prompt composition settings, including the scope guard.
    pub composer: PromptComposer,
    /// The attached document, if any.
    pub document: Option<Document>,
    /// User-facing record.
    pub transcript: Transcript,
    /// Model-facing record.
    pub history: Transcript,
    /// Number of successfully completed turns.
    pub turns: u32,
}

impl ChatSession {
    /// Create an empty session with the given scope.
    #[must_use]
    pub fn new(id: SessionId, scope: Scope) -> Self {
        Self::with_composer(id, PromptComposer::new(scope))
    }

    /// Create an empty session with explicit composer settings.
    #[must_use]
    pub fn with_composer(id: SessionId, composer: PromptComposer) -> Self {
        Self {
            id,
            title: String::new(),
            composer,
            document: None,
            transcript: Transcript::new(),
            history: Transcript::new(),
            turns: 0,
        }
    }

    /// Set the title explicitly.
    #[must_use]
    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Attach a document, replacing any previous one.
    ///
    /// Returns the preview shown to the user.
    pub fn attach(&mut self, document: Document) -> String {
        let preview = document.preview(DEFAULT_PREVIEW_CHARS);
        self.document = Some(document);
        preview
    }

    /// Detach the current document.
    pub fn detach(&mut self) -> Option<Document> {
        self.document.take()
    }

    /// Record a question and compose its prompt.
    ///
    /// On error nothing is recorded.
    pub fn begin_turn(&mut self, question: &str) -> Result<PendingTurn> {
        let prompt = self.composer.compose(question, self.document.as_ref())?;
        let question = question.trim().to_string();

        if self.title.is_empty() {
            self.title = crate::document::truncate_chars(&question, TITLE_CHARS).to_string();
        }
        self.transcript.push(Message::user(question.clone()));

        Ok(PendingTurn { question, prompt })
    }

    /// Record the model's answer to a pending turn.
    pub fn complete_turn(&mut self, pending: PendingTurn, answer: impl Into<String>) {
        let answer = answer.into();
        self.transcript.push(Message::assistant(answer.clone()));
        self.history.push(Message::user(pending.prompt));
        self.history.push(Message::assistant(answer));
        self.turns = self.turns.saturating_add(1);
    }

    /// Record that the model call for a pending turn failed.
    ///
    /// The error is shown to the user as the assistant's reply; the model
    /// history is left untouched.
    pub fn fail_turn(&mut self, _pending: PendingTurn, error: impl fmt::Display) {
        self.transcript
            .push(Message::assistant(format!("Error: {}", error)));
    }

    /// Model history to send alongside the next prompt.
    #[must_use]
    pub fn model_history(&self) -> &[Message] {
        self.history.messages()
    }
}

// =============================================================================
// TESTS
// =============================================================================
