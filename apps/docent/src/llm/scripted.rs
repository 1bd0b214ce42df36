//! Offline backend with canned answers.
//!
//! Answers are taken from a queue in order; once the queue is empty the
//! backend echoes the question part of the prompt. Every call is recorded so
//! callers can inspect what would have been sent to a real model.

use super::{ChatBackend, LlmError};
use docent_core::Message;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const QUERY_MARKER: &str = "User query: ";

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Messages of history passed with the call.
    pub history_len: usize,
    /// The prompt text.
    pub prompt: String,
}

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Result<String, String>>,
    calls: Vec<RecordedCall>,
}

/// Deterministic backend for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    /// A backend that only echoes.
    #[must_use]
    pub fn echo() -> Self {
        Self::default()
    }

    /// A backend that returns `replies` in order, then echoes.
    #[must_use]
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::default();
        for reply in replies {
            backend.push_reply(reply);
        }
        backend
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a successful answer.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.lock().replies.push_back(Ok(reply.into()));
    }

    /// Queue a failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.lock().replies.push_back(Err(message.into()));
    }

    /// Calls made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }
}

/// The question part of a composed prompt.
fn question_of(prompt: &str) -> &str {
    match prompt.rfind(QUERY_MARKER) {
        Some(idx) => &prompt[idx + QUERY_MARKER.len()..],
        None => prompt,
    }
}

impl ChatBackend for ScriptedBackend {
    fn name(&self) -> String {
        "scripted".to_string()
    }

    async fn generate(&self, history: &[Message], prompt: &str) -> Result<String, LlmError> {
        let next = {
            let mut script = self.lock();
            script.calls.push(RecordedCall {
                history_len: history.len(),
                prompt: prompt.to_string(),
            });
            script.replies.pop_front()
        };

        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(LlmError::Unavailable(message)),
            None => Ok(format!("[echo] {}", question_of(prompt))),
        }
    }
}
