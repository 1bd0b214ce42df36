//! Driving one chat turn through a model backend.

use crate::error::AppResult;
use crate::llm::ChatBackend;
use docent_core::ChatSession;
use serde::Serialize;
use tracing::{info, warn};

/// What came back from a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    /// The answer shown to the user; `Error: ...` when the model failed.
    pub answer: String,
    /// False when the backend failed.
    pub ok: bool,
    /// Completed turns in the session after this one.
    pub turn: u32,
}

/// Ask `question` in `session` and record the result.
///
/// Only invalid questions are returned as errors. A backend failure is
/// recorded in the transcript and reported with `ok: false`, so the caller
/// can show it like any other reply.
pub async fn run_turn<B: ChatBackend>(
    backend: &B,
    session: &mut ChatSession,
    question: &str,
) -> AppResult<TurnOutcome> {
    let pending = session.begin_turn(question)?;

    match backend.generate(session.model_history(), &pending.prompt).await {
        Ok(answer) => {
            session.complete_turn(pending, answer.clone());
            info!(session = %session.id, turn = session.turns, "answered");
            Ok(TurnOutcome {
                answer,
                ok: true,
                turn: session.turns,
            })
        }
        Err(e) => {
            warn!(session = %session.id, error = %e, "model call failed");
            let answer = format!("Error: {}", e);
            session.fail_turn(pending, &e);
            Ok(TurnOutcome {
                answer,
                ok: false,
                turn: session.turns,
            })
        }
    }
}
