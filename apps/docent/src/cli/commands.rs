//! Non-interactive CLI commands.

use crate::error::{AppError, AppResult};
use crate::llm::ChatBackend;
use crate::turn::run_turn;
use docent_core::prompt::validate_question;
use docent_core::{ChatSession, Document, Scope, SessionId, SessionStore};
use serde::Serialize;
use serde_json::json;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

// =============================================================================
// HELPERS
// =============================================================================

/// Open (or create) the session database.
pub fn open_store(path: &Path) -> AppResult<SessionStore> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    debug!(path = %path.display(), "opening session store");
    Ok(SessionStore::open(path)?)
}

/// Load the named session, or start a fresh one when no id is given.
///
/// A fresh session only reserves an id; nothing is written until the caller
/// saves it.
pub(crate) fn resolve_session(
    store: &SessionStore,
    scope: &Scope,
    id: Option<&str>,
) -> AppResult<ChatSession> {
    match id {
        Some(raw) => {
            let id: SessionId = raw.parse()?;
            store
                .load(id)?
                .ok_or_else(|| AppError::NotFound(format!("session {}", id)))
        }
        None => Ok(ChatSession::new(store.next_id()?, scope.clone())),
    }
}

pub(crate) fn load_document(path: &Path) -> AppResult<Document> {
    let document = Document::load(path)?;
    info!(
        document = %document.name,
        pages = document.page_count(),
        chars = document.char_count(),
        "document loaded"
    );
    Ok(document)
}

// =============================================================================
// EXTRACT
// =============================================================================

/// Print document statistics and a preview of its text.
pub fn cmd_extract(path: &Path, chars: usize, json: bool, out: &mut impl Write) -> AppResult<()> {
    let document = load_document(path)?;
    let preview = document.preview(chars);

    if json {
        let value = json!({
            "id": document.id.to_string(),
            "name": document.name,
            "kind": document.kind,
            "pages": document.page_count(),
            "chars": document.char_count(),
            "preview": preview,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
    } else {
        writeln!(out, "Document: {}", document.name)?;
        writeln!(out, "Pages:    {}", document.page_count())?;
        writeln!(out, "Chars:    {}", document.char_count())?;
        writeln!(out)?;
        writeln!(out, "{}", preview)?;
    }
    Ok(())
}

// =============================================================================
// ASK
// =============================================================================

/// Ask one question, print the answer and persist the session.
pub async fn cmd_ask<B: ChatBackend>(
    store: &SessionStore,
    backend: &B,
    scope: &Scope,
    question: &str,
    document: Option<&Path>,
    session: Option<&str>,
    json: bool,
    out: &mut impl Write,
) -> AppResult<SessionId> {
    let document = document.map(load_document).transpose()?;
    validate_question(question)?;

    let mut chat = resolve_session(store, scope, session)?;
    if let Some(doc) = document {
        chat.attach(doc);
    }

    let outcome = run_turn(backend, &mut chat, question).await?;
    store.save(&chat)?;

    if json {
        let value = json!({
            "session": chat.id.to_string(),
            "answer": outcome.answer,
            "ok": outcome.ok,
            "turn": outcome.turn,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
    } else {
        writeln!(out, "{}", outcome.answer)?;
        writeln!(out)?;
        writeln!(out, "(session {})", chat.id)?;
    }
    Ok(chat.id)
}

// =============================================================================
// BATCH
// =============================================================================

/// One answered question in a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub question: String,
    pub answer: String,
    pub ok: bool,
}

/// Report produced by `docent batch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub backend: String,
    pub scope: String,
    pub document: Option<String>,
    pub answered: usize,
    pub failed: usize,
    pub results: Vec<BatchResult>,
}

impl BatchReport {
    fn to_text(&self) -> String {
        let mut text = String::new();
        for (i, r) in self.results.iter().enumerate() {
            let n = i + 1;
            text.push_str(&format!("Q{}: {}\nA{}: {}\n\n", n, r.question, n, r.answer));
        }
        text.push_str(&format!(
            "answered: {}, failed: {}\n",
            self.answered, self.failed
        ));
        text
    }
}

fn read_questions(path: &Path, format: &str) -> AppResult<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    match format {
        "json" => Ok(serde_json::from_str::<Vec<String>>(&content)?),
        "text" => Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(String::from)
            .collect()),
        other => Err(AppError::Usage(format!(
            "unknown questions format '{}': expected json or text",
            other
        ))),
    }
}

/// Answer every question in `questions` and write a report.
///
/// Each question runs in its own throwaway session, so answers do not
/// influence each other. Nothing is persisted.
pub async fn cmd_batch<B: ChatBackend>(
    backend: &B,
    scope: &Scope,
    questions: &Path,
    format: &str,
    document: Option<&Path>,
    report_format: &str,
    output: Option<&Path>,
    out: &mut impl Write,
) -> AppResult<BatchReport> {
    if !matches!(report_format, "json" | "text") {
        return Err(AppError::Usage(format!(
            "unknown report format '{}': expected json or text",
            report_format
        )));
    }
    let questions = read_questions(questions, format)?;
    let document = document.map(load_document).transpose()?;

    let mut results = Vec::with_capacity(questions.len());
    for (i, question) in questions.iter().enumerate() {
        let mut session = ChatSession::new(SessionId(i as u64), scope.clone());
        if let Some(doc) = &document {
            session.attach(doc.clone());
        }
        let result = match run_turn(backend, &mut session, question).await {
            Ok(outcome) => BatchResult {
                question: question.clone(),
                answer: outcome.answer,
                ok: outcome.ok,
            },
            Err(e) => {
                warn!(index = i, error = %e, "skipping invalid question");
                BatchResult {
                    question: question.clone(),
                    answer: format!("Error: {}", e),
                    ok: false,
                }
            }
        };
        results.push(result);
    }

    let failed = results.iter().filter(|r| !r.ok).count();
    let report = BatchReport {
        backend: backend.name(),
        scope: scope.name.clone(),
        document: document.map(|d| d.name),
        answered: results.len() - failed,
        failed,
        results,
    };

    let rendered = if report_format == "json" {
        serde_json::to_string_pretty(&report)?
    } else {
        report.to_text()
    };

    match output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            writeln!(
                out,
                "Wrote {} results to {} ({} failed)",
                report.results.len(),
                path.display(),
                report.failed
            )?;
        }
        None => writeln!(out, "{}", rendered)?,
    }
    Ok(report)
}

// =============================================================================
// SESSIONS / SHOW / DELETE
// =============================================================================

/// List stored sessions.
pub fn cmd_sessions(store: &SessionStore, json: bool, out: &mut impl Write) -> AppResult<()> {
    let sessions = store.list()?;

    if json {
        let value: Vec<_> = sessions
            .iter()
            .map(|s| {
                json!({
                    "id": s.id.to_string(),
                    "title": s.title,
                    "turns": s.turns,
                    "messages": s.messages,
                    "document": s.document_name,
                })
            })
            .collect();
        writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
        return Ok(());
    }

    if sessions.is_empty() {
        writeln!(out, "No sessions.")?;
        return Ok(());
    }
    for s in &sessions {
        let title = if s.title.is_empty() {
            "(untitled)"
        } else {
            s.title.as_str()
        };
        let doc = s.document_name.as_deref().unwrap_or("-");
        writeln!(out, "{}  {:>3} turns  {:<20}  {}", s.id, s.turns, doc, title)?;
    }
    Ok(())
}

/// Print one stored session.
pub fn cmd_show(store: &SessionStore, id: &str, json: bool, out: &mut impl Write) -> AppResult<()> {
    let id: SessionId = id.parse()?;
    let session = store
        .load(id)?
        .ok_or_else(|| AppError::NotFound(format!("session {}", id)))?;

    if json {
        let value = json!({
            "id": session.id.to_string(),
            "title": session.title,
            "turns": session.turns,
            "scope": session.composer.scope.name,
            "document": session.document.as_ref().map(|d| d.name.clone()),
            "messages": session.transcript.messages(),
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
    } else {
        writeln!(out, "Session {}: {}", session.id, session.title)?;
        if let Some(doc) = &session.document {
            writeln!(out, "Document: {} ({} pages)", doc.name, doc.page_count())?;
        }
        writeln!(out)?;
        writeln!(out, "{}", session.transcript.to_text())?;
    }
    Ok(())
}

/// Delete one stored session.
pub fn cmd_delete(store: &SessionStore, id: &str, out: &mut impl Write) -> AppResult<()> {
    let id: SessionId = id.parse()?;
    if !store.delete(id)? {
        return Err(AppError::NotFound(format!("session {}", id)));
    }
    info!(session = %id, "session deleted");
    writeln!(out, "Deleted session {}", id)?;
    Ok(())
}
