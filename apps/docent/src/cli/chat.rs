//! Interactive chat loop.
//!
//! Reads one line per question. Lines starting with `/` are commands:
//!
//! | Command       | Effect                                   |
//! |---------------|------------------------------------------|
//! | `/doc PATH`   | attach a document and print its preview  |
//! | `/history`    | print the transcript so far              |
//! | `/help`       | list commands                            |
//! | `/quit`       | save and exit (also `/exit`, end of input)|

use super::commands::{load_document, resolve_session};
use crate::error::AppResult;
use crate::llm::ChatBackend;
use crate::turn::run_turn;
use docent_core::{ChatSession, Scope, SessionId, SessionStore};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

const HELP: &str = "Commands: /doc PATH, /history, /help, /quit";

fn show_document(session: &ChatSession, preview: &str, out: &mut impl Write) -> AppResult<()> {
    if let Some(doc) = &session.document {
        writeln!(
            out,
            "Loaded {} ({} pages, {} chars)",
            doc.name,
            doc.page_count(),
            doc.char_count()
        )?;
        writeln!(out, "{}", preview)?;
    }
    Ok(())
}

/// Run the chat loop until `/quit` or end of input.
pub async fn cmd_chat<B, R, W>(
    store: &SessionStore,
    backend: &B,
    scope: &Scope,
    document: Option<&Path>,
    session: Option<&str>,
    input: R,
    mut out: W,
) -> AppResult<SessionId>
where
    B: ChatBackend,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let document = document.map(load_document).transpose()?;
    let mut chat = resolve_session(store, scope, session)?;
    if let Some(doc) = document {
        let preview = chat.attach(doc);
        show_document(&chat, &preview, &mut out)?;
        store.save(&chat)?;
    }

    writeln!(out, "Session {} ({} turns). {}", chat.id, chat.turns, HELP)?;
    let mut lines = input.lines();

    loop {
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            let (name, arg) = command
                .split_once(char::is_whitespace)
                .map(|(n, a)| (n, a.trim()))
                .unwrap_or((command, ""));
            match name {
                "quit" | "exit" => break,
                "help" => writeln!(out, "{}", HELP)?,
                "history" => writeln!(out, "{}", chat.transcript.to_text())?,
                "doc" if !arg.is_empty() => match load_document(Path::new(arg)) {
                    Ok(doc) => {
                        let preview = chat.attach(doc);
                        show_document(&chat, &preview, &mut out)?;
                        store.save(&chat)?;
                    }
                    Err(e) => {
                        warn!(path = arg, error = %e, "could not load document");
                        writeln!(out, "Could not load {}: {}", arg, e)?;
                    }
                },
                _ => writeln!(out, "Unknown command. {}", HELP)?,
            }
            continue;
        }

        match run_turn(backend, &mut chat, line).await {
            Ok(outcome) => {
                writeln!(out, "{}", outcome.answer)?;
                store.save(&chat)?;
            }
            Err(e) => writeln!(out, "{}", e)?,
        }
    }

    if chat.transcript.is_empty() && chat.document.is_none() {
        writeln!(out, "Nothing to save.")?;
    } else {
        store.save(&chat)?;
        writeln!(out, "Saved session {}", chat.id)?;
    }
    Ok(chat.id)
}
