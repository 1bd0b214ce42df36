//! # CLI
//!
//! clap command definitions and dispatch.
//!
//! Each subcommand is implemented by a `cmd_*` function in [`commands`] (or
//! [`chat`] for the interactive loop) that takes its collaborators explicitly
//! and writes to a caller-supplied sink, so tests can drive commands without
//! a terminal or a network.

pub mod chat;
pub mod commands;

pub use chat::cmd_chat;
pub use commands::{
    BatchReport, BatchResult, cmd_ask, cmd_batch, cmd_delete, cmd_extract, cmd_sessions, cmd_show,
    open_store,
};

use crate::api::{self, ServerConfig};
use crate::config::{BackendKind, Config, GlobalArgs};
use crate::error::AppResult;
use crate::llm::{ChatBackend, GeminiClient, ScriptedBackend};
use clap::{Parser, Subcommand};
use docent_core::document::DEFAULT_PREVIEW_CHARS;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Chat with a language model about your documents.
#[derive(Debug, Parser)]
#[command(name = "docent", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listen address
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
        /// Bearer token clients must send
        #[arg(long, env = "DOCENT_SERVER_KEY", hide_env_values = true)]
        server_key: Option<String>,
        /// Global request budget per second (0 disables)
        #[arg(long, default_value_t = 20)]
        rate_limit: u32,
        /// Live sessions kept in memory
        #[arg(long, default_value_t = docent_core::cache::DEFAULT_CAPACITY)]
        cache_capacity: usize,
    },

    /// Show the text extracted from a document
    Extract {
        file: PathBuf,
        /// Characters of preview to print
        #[arg(long, default_value_t = DEFAULT_PREVIEW_CHARS)]
        chars: usize,
        #[arg(long)]
        json: bool,
    },

    /// Ask a single question
    Ask {
        question: String,
        /// Document to ground the answer in
        #[arg(short, long)]
        document: Option<PathBuf>,
        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Interactive chat on stdin
    Chat {
        #[arg(short, long)]
        document: Option<PathBuf>,
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Answer a list of questions and report the results
    Batch {
        /// File holding the questions
        questions: PathBuf,
        /// Questions file format: json (array of strings) or text (one per line)
        #[arg(long, default_value = "text")]
        format: String,
        #[arg(short, long)]
        document: Option<PathBuf>,
        /// Report format: json or text
        #[arg(long, default_value = "text")]
        report: String,
        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List stored sessions
    Sessions {
        #[arg(long)]
        json: bool,
    },

    /// Print a stored session
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },

    /// Delete a stored session
    Delete { id: String },
}

/// Execute a parsed command line.
pub async fn run(cli: Cli) -> AppResult<()> {
    let config = Config::from_args(&cli.global)?;
    match config.backend {
        BackendKind::Gemini => {
            if needs_model(&cli.command) {
                let backend = GeminiClient::from_config(&config)?;
                dispatch(cli.command, &config, backend).await
            } else {
                dispatch(cli.command, &config, ScriptedBackend::echo()).await
            }
        }
        BackendKind::Echo => dispatch(cli.command, &config, ScriptedBackend::echo()).await,
    }
}

fn needs_model(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Serve { .. } | Commands::Ask { .. } | Commands::Chat { .. } | Commands::Batch { .. }
    )
}

async fn dispatch<B: ChatBackend + 'static>(
    command: Commands,
    config: &Config,
    backend: B,
) -> AppResult<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Serve {
            addr,
            server_key,
            rate_limit,
            cache_capacity,
        } => {
            drop(out);
            let store = open_store(&config.store_path)?;
            let server = ServerConfig {
                api_key: server_key,
                requests_per_second: Some(rate_limit),
                cache_capacity,
                scope: config.scope.clone(),
            };
            api::serve(addr, backend, store, server).await
        }
        Commands::Extract { file, chars, json } => cmd_extract(&file, chars, json, &mut out),
        Commands::Ask {
            question,
            document,
            session,
            json,
        } => {
            let store = open_store(&config.store_path)?;
            cmd_ask(
                &store,
                &backend,
                &config.scope,
                &question,
                document.as_deref(),
                session.as_deref(),
                json,
                &mut out,
            )
            .await
            .map(|_| ())
        }
        Commands::Chat { document, session } => {
            drop(out);
            let store = open_store(&config.store_path)?;
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            cmd_chat(
                &store,
                &backend,
                &config.scope,
                document.as_deref(),
                session.as_deref(),
                input,
                std::io::stdout(),
            )
            .await
            .map(|_| ())
        }
        Commands::Batch {
            questions,
            format,
            document,
            report,
            output,
        } => {
            cmd_batch(
                &backend,
                &config.scope,
                &questions,
                &format,
                document.as_deref(),
                &report,
                output.as_deref(),
                &mut out,
            )
            .await
            .map(|_| ())
        }
        Commands::Sessions { json } => {
            let store = open_store(&config.store_path)?;
            cmd_sessions(&store, json, &mut out)
        }
        Commands::Show { id, json } => {
            let store = open_store(&config.store_path)?;
            cmd_show(&store, &id, json, &mut out)
        }
        Commands::Delete { id } => {
            let store = open_store(&config.store_path)?;
            cmd_delete(&store, &id, &mut out)
        }
    }?;

    std::io::stdout().flush()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ask_with_globals_after_subcommand() {
        let cli = Cli::try_parse_from([
            "docent",
            "ask",
            "What is a z-score?",
            "--document",
            "notes.pdf",
            "--backend",
            "echo",
        ])
        .unwrap();
        assert_eq!(cli.global.backend, BackendKind::Echo);
        match cli.command {
            Commands::Ask {
                question, document, ..
            } => {
                assert_eq!(question, "What is a z-score?");
                assert_eq!(document, Some(PathBuf::from("notes.pdf")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn model_commands_need_model() {
        assert!(!needs_model(&Commands::Sessions { json: false }));
        assert!(needs_model(&Commands::Chat {
            document: None,
            session: None
        }));
    }
}
