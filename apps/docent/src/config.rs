//! # Configuration
//!
//! Runtime settings resolved from command-line flags and environment
//! variables (flags win, then environment, then defaults). clap handles the
//! precedence through its `env` attribute; this module turns the parsed
//! flags into a validated [`Config`].

use crate::error::{AppError, AppResult};
use clap::{Args, ValueEnum};
use docent_core::Scope;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Gemini model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Default Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default session database path.
pub const DEFAULT_STORE: &str = "docent.redb";

/// Which model backend answers questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Hosted Gemini model over HTTPS.
    Gemini,
    /// Offline echo of the question, for demos and smoke tests.
    Echo,
}

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Model name
    #[arg(long, env = "DOCENT_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub model: String,

    /// Base URL of the generative language API
    #[arg(long, env = "DOCENT_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub base_url: String,

    /// Model backend
    #[arg(long, value_enum, default_value_t = BackendKind::Gemini, global = true)]
    pub backend: BackendKind,

    /// Sampling temperature passed to the model
    #[arg(long, global = true)]
    pub temperature: Option<f32>,

    /// Upper bound on generated tokens per answer
    #[arg(long, global = true)]
    pub max_output_tokens: Option<u32>,

    /// HTTP timeout for model calls, in seconds
    #[arg(long, default_value_t = 60, global = true)]
    pub timeout_secs: u64,

    /// Session database
    #[arg(long, env = "DOCENT_STORE", default_value = DEFAULT_STORE, global = true)]
    pub store: PathBuf,

    /// Topic guard: `data-science`, `open`, or a path to a JSON scope file
    #[arg(long, default_value = "data-science", global = true)]
    pub scope: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub backend: BackendKind,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub timeout: Duration,
    pub store_path: PathBuf,
    pub scope: Scope,
}

impl Config {
    /// Resolve and validate the global flags.
    pub fn from_args(args: &GlobalArgs) -> AppResult<Self> {
        if args.model.trim().is_empty() {
            return Err(AppError::Config("model name is empty".into()));
        }
        if args.timeout_secs == 0 {
            return Err(AppError::Config("timeout must be at least 1 second".into()));
        }
        if let Some(t) = args.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(AppError::Config(format!(
                    "temperature {} outside 0.0..=2.0",
                    t
                )));
            }
        }

        Ok(Self {
            api_key: args.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: args.model.trim().to_string(),
            base_url: args.base_url.trim_end_matches('/').to_string(),
            backend: args.backend,
            temperature: args.temperature,
            max_output_tokens: args.max_output_tokens,
            timeout: Duration::from_secs(args.timeout_secs),
            store_path: args.store.clone(),
            scope: parse_scope(&args.scope)?,
        })
    }

    /// The API key, or a configuration error naming the variable to set.
    pub fn require_api_key(&self) -> AppResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            AppError::Config("no API key: pass --api-key or set GEMINI_API_KEY".into())
        })
    }
}

/// Resolve a `--scope` value.
pub fn parse_scope(value: &str) -> AppResult<Scope> {
    match value.trim() {
        "data-science" | "data_science" | "" => Ok(Scope::data_science()),
        "open" | "none" => Ok(Scope::open()),
        other => load_scope_file(Path::new(other)),
    }
}

fn load_scope_file(path: &Path) -> AppResult<Scope> {
    if !path.exists() {
        return Err(AppError::Config(format!(
            "unknown scope '{}': expected data-science, open, or a JSON file",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    let scope: Scope = serde_json::from_str(&content)?;
    Ok(scope)
}
