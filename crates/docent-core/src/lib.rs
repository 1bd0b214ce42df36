//! # Docent Core
//!
//! The pure logic behind Docent's document-grounded chat.
//!
//! This crate owns everything that can be decided without talking to a model:
//! - Transcripts of what the user and the assistant said ([`message`])
//! - Text extraction from PDF and plain-text documents ([`document`])
//! - Topical guards prepended to each prompt ([`scope`])
//! - Prompt assembly from scope, excerpt and question ([`prompt`])
//! - The per-conversation state machine ([`session`])
//! - An LRU cache for live sessions ([`cache`])
//! - redb-backed session persistence ([`storage`])
//!
//! Nothing here performs I/O on the network and nothing here is async. The
//! application crate drives a [`session::ChatSession`] through a turn and hands
//! the composed prompt to whatever model backend it was configured with.

pub mod cache;
pub mod document;
pub mod error;
pub mod message;
pub mod prompt;
pub mod scope;
pub mod session;
pub mod storage;

pub use cache::{CacheStats, LruCache};
pub use document::{Document, DocumentId, DocumentKind};
pub use error::{CoreError, Result};
pub use message::{Message, Role, Transcript};
pub use prompt::PromptComposer;
pub use scope::Scope;
pub use session::{ChatSession, PendingTurn, SessionId};
pub use storage::{SessionStore, SessionSummary};
