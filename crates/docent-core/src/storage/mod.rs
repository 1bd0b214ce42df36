//! # Storage Module
//!
//! Durable storage for chat sessions using redb.
//!
//! Uses redb embedded database for:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Session records are postcard-encoded behind a small header (see [`codec`]).

pub mod codec;
mod redb_store;

pub use redb_store::{SessionStore, SessionSummary};
