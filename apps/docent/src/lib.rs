//! # Docent Library
//!
//! This library exposes the Docent modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod turn;

// Re-export docent_core for convenience
pub use docent_core;
