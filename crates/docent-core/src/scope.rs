//! # Scope Module
//!
//! Topical guards for the assistant.
//!
//! A scope is rendered into an instruction paragraph that opens every
//! composed prompt. It names the subject the assistant may talk about and the
//! exact sentence it should answer with when a question falls outside it.
//! The model enforces the guard; this module only phrases it.

use serde::{Deserialize, Serialize};

/// A topical guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Subject name, e.g. "Data Science". Empty for an open scope.
    pub name: String,
    /// Example topics listed after the name.
    pub description: String,
    /// Reply the model should give to out-of-scope questions.
    pub refusal: String,
}

impl Default for Scope {
    fn default() -> Self {
        Self::data_science()
    }
}

impl Scope {
    /// Create a custom scope.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        refusal: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            refusal: refusal.into(),
        }
    }

    /// The default guard: Data Science questions only.
    #[must_use]
    pub fn data_science() -> Self {
        Self::new(
            "Data Science",
            "machine learning, statistics, data analysis etc.",
            "Sorry, I can only answer questions related to Data Science.",
        )
    }

    /// No topical restriction.
    #[must_use]
    pub fn open() -> Self {
        Self::new("", "", "")
    }

    /// True when this scope places no restriction on questions.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.name.trim().is_empty()
    }

    /// The instruction paragraph placed at the top of each prompt.
    ///
    /// Empty for an open scope.
    #[must_use]
    pub fn instruction(&self) -> String {
        if self.is_open() {
            return String::new();
        }
        let mut text = format!(
            "You are a helpful assistant specialized in {name} only. \
             You must answer **only** questions related to {name} topics",
            name = self.name
        );
        if !self.description.trim().is_empty() {
            text.push_str(&format!(" (e.g., {})", self.description.trim()));
        }
        text.push('.');
        if !self.refusal.trim().is_empty() {
            text.push_str(&format!(
                " If a question is outside the scope of {}, politely respond with: '{}'",
                self.name,
                self.refusal.trim()
            ));
        }
        text
    }
}

// =============================================================================
// TESTS
// =============================================================================
