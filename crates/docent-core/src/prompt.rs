//! # Prompt Module
//!
//! Prompt assembly for each chat turn.
//!
//! The composer joins up to three blocks with blank lines:
//!
//! ```text
//! {scope instruction}
//!
//! {document excerpt}
//!
//! User query: {question}
//! ```
//!
//! The instruction block is left out for an open scope and the excerpt block
//! when no document is attached. With neither present the prompt is the bare
//! question.

use crate::document::{DEFAULT_EXCERPT_CHARS, Document};
use crate::error::{CoreError, Result};
use crate::scope::Scope;
use serde::{Deserialize, Serialize};

/// Longest question accepted, in characters.
pub const MAX_QUESTION_CHARS: usize = 8000;

/// Builds model prompts from a scope, an optional document and a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptComposer {
    /// Guard placed at the top of every prompt.
    pub scope: Scope,
    /// How much document text accompanies each question.
    pub excerpt_chars: usize,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(Scope::default())
    }
}

impl PromptComposer {
    /// Create a composer with the default excerpt length.
    #[must_use]
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }

    /// Override the excerpt length.
    #[must_use]
    pub fn with_excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = chars;
        self
    }

    /// Compose the prompt for one question.
    pub fn compose(&self, question: &str, document: Option<&Document>) -> Result<String> {
        let question = validate_question(question)?;

        let mut blocks = Vec::with_capacity(3);
        let instruction = self.scope.instruction();
        if !instruction.is_empty() {
            blocks.push(instruction);
        }
        if let Some(doc) = document {
            let excerpt = doc.excerpt(self.excerpt_chars);
            if !excerpt.trim().is_empty() {
                blocks.push(excerpt);
            }
        }

        if blocks.is_empty() {
            return Ok(question.to_string());
        }
        blocks.push(format!("User query: {}", question));
        Ok(blocks.join("\n\n"))
    }
}

/// Trim a question and enforce the length limits.
pub fn validate_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid("question is empty"));
    }
    let chars = trimmed.chars().count();
    if chars > MAX_QUESTION_CHARS {
        return Err(CoreError::invalid(format!(
            "question is {} characters, limit is {}",
            chars, MAX_QUESTION_CHARS
        )));
    }
    Ok(trimmed)
}

// =============================================================================
// TESTS
// =============================================================================
