//! # Document Module
//!
//! Loading documents and extracting their text.
//!
//! A document is stored as a list of page texts. PDFs are parsed with
//! `lopdf` and extracted page by page in ascending page order; plain text
//! files become a single page. The concatenated text is what prompts are
//! grounded in.
//!
//! ## Fingerprints
//!
//! Every document gets a [`DocumentId`] derived from its extracted text, so
//! the same content uploaded twice yields the same id. The default hash is
//! FNV-1a (64-bit). With the `crypto-hash` feature the first eight bytes of
//! a BLAKE3 digest are used instead.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Largest document accepted, in bytes (32 MiB).
pub const MAX_DOCUMENT_BYTES: usize = 32 * 1024 * 1024;

/// Characters shown when a document is first loaded.
pub const DEFAULT_PREVIEW_CHARS: usize = 1000;

/// Characters of document text sent along with each prompt.
pub const DEFAULT_EXCERPT_CHARS: usize = 2000;

const PDF_MAGIC: &[u8] = b"%PDF-";

// =============================================================================
// DOCUMENT ID
// =============================================================================

/// Content fingerprint of a document's extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

impl DocumentId {
    /// Fingerprint the given text.
    #[must_use]
    pub fn of_text(text: &str) -> Self {
        Self(fingerprint(text.as_bytes()))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(not(feature = "crypto-hash"))]
fn fingerprint(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, &b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}

#[cfg(feature = "crypto-hash")]
fn fingerprint(bytes: &[u8]) -> u64 {
    let digest = blake3::hash(bytes);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// Where a document's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Extracted from a PDF.
    Pdf,
    /// Read as UTF-8 text.
    Text,
}

/// A loaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Fingerprint of [`Document::text`].
    pub id: DocumentId,
    /// Display name, usually the file name.
    pub name: String,
    /// Source format.
    pub kind: DocumentKind,
    pages: Vec<String>,
}

impl Document {
    /// Build a document from already-extracted page texts.
    ///
    /// Fails with [`CoreError::EmptyDocument`] when there are no pages or
    /// every page is blank.
    pub fn from_pages(
        name: impl Into<String>,
        kind: DocumentKind,
        pages: Vec<String>,
    ) -> Result<Self> {
        let name = name.into();
        if pages.iter().all(|p| p.trim().is_empty()) {
            return Err(CoreError::EmptyDocument(name));
        }
        let id = DocumentId::of_text(&pages.concat());
        Ok(Self {
            id,
            name,
            kind,
            pages,
        })
    }

    /// Build a single-page document from plain text.
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        Self::from_pages(name, DocumentKind::Text, vec![text.into()])
    }

    /// Parse a PDF held in memory and extract the text of every page.
    ///
    /// Pages whose text cannot be decoded contribute an empty string; the
    /// remaining pages are kept.
    pub fn from_pdf_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let name = name.into();
        check_size(bytes.len())?;

        let pdf = lopdf::Document::load_mem(bytes)?;
        let page_numbers: Vec<u32> = pdf.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return Err(CoreError::EmptyDocument(name));
        }

        let pages = page_numbers
            .iter()
            .map(|&n| pdf.extract_text(&[n]).unwrap_or_default())
            .collect();

        Self::from_pages(name, DocumentKind::Pdf, pages)
    }

    /// Build a document from raw bytes, detecting PDFs by their magic header.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let name = name.into();
        check_size(bytes.len())?;

        if bytes.starts_with(PDF_MAGIC) {
            return Self::from_pdf_bytes(name, bytes);
        }
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CoreError::invalid(format!("'{}' is not UTF-8 text: {}", name, e)))?;
        Self::from_text(name, text)
    }

    /// Load a document from disk.
    ///
    /// Files with a `.pdf` extension (any case) are always parsed as PDF;
    /// anything else is sniffed by [`Document::from_bytes`].
    pub fn load(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let len = std::fs::metadata(path)?.len();
        check_size(usize::try_from(len).unwrap_or(usize::MAX))?;
        let bytes = std::fs::read(path)?;

        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf {
            Self::from_pdf_bytes(name, &bytes)
        } else {
            Self::from_bytes(name, &bytes)
        }
    }

    /// Page texts in page order.
    #[must_use]
    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    /// Number of pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Full text: every page concatenated in order.
    #[must_use]
    pub fn text(&self) -> String {
        self.pages.concat()
    }

    /// Number of characters (Unicode scalar values) in the full text.
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.chars().count()).sum()
    }

    /// Leading text shown to the user after loading.
    #[must_use]
    pub fn preview(&self, limit: usize) -> String {
        self.leading_chars(limit)
    }

    /// Leading text sent to the model with each prompt.
    #[must_use]
    pub fn excerpt(&self, limit: usize) -> String {
        self.leading_chars(limit)
    }

    fn leading_chars(&self, limit: usize) -> String {
        let mut out = String::new();
        let mut remaining = limit;
        for page in &self.pages {
            if remaining == 0 {
                break;
            }
            let head = truncate_chars(page, remaining);
            remaining -= head.chars().count();
            out.push_str(head);
        }
        out
    }
}

/// Longest prefix of `s` holding at most `limit` characters.
#[must_use]
pub fn truncate_chars(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn check_size(len: usize) -> Result<()> {
    if len > MAX_DOCUMENT_BYTES {
        return Err(CoreError::TooLarge {
            size: len,
            limit: MAX_DOCUMENT_BYTES,
        });
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
