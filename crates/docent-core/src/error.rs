//! # Error Module
//!
//! The single error type shared by every core module.

use thiserror::Error;

/// Errors produced by docent-core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Caller-supplied input was rejected (empty question, bad encoding...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A document exceeds [`MAX_DOCUMENT_BYTES`](crate::document::MAX_DOCUMENT_BYTES).
    #[error("document is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    /// The document produced no usable text.
    #[error("document '{0}' contains no text")]
    EmptyDocument(String),

    /// The PDF could not be parsed.
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Stored bytes did not match the expected format.
    #[error("format error: {0}")]
    Format(String),

    /// Encoding or decoding a stored session failed.
    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    /// The session database reported an error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Shorthand for [`CoreError::InvalidInput`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

// redb splits its errors across several types; they all collapse into
// `Storage` since callers cannot act on the distinction.
macro_rules! storage_error {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for CoreError {
                fn from(err: $ty) -> Self {
                    Self::Storage(err.to_string())
                }
            }
        )*
    };
}

storage_error!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
