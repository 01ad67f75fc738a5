//! Error types for docvec

use thiserror::Error;

/// Result type alias for docvec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while transforming a document
#[derive(Error, Debug)]
pub enum Error {
    /// Input is not well-formed JSON or is not a flat array of objects
    #[error("malformed input at byte {offset}: {reason}")]
    MalformedInput { offset: u64, reason: String },

    /// A field holds a value shape the pipeline cannot handle
    #[error("unsupported shape for field `{field}`: {reason}")]
    UnsupportedShape { field: String, reason: String },

    /// Input ended inside an object, array or token
    #[error("incomplete record: input ended at byte {offset} inside {context}")]
    IncompleteRecord { offset: u64, context: &'static str },

    /// Embedding a field's content failed
    #[error("enrichment of field `{field}` failed: {reason}")]
    Enrichment { field: String, reason: String },

    /// Failed to load or run the embedding model
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The array writer was driven out of order
    #[error("invalid serializer state: {0}")]
    InvalidSerializerState(String),

    /// Invalid configuration provided
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Processing was stopped by a cancellation request
    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedShape {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
