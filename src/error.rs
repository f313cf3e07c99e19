//! Error Types
//!
//! One error enum shared by the codec, parser, stores and session.

use thiserror::Error;

/// Result alias for embdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while ingesting, storing or querying embeddings
#[derive(Debug, Error)]
pub enum Error {
    /// Encoded vector length is not a multiple of 8 bytes
    #[error("malformed vector encoding: {len} bytes is not a multiple of 8")]
    MalformedEncoding { len: usize },

    /// First line of a vector file could not be parsed
    #[error("malformed header at line {line}: {reason}")]
    MalformedHeader { line: usize, reason: String },

    /// A record carries a different number of components than declared
    #[error(
        "embedding size mismatch at line {line} (word {word:?}): expected {expected}, got {actual}"
    )]
    DimensionMismatch {
        line: usize,
        word: String,
        expected: usize,
        actual: usize,
    },

    /// A vector component is not a valid float
    #[error("invalid float {token:?} at line {line} (word {word:?})")]
    InvalidFloat {
        line: usize,
        word: String,
        token: String,
    },

    /// Requested word has no stored vector
    #[error("no embedding found for word {word:?}")]
    NoEmbeddingFound { word: String },

    /// Aggregation over zero words
    #[error("cannot aggregate an empty word list")]
    EmptyInput,

    /// Zero-magnitude query vector in a similarity computation
    #[error("cosine similarity is undefined for a zero-magnitude vector")]
    DegenerateVector,

    /// Two vectors that must share a length do not
    #[error("vector length mismatch: expected {expected}, got {actual}")]
    VectorLength { expected: usize, actual: usize },

    /// Word already present in the store
    #[error("duplicate word {word:?}")]
    DuplicateWord { word: String },

    /// Store already holds data and cannot be built again
    #[error("store has already been built")]
    AlreadyBuilt,

    /// Store has not been built yet
    #[error("store has not been built")]
    NotBuilt,

    /// On-disk store failed validation
    #[error("corrupt store: {reason}")]
    CorruptStore { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the recoverable "word is absent" signal
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NoEmbeddingFound { .. })
    }

    /// True for errors that abort an ingestion run
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedHeader { .. }
                | Error::DimensionMismatch { .. }
                | Error::InvalidFloat { .. }
        )
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Error::CorruptStore {
            reason: reason.into(),
        }
    }
}
