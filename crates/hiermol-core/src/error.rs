//! Error types for hiermol-core.

use thiserror::Error;

/// Error type for hierarchical graph and vocabulary operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The vocabulary mapping does not have one entry per level.
    #[error("There must be as many vocabs as there are levels: expected {expected}, got {got}")]
    VocabCountMismatch { expected: usize, got: usize },

    /// A level has no vocabulary.
    #[error("Missing vocab for level: {0}")]
    MissingVocab(String),

    /// A vocabulary is present but unusable.
    #[error("Invalid vocab: {0}")]
    InvalidVocab(String),

    /// Unknown level name.
    #[error("Unknown level: {0}")]
    UnknownLevel(String),

    /// Graph structure is inconsistent.
    #[error("Invalid hierarchical graph: {0}")]
    InvalidGraph(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for hiermol-core operations.
pub type Result<T> = std::result::Result<T, Error>;
