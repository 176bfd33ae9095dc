//! Error types for hiermol-nn.

use thiserror::Error;

/// Error type for network construction and forward passes.
#[derive(Debug, Error)]
pub enum Error {
    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    /// Graph or vocabulary error from hiermol-core.
    #[error(transparent)]
    Core(#[from] hiermol_core::Error),

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// No embedding table under this name.
    #[error("unknown embedding table: {0}")]
    UnknownEmbedding(String),
}

impl Error {
    /// Whether the error comes from misconfiguration rather than from a
    /// forward pass.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig(_)
                | Error::Core(
                    hiermol_core::Error::VocabCountMismatch { .. }
                        | hiermol_core::Error::MissingVocab(_)
                        | hiermol_core::Error::InvalidVocab(_)
                )
        )
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
