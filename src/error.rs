//! Error types for the midstac front end.

use midstac_search::SearchError;

/// Top-level error type for configuration, presentation and search.
#[derive(Debug, thiserror::Error)]
pub enum MidstacError {
    /// Configuration file could not be parsed or is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Extraction or dispatch error.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Output could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, MidstacError>;
