//! Error types for the midstac-search crate.
//!
//! Only [`SearchError`] ever reaches the caller of
//! [`handle_query`](crate::handle_query) or
//! [`Dispatcher::dispatch`](crate::Dispatcher::dispatch). Backend and merge
//! errors are contained at the backend boundary and recorded in the
//! per-backend report of the [`ResultSet`](crate::ResultSet). No credentials
//! appear in error messages.

/// The request text could not be turned into search parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// The input was empty or whitespace only.
    #[error("query text is empty")]
    EmptyInput,

    /// The input contained no letter or digit that could serve as a keyword.
    #[error("no extractable keyword in query: {0:?}")]
    NoKeywords(String),
}

/// A single catalog backend (or the geocoder) failed.
///
/// `Timeout` corresponds to a backend timeout; every other variant is a
/// backend query failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend did not answer within its time budget.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The backend rejected the credentials (HTTP 401/403).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport failure or unexpected HTTP status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The backend rejected the query parameters (HTTP 400/422).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The response body did not have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),
}

/// One raw item could not be mapped into a [`ResultRecord`](crate::ResultRecord).
///
/// The item is skipped; the rest of the backend's batch is kept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// The item is not a JSON object.
    #[error("item is not an object")]
    NotAnObject,

    /// A required field (the identifier) is absent or empty.
    #[error("item is missing required field `{0}`")]
    MissingField(&'static str),
}

/// Errors surfaced to the caller of the query pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The request was rejected before dispatch.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Invalid configuration (no backends, zero limits, bad URLs, ...).
    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias for midstac-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
