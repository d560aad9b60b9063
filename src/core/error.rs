//! Error taxonomy of the update pipeline.

use thiserror::Error;

/// Errors raised while refreshing the currency data.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// The feed could not be retrieved from its file or network source.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The raw feed could not be normalized before parsing.
    #[error("cannot normalize feed: {0}")]
    Normalization(String),

    /// The feed violates the expected document schema.
    #[error("cannot parse feed: {0}")]
    Parse(String),

    /// A stored update timestamp is not a valid RFC 3339 date-time.
    #[error("cannot parse stored timestamp '{value}': {reason}")]
    TimeParse { value: String, reason: String },

    /// Durable storage failed to connect, read or write.
    #[error("storage error: {0}")]
    Storage(String),

    /// A buffer handed to the pipeline was empty.
    #[error("invalid data: {0}")]
    Data(String),
}

impl UpdateError {
    pub fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        UpdateError::Storage(format!("{context}: {err}"))
    }

    pub fn source(context: &str, err: impl std::fmt::Display) -> Self {
        UpdateError::SourceUnavailable(format!("{context}: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, UpdateError>;
