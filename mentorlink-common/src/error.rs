//! Common error types for MentorLink

use thiserror::Error;

/// Common result type for MentorLink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the store, mutation and aggregation layers.
///
/// The HTTP layer maps these onto status codes: `Validation` -> 400,
/// `NotFound` -> 404, `Conflict` -> 409, everything else -> 500.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Document (de)serialization error (wraps serde_json::Error)
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or missing input
    #[error("{0}")]
    Validation(String),

    /// Referenced year/session/mentor/mentee/meeting absent
    #[error("{0}")]
    NotFound(String),

    /// Duplicate key / already exists
    #[error("{0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Translate a unique-constraint violation into a `Conflict`, leaving
    /// every other database failure as-is.
    pub fn conflict_on_unique(e: sqlx::Error, message: &str) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Conflict(message.to_string())
            }
            _ => Error::Database(e),
        }
    }
}
