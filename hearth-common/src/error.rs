//! Common error types for Hearth

use thiserror::Error;

/// Common result type for Hearth operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Hearth services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    ///
    /// Aborts a batch run before any writes [HEAT-ERRH-040]
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Computation inconsistency (negative counts, malformed window)
    ///
    /// Fails a single group's run only; prior state is left untouched
    /// [HEAT-ERRH-030]
    #[error("Inconsistent computation: {0}")]
    Inconsistent(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
