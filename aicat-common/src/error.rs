//! Common error types for the catalog

use thiserror::Error;

/// Common result type for catalog storage and configuration
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the entity store and configuration loading
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Natural key or link already present
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid field value (e.g. exceeds column length)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
