//! Error types for `AgroSmart` core library.

use thiserror::Error;

/// Result type alias using `AgroSmart` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `AgroSmart` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected input (sensor report, zone settings)
    #[error("Validation error: {0}")]
    Validation(String),
}
