//! Common error types for ymp

use thiserror::Error;

/// Common result type for ymp operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the ymp crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}
