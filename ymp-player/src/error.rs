//! Error types for ymp-player
//!
//! Defines the playback error taxonomy using thiserror. Every variant carries a
//! structured payload so callers can match exhaustively on the failure kind.

use crate::catalog::CatalogError;
use std::fmt;
use thiserror::Error;

/// Transport-level failure while fetching a stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// The server answered with a non-success status
    #[error("HTTP error: {code} {reason}")]
    Status { code: u16, reason: String },

    /// The request could not be completed (DNS, connect, TLS, ...)
    #[error("connection failed: {0}")]
    Connection(String),
}

impl NetworkError {
    /// Status code carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            Self::Connection(_) => None,
        }
    }
}

/// Failures collected while releasing a playback session
///
/// Both release steps always run; each records its own failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseFailures {
    /// Failure closing the render handle
    pub render: Option<String>,
    /// Failure closing the decoder and its network stream
    pub stream: Option<String>,
}

impl ReleaseFailures {
    pub fn is_empty(&self) -> bool {
        self.render.is_none() && self.stream.is_none()
    }
}

impl fmt::Display for ReleaseFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = self.render.as_deref().unwrap_or("none");
        let stream = self.stream.as_deref().unwrap_or("none");
        write!(f, "render_err={}, stream_err={}", render, stream)
    }
}

/// Main error type for ymp-player
#[derive(Error, Debug)]
pub enum Error {
    /// Transport fetch failed or returned a non-success status
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Stream could not be parsed as audio
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Operation requires an open stream
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Releasing the render handle or the stream failed
    #[error("Error during stop: {0}")]
    ResourceRelease(ReleaseFailures),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Catalog API errors
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Track navigation errors (index out of range, no more tracks)
    #[error("{0}")]
    Navigation(String),

    /// Release check failures
    #[error("Update check failed: {0}")]
    Update(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors from the shared ymp-common crate
    #[error(transparent)]
    Common(#[from] ymp_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors (background task failures)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using ymp-player Error
pub type Result<T> = std::result::Result<T, Error>;
