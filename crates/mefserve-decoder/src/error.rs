//! Decoder error classification.
//!
//! The underlying library can fail in many ways; the rest of the server
//! only distinguishes four. Everything a backend reports is funneled into
//! one of these kinds at the adapter boundary.

use thiserror::Error;

pub type DecoderResult<T> = std::result::Result<T, DecoderError>;

/// Classified decoder failure.
///
/// Variants carry strings rather than source errors so a single failure
/// can be cloned into every task waiting on the same in-flight decode.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecoderError {
    /// The container path does not exist or is not a readable recording.
    #[error("recording not found: {0}")]
    NotFound(String),

    /// The container exists but its contents are malformed.
    #[error("corrupt recording: {0}")]
    Corrupt(String),

    /// Transient read failure underneath an otherwise valid container.
    #[error("decoder I/O error: {0}")]
    Io(String),

    /// The backend cannot service the request (unknown channel, encoding
    /// the library does not implement).
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl From<std::io::Error> for DecoderError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => DecoderError::NotFound(err.to_string()),
            _ => DecoderError::Io(err.to_string()),
        }
    }
}
