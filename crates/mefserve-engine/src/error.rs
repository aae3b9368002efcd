//! Engine error taxonomy.
//!
//! Everything the façade can surface to the RPC layer. Variants are
//! cloneable because a single decode failure fans out to every task
//! waiting on the same cache promise.

use thiserror::Error;

use mefserve_decoder::DecoderError;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// Operation on a path that is not currently open.
    #[error("file not open: {0}")]
    NotOpen(String),

    /// Segment index outside `[0, segment_count)`.
    #[error("segment index {index} out of range (file has {count} segments)")]
    OutOfRange { index: u64, count: u64 },

    /// Channel name not present in the recording.
    #[error("unknown channel: {0}")]
    InvalidChannel(String),

    /// Malformed request parameter; the view is left unchanged.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The awaited decode was superseded by a view change or file close.
    /// Retryable: the next request re-resolves the view and decodes fresh.
    #[error("request superseded by view change or file close")]
    Invalidated,

    /// Classified decoder failure.
    #[error(transparent)]
    Decoder(#[from] DecoderError),
}
