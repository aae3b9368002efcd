//! Decoder capability layer.
//!
//! Everything above this crate treats the MEF3 decoder as an opaque
//! capability with exactly three operations: open a container, read a
//! contiguous time range for a set of channels, close. The engine never
//! sees the underlying library, only the [`SignalDecoder`] and
//! [`RecordingHandle`] traits and the four-way error classification in
//! [`DecoderError`].
//!
//! Two pieces live here besides the traits:
//!
//! - [`DecoderSession`]: wraps an open handle and serializes reads through
//!   a per-file mutex. The native MEF3 library is not re-entrant for
//!   concurrent reads on one handle; the session is the single place that
//!   constraint is enforced, so cache and prefetch workers can share a
//!   handle freely.
//! - [`SyntheticDecoder`]: a deterministic in-memory backend that fabricates
//!   ramp signals and counts calls. It backs the dev server and the whole
//!   test suite; a native-library backend plugs in behind the same traits.

pub mod adapter;
pub mod error;
pub mod synthetic;

pub use adapter::{DecoderSession, RecordingHandle, SignalDecoder};
pub use error::{DecoderError, DecoderResult};
pub use synthetic::{SyntheticDecoder, SyntheticRecording};
