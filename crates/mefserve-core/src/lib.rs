//! Core types shared across the mefserve workspace.
//!
//! This crate defines the vocabulary the rest of the server speaks:
//!
//! - [`FileId`]: canonical identity of an open recording
//! - [`RecordingMetadata`] / [`ChannelInfo`]: the immutable snapshot taken
//!   from the decoder when a file is opened
//! - [`SignalMatrix`]: a dense row-major f64 matrix, one row per channel
//! - [`Chunk`]: one decoded segment, the unit of caching and of client reads
//! - [`ChunkKey`]: the (file, view version, segment index) cache key
//!
//! Nothing here does I/O; higher layers (decoder, engine, server) depend on
//! this crate and never the other way around.

pub mod chunk;
pub mod file_id;
pub mod metadata;

pub use chunk::{Chunk, ChunkKey, SignalMatrix};
pub use file_id::FileId;
pub use metadata::{ChannelInfo, RecordingMetadata};
