//! mefserve gRPC server.
//!
//! Exposes the chunk cache and prefetch engine over the `MefServe` gRPC
//! API:
//! - File lifecycle: OpenFile, CloseFile, ListOpenFiles, GetFileInfo
//! - View control: SetSignalSegmentSize, SetActiveChannels,
//!   GetNumberOfSegments
//! - Data: GetSignalSegment

pub mod config;
pub mod service;

pub use config::{Config, ConfigError, DecoderBackend, LogLevel};
pub use service::MefServeService;
