//! Decoder capability traits and the per-handle read gate.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use mefserve_core::{RecordingMetadata, SignalMatrix};

use crate::error::DecoderResult;

/// Capability to open recording containers.
///
/// One instance serves the whole process; the test suite substitutes a
/// deterministic fake behind the same trait.
#[async_trait]
pub trait SignalDecoder: Send + Sync {
    /// Open `path`, returning the metadata snapshot and a read handle.
    async fn open(
        &self,
        path: &Path,
    ) -> DecoderResult<(RecordingMetadata, Box<dyn RecordingHandle>)>;
}

/// An open recording.
///
/// `t0_us` is inclusive, `t1_us` exclusive, both absolute microseconds.
/// Rows of the returned matrix are ordered exactly as `channels` was
/// passed.
#[async_trait]
pub trait RecordingHandle: Send + Sync {
    async fn read(
        &self,
        channels: &[String],
        t0_us: i64,
        t1_us: i64,
    ) -> DecoderResult<SignalMatrix>;

    /// Release backend resources. Idempotent.
    async fn close(&self) -> DecoderResult<()>;
}

impl std::fmt::Debug for dyn RecordingHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dyn RecordingHandle")
    }
}

/// An open handle plus the mutex that serializes reads through it.
///
/// The native MEF3 library is not re-entrant for concurrent reads on the
/// same handle, so every read goes through `read_gate`. Reads on different
/// files do not contend.
pub struct DecoderSession {
    handle: Box<dyn RecordingHandle>,
    read_gate: Mutex<()>,
}

impl DecoderSession {
    pub fn new(handle: Box<dyn RecordingHandle>) -> Arc<Self> {
        Arc::new(Self {
            handle,
            read_gate: Mutex::new(()),
        })
    }

    /// Read a contiguous time range, one row per requested channel.
    pub async fn read(
        &self,
        channels: &[String],
        t0_us: i64,
        t1_us: i64,
    ) -> DecoderResult<SignalMatrix> {
        let _gate = self.read_gate.lock().await;
        self.handle.read(channels, t0_us, t1_us).await
    }

    /// Close the underlying handle. Waits for any in-flight read first so
    /// the backend never sees close-during-read.
    pub async fn close(&self) -> DecoderResult<()> {
        let _gate = self.read_gate.lock().await;
        self.handle.close().await
    }
}
