//! Deterministic synthetic decoder backend.
//!
//! Fabricates ramp signals instead of reading a container: sample `k` of
//! channel `c` (counting from recording start) has value `c * 1e6 + k`.
//! That makes row contents checkable after channel reordering and segment
//! arithmetic, which is exactly what the engine tests need.
//!
//! The backend also counts `open`/`read`/`close` calls with atomics and can
//! simulate slow reads, so tests can assert single-flight decoding and
//! prefetch cancellation without instrumenting the engine itself.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use mefserve_core::{ChannelInfo, RecordingMetadata, SignalMatrix};

use crate::adapter::{RecordingHandle, SignalDecoder};
use crate::error::{DecoderError, DecoderResult};

/// Shape of one fabricated recording.
#[derive(Debug, Clone)]
pub struct SyntheticRecording {
    pub channels: Vec<ChannelInfo>,
    pub start_us: i64,
    pub end_us: i64,
}

impl SyntheticRecording {
    /// `n_channels` channels named `chan_001`.. at a common rate, starting
    /// at t=0.
    pub fn uniform(n_channels: usize, sample_rate_hz: f64, duration_s: f64) -> Self {
        let channels = (0..n_channels)
            .map(|i| ChannelInfo {
                name: format!("chan_{:03}", i + 1),
                sample_rate_hz,
            })
            .collect();
        Self {
            channels,
            start_us: 0,
            end_us: (duration_s * 1_000_000.0).round() as i64,
        }
    }

    fn metadata(&self) -> RecordingMetadata {
        RecordingMetadata {
            channels: self.channels.clone(),
            start_us: self.start_us,
            end_us: self.end_us,
        }
    }
}

#[derive(Default)]
struct CallCounters {
    opens: AtomicUsize,
    reads: AtomicUsize,
    closes: AtomicUsize,
}

/// In-memory decoder backend with registered recordings.
///
/// Paths registered with [`register`](Self::register) open as the given
/// recording; paths registered with [`register_corrupt`](Self::register_corrupt)
/// fail classification as corrupt; anything else is not found, unless a
/// default recording is installed (the dev server does this so arbitrary
/// paths open).
pub struct SyntheticDecoder {
    recordings: std::sync::Mutex<HashMap<PathBuf, SyntheticRecording>>,
    corrupt: std::sync::Mutex<Vec<PathBuf>>,
    default_recording: Option<SyntheticRecording>,
    read_delay: Option<Duration>,
    counters: Arc<CallCounters>,
}

impl SyntheticDecoder {
    pub fn new() -> Self {
        Self {
            recordings: std::sync::Mutex::new(HashMap::new()),
            corrupt: std::sync::Mutex::new(Vec::new()),
            default_recording: None,
            read_delay: None,
            counters: Arc::new(CallCounters::default()),
        }
    }

    /// Serve `recording` for any path that is not explicitly registered.
    pub fn with_default_recording(mut self, recording: SyntheticRecording) -> Self {
        self.default_recording = Some(recording);
        self
    }

    /// Sleep this long inside every read. Lets tests race prefetch against
    /// close and mutation.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn register<P: AsRef<Path>>(&self, path: P, recording: SyntheticRecording) {
        self.recordings
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf(), recording);
    }

    pub fn register_corrupt<P: AsRef<Path>>(&self, path: P) {
        self.corrupt.lock().unwrap().push(path.as_ref().to_path_buf());
    }

    pub fn open_count(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    /// Total reads across all handles opened by this decoder.
    pub fn read_count(&self) -> usize {
        self.counters.reads.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalDecoder for SyntheticDecoder {
    async fn open(
        &self,
        path: &Path,
    ) -> DecoderResult<(RecordingMetadata, Box<dyn RecordingHandle>)> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);

        if self.corrupt.lock().unwrap().iter().any(|p| p == path) {
            return Err(DecoderError::Corrupt(format!(
                "invalid section CRC in {}",
                path.display()
            )));
        }

        let recording = {
            let recordings = self.recordings.lock().unwrap();
            recordings
                .get(path)
                .cloned()
                .or_else(|| self.default_recording.clone())
        }
        .ok_or_else(|| DecoderError::NotFound(path.display().to_string()))?;

        let metadata = recording.metadata();
        tracing::debug!(path = %path.display(), channels = metadata.channels.len(), "synthetic open");

        let handle = SyntheticHandle {
            recording,
            read_delay: self.read_delay,
            counters: Arc::clone(&self.counters),
        };
        Ok((metadata, Box::new(handle)))
    }
}

struct SyntheticHandle {
    recording: SyntheticRecording,
    read_delay: Option<Duration>,
    counters: Arc<CallCounters>,
}

#[async_trait]
impl RecordingHandle for SyntheticHandle {
    async fn read(
        &self,
        channels: &[String],
        t0_us: i64,
        t1_us: i64,
    ) -> DecoderResult<SignalMatrix> {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }

        if t1_us < t0_us {
            return Err(DecoderError::Unsupported(format!(
                "inverted time range [{t0_us}, {t1_us})"
            )));
        }

        let mut rows = Vec::with_capacity(channels.len());
        for name in channels {
            let (index, info) = self
                .recording
                .channels
                .iter()
                .enumerate()
                .find(|(_, c)| &c.name == name)
                .ok_or_else(|| DecoderError::Unsupported(format!("unknown channel {name}")))?;

            rows.push(ramp_row(
                index,
                info.sample_rate_hz,
                self.recording.start_us,
                t0_us,
                t1_us,
            ));
        }

        // All-identical rates make these rectangular; mixed-rate recordings
        // are read per-channel by the caller.
        let max_cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(max_cols, f64::NAN);
        }

        Ok(SignalMatrix::from_rows(rows))
    }

    async fn close(&self) -> DecoderResult<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Samples of one channel over `[t0_us, t1_us)`.
///
/// Sample `k` counts from recording start, so the value at a given instant
/// does not depend on segment boundaries.
fn ramp_row(channel_index: usize, rate_hz: f64, start_us: i64, t0_us: i64, t1_us: i64) -> Vec<f64> {
    let first = (((t0_us - start_us) as f64) * rate_hz / 1_000_000.0).round() as i64;
    let count = (((t1_us - t0_us) as f64) * rate_hz / 1_000_000.0).round() as i64;
    let base = channel_index as f64 * 1_000_000.0;
    (first..first + count).map(|k| base + k as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder_with(path: &str, rec: SyntheticRecording) -> SyntheticDecoder {
        let d = SyntheticDecoder::new();
        d.register(path, rec);
        d
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let d = SyntheticDecoder::new();
        let err = d.open(Path::new("/missing.mefd")).await.unwrap_err();
        assert!(matches!(err, DecoderError::NotFound(_)));
        assert_eq!(d.open_count(), 1);
    }

    #[tokio::test]
    async fn corrupt_registration_wins() {
        let d = SyntheticDecoder::new();
        d.register("/bad.mefd", SyntheticRecording::uniform(1, 100.0, 1.0));
        d.register_corrupt("/bad.mefd");
        let err = d.open(Path::new("/bad.mefd")).await.unwrap_err();
        assert!(matches!(err, DecoderError::Corrupt(_)));
    }

    #[tokio::test]
    async fn default_recording_opens_any_path() {
        let d = SyntheticDecoder::new()
            .with_default_recording(SyntheticRecording::uniform(2, 100.0, 1.0));
        let (meta, _handle) = d.open(Path::new("/whatever.mefd")).await.unwrap();
        assert_eq!(meta.channels.len(), 2);
    }

    #[tokio::test]
    async fn ramp_values_are_deterministic() {
        let d = decoder_with("/r.mefd", SyntheticRecording::uniform(2, 1000.0, 10.0));
        let (_, handle) = d.open(Path::new("/r.mefd")).await.unwrap();

        // Second second of the recording: samples 1000..2000.
        let m = handle
            .read(&["chan_002".into(), "chan_001".into()], 1_000_000, 2_000_000)
            .await
            .unwrap();
        assert_eq!(m.shape(), (2, 1000));
        // Rows ordered as requested: chan_002 first (channel index 1).
        assert_eq!(m.row(0)[0], 1_001_000.0);
        assert_eq!(m.row(1)[0], 1000.0);
        assert_eq!(m.row(1)[999], 1999.0);
        assert_eq!(d.read_count(), 1);
    }

    #[tokio::test]
    async fn nonzero_recording_start_shifts_sample_index() {
        let d = decoder_with(
            "/s.mefd",
            SyntheticRecording {
                channels: vec![ChannelInfo {
                    name: "A".into(),
                    sample_rate_hz: 100.0,
                }],
                start_us: 5_000_000,
                end_us: 15_000_000,
            },
        );
        let (_, handle) = d.open(Path::new("/s.mefd")).await.unwrap();
        let m = handle.read(&["A".into()], 5_000_000, 6_000_000).await.unwrap();
        // First sample of the recording regardless of absolute start time.
        assert_eq!(m.row(0)[0], 0.0);
    }

    #[tokio::test]
    async fn unknown_channel_is_unsupported() {
        let d = decoder_with("/r.mefd", SyntheticRecording::uniform(1, 100.0, 1.0));
        let (_, handle) = d.open(Path::new("/r.mefd")).await.unwrap();
        let err = handle
            .read(&["nope".into()], 0, 1_000_000)
            .await
            .unwrap_err();
        assert!(matches!(err, DecoderError::Unsupported(_)));
    }

    #[tokio::test]
    async fn close_is_counted() {
        let d = decoder_with("/r.mefd", SyntheticRecording::uniform(1, 100.0, 1.0));
        let (_, handle) = d.open(Path::new("/r.mefd")).await.unwrap();
        handle.close().await.unwrap();
        handle.close().await.unwrap();
        assert_eq!(d.close_count(), 2);
    }
}
