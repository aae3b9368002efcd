//! Per-file view state.
//!
//! A `FileView` holds the two client-tunable parameters — segment duration
//! and active channel subset — plus the monotonically increasing version
//! that ties every decoded chunk to the parameters it was produced under.
//! The version is the sole invalidation mechanism: it is part of the cache
//! key, so bumping it makes every previously cached chunk unreachable.

use std::sync::Arc;

use mefserve_core::{ChannelInfo, RecordingMetadata};

use crate::error::{EngineError, EngineResult};

/// Mutable view over one open recording.
pub struct FileView {
    metadata: Arc<RecordingMetadata>,
    /// Segment duration in microseconds; `None` means the whole recording
    /// is one segment.
    segment_us: Option<i64>,
    /// Active channels with their rates resolved at mutation time; empty
    /// means all channels in recording order.
    active: Vec<ChannelInfo>,
    version: u64,
}

impl FileView {
    pub fn new(metadata: Arc<RecordingMetadata>) -> Self {
        Self {
            metadata,
            segment_us: None,
            active: Vec::new(),
            version: 0,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Set the segment duration.
    ///
    /// Returns `(new_version, new_segment_count)`. Rejects non-positive,
    /// non-finite, and sub-microsecond durations; the view is unchanged on
    /// error.
    pub fn set_segment_seconds(&mut self, seconds: f64) -> EngineResult<(u64, u64)> {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "segment size must be a positive number of seconds, got {seconds}"
            )));
        }
        let segment_us = (seconds * 1_000_000.0).round() as i64;
        if segment_us == 0 {
            return Err(EngineError::InvalidArgument(format!(
                "segment size {seconds}s rounds to zero microseconds"
            )));
        }
        self.segment_us = Some(segment_us);
        self.version += 1;
        Ok((self.version, self.segment_count()))
    }

    /// Replace the active channel set.
    ///
    /// Order is preserved; an empty list resets to "all channels in
    /// recording order". Unknown names and duplicates are rejected with
    /// the view unchanged.
    pub fn set_active_channels(&mut self, names: Vec<String>) -> EngineResult<u64> {
        let mut resolved = Vec::with_capacity(names.len());
        for name in &names {
            let rate = self
                .metadata
                .sample_rate_of(name)
                .ok_or_else(|| EngineError::InvalidChannel(name.clone()))?;
            if resolved.iter().any(|c: &ChannelInfo| &c.name == name) {
                return Err(EngineError::InvalidArgument(format!(
                    "duplicate channel name: {name}"
                )));
            }
            resolved.push(ChannelInfo {
                name: name.clone(),
                sample_rate_hz: rate,
            });
        }
        self.active = resolved;
        self.version += 1;
        Ok(self.version)
    }

    pub fn segment_count(&self) -> u64 {
        match self.segment_us {
            None => 1,
            Some(su) => {
                let duration = self.metadata.duration_us();
                ((duration + su - 1) / su).max(0) as u64
            }
        }
    }

    /// Immutable copy of everything a decode needs, taken under the view
    /// lock and then used without it.
    pub fn snapshot(&self) -> ViewSnapshot {
        let channels: &[ChannelInfo] = if self.active.is_empty() {
            &self.metadata.channels
        } else {
            &self.active
        };
        ViewSnapshot {
            version: self.version,
            segment_count: self.segment_count(),
            segment_us: self.segment_us,
            duration_us: self.metadata.duration_us(),
            channel_names: channels.iter().map(|c| c.name.clone()).collect(),
            sample_rates: channels.iter().map(|c| c.sample_rate_hz).collect(),
        }
    }
}

/// Frozen view parameters under which a set of chunks is decoded.
///
/// Prefetch factories carry a snapshot rather than re-reading the view, so
/// a mutation racing with prefetch cannot mix parameters from two
/// versions.
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    pub version: u64,
    pub segment_count: u64,
    pub segment_us: Option<i64>,
    pub duration_us: i64,
    pub channel_names: Vec<String>,
    pub sample_rates: Vec<f64>,
}

impl ViewSnapshot {
    /// Time range of segment `index`, microseconds relative to recording
    /// start. The final segment may be short.
    pub fn segment_range(&self, index: u64) -> EngineResult<(i64, i64)> {
        if index >= self.segment_count {
            return Err(EngineError::OutOfRange {
                index,
                count: self.segment_count,
            });
        }
        match self.segment_us {
            None => Ok((0, self.duration_us)),
            Some(su) => {
                let t0 = index as i64 * su;
                let t1 = ((index as i64 + 1) * su).min(self.duration_us);
                Ok((t0, t1))
            }
        }
    }
}
