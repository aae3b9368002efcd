//! Decoded signal chunks and their cache keys.

use crate::file_id::FileId;

/// Dense row-major f64 matrix, one row per channel.
///
/// Stored as a single contiguous allocation so a chunk can be handed to the
/// wire layer without per-row copies.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMatrix {
    rows: usize,
    cols: usize,
    samples: Vec<f64>,
}

impl SignalMatrix {
    /// Build from `samples` laid out row-major.
    ///
    /// # Panics
    ///
    /// Panics if `samples.len() != rows * cols`; callers construct matrices
    /// from lengths they just computed, so a mismatch is a programming
    /// error, not an input error.
    pub fn new(rows: usize, cols: usize, samples: Vec<f64>) -> Self {
        assert_eq!(
            samples.len(),
            rows * cols,
            "matrix buffer length {} does not match {}x{}",
            samples.len(),
            rows,
            cols
        );
        Self { rows, cols, samples }
    }

    /// Build from per-channel rows of equal length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let n_rows = rows.len();
        let n_cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut samples = Vec::with_capacity(n_rows * n_cols);
        for row in &rows {
            assert_eq!(row.len(), n_cols, "ragged rows");
            samples.extend_from_slice(row);
        }
        Self {
            rows: n_rows,
            cols: n_cols,
            samples,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Row `r` as a sample slice.
    pub fn row(&self, r: usize) -> &[f64] {
        let start = r * self.cols;
        &self.samples[start..start + self.cols]
    }

    /// The whole buffer, row-major.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn size_bytes(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f64>()
    }
}

/// Cache key for one decoded segment.
///
/// The view `version` is part of the key, so mutating a file's view makes
/// every previously cached chunk unreachable without an explicit purge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub file_id: FileId,
    pub version: u64,
    pub segment_index: u64,
}

impl ChunkKey {
    pub fn new(file_id: FileId, version: u64, segment_index: u64) -> Self {
        Self {
            file_id,
            version,
            segment_index,
        }
    }
}

/// One decoded segment: the payload clients receive and the value the
/// chunk cache stores.
///
/// `t_start_us` / `t_end_us` are microseconds since recording start;
/// `channel_names` and `sample_rates` match the rows of `data` in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub data: SignalMatrix,
    pub channel_names: Vec<String>,
    pub sample_rates: Vec<f64>,
    pub t_start_us: i64,
    pub t_end_us: i64,
}

impl Chunk {
    pub fn shape(&self) -> (usize, usize) {
        self.data.shape()
    }

    /// Payload size estimate used for observability; eviction is
    /// count-bounded and never consults this.
    pub fn size_bytes(&self) -> usize {
        self.data.size_bytes()
    }
}
