//! Recording metadata snapshot.
//!
//! Taken from the decoder exactly once, when a file is opened, and treated
//! as immutable for the lifetime of the open file. View mutations and chunk
//! reads all work from this snapshot; they never go back to the decoder for
//! metadata.

/// One channel of a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    /// Channel name as stored in the container (e.g. "chan_001").
    pub name: String,
    /// Sampling frequency in Hz.
    pub sample_rate_hz: f64,
}

/// Immutable description of an open recording.
///
/// `start_us` and `end_us` are absolute microsecond timestamps as reported
/// by the decoder (MEF3 stores uUTC). All segment arithmetic in the engine
/// is done relative to `start_us`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingMetadata {
    /// Channels in recording order.
    pub channels: Vec<ChannelInfo>,
    /// Recording start, absolute microseconds.
    pub start_us: i64,
    /// Recording end, absolute microseconds (exclusive).
    pub end_us: i64,
}

impl RecordingMetadata {
    /// Total recording duration in microseconds.
    pub fn duration_us(&self) -> i64 {
        self.end_us - self.start_us
    }

    /// Channel names in recording order.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    pub fn contains_channel(&self, name: &str) -> bool {
        self.channels.iter().any(|c| c.name == name)
    }

    /// Sample rate for `name`, if the channel exists.
    pub fn sample_rate_of(&self, name: &str) -> Option<f64> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.sample_rate_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> RecordingMetadata {
        RecordingMetadata {
            channels: vec![
                ChannelInfo {
                    name: "Ch1".into(),
                    sample_rate_hz: 1000.0,
                },
                ChannelInfo {
                    name: "Ch2".into(),
                    sample_rate_hz: 250.0,
                },
            ],
            start_us: 1_000_000,
            end_us: 11_000_000,
        }
    }

    #[test]
    fn duration_is_end_minus_start() {
        assert_eq!(meta().duration_us(), 10_000_000);
    }

    #[test]
    fn channel_lookup() {
        let m = meta();
        assert!(m.contains_channel("Ch2"));
        assert!(!m.contains_channel("Ch3"));
        assert_eq!(m.sample_rate_of("Ch2"), Some(250.0));
        assert_eq!(m.sample_rate_of("nope"), None);
    }

    #[test]
    fn channel_names_preserve_recording_order() {
        assert_eq!(meta().channel_names(), vec!["Ch1", "Ch2"]);
    }
}
