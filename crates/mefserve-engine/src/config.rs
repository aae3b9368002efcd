//! Engine configuration.
//!
//! An immutable record fixed at construction. The server crate builds it
//! from the process-wide `Config`; tests build it inline.

/// Tuning knobs for the cache and prefetch pool.
///
/// Cache capacity is derived, not configured directly: operators size the
/// cache relative to how far ahead the server reads.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How many segments to decode ahead of each access. 0 disables
    /// prefetch entirely.
    pub n_prefetch: usize,

    /// Cache capacity = `n_prefetch * cache_capacity_multiplier`, floor 1.
    pub cache_capacity_multiplier: usize,

    /// Prefetch worker pool size.
    pub max_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            n_prefetch: 3,
            cache_capacity_multiplier: 5,
            max_workers: 4,
        }
    }
}

impl EngineConfig {
    /// Completed-entry capacity of the chunk cache.
    pub fn cache_capacity(&self) -> usize {
        (self.n_prefetch * self.cache_capacity_multiplier).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capacity() {
        assert_eq!(EngineConfig::default().cache_capacity(), 15);
    }

    #[test]
    fn capacity_has_floor_of_one() {
        let config = EngineConfig {
            n_prefetch: 0,
            cache_capacity_multiplier: 5,
            max_workers: 1,
        };
        assert_eq!(config.cache_capacity(), 1);
    }
}
