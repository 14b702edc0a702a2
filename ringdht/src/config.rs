//! Runtime configuration for a peer.
//!
//! Each peer receives its own `PeerConfig` at construction. There is no
//! global lookup of "which layer is the transport": the transport is a type
//! parameter and the latency bounds live here.
//!
//! # Example
//!
//! ```
//! use ringdht::{Duration, LatencyRange, PeerConfig};
//!
//! let config = PeerConfig::default()
//!     .with_latency(LatencyRange::new(Duration::from_ticks(10), Duration::from_ticks(50)))
//!     .with_address_cache_capacity(32);
//! assert_eq!(config.address_cache_capacity, 32);
//! ```

use crate::time::Duration;
use crate::traits::Random;

/// Default lower latency bound, in ticks.
pub const DEFAULT_MIN_DELAY: u64 = 10;

/// Default upper latency bound (exclusive), in ticks.
pub const DEFAULT_MAX_DELAY: u64 = 100;

/// Default number of id-to-address shortcuts a peer remembers.
pub const DEFAULT_ADDRESS_CACHE_CAPACITY: usize = 128;

/// Bounds for the delivery delay of each packet a peer sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyRange {
    pub min: Duration,
    pub max: Duration,
}

impl LatencyRange {
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Every packet takes exactly `delay`.
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            min: delay,
            max: delay,
        }
    }

    /// Draw a delay.
    ///
    /// Returns `min` when the range is one tick wide or less, otherwise a
    /// uniform value in `[min, max)`.
    pub fn sample<R: Random>(&self, random: &mut R) -> Duration {
        let min = self.min.as_ticks();
        let max = self.max.as_ticks();
        if max <= min.saturating_add(1) {
            return self.min;
        }
        Duration::from_ticks(random.gen_range(min, max))
    }
}

impl Default for LatencyRange {
    fn default() -> Self {
        Self::new(
            Duration::from_ticks(DEFAULT_MIN_DELAY),
            Duration::from_ticks(DEFAULT_MAX_DELAY),
        )
    }
}

/// Per-peer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// Delay bounds applied to every packet this peer sends.
    pub latency: LatencyRange,
    /// Maximum entries in the routing address cache. Zero disables it.
    pub address_cache_capacity: usize,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            latency: LatencyRange::default(),
            address_cache_capacity: DEFAULT_ADDRESS_CACHE_CAPACITY,
        }
    }
}

impl PeerConfig {
    pub fn with_latency(mut self, latency: LatencyRange) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_address_cache_capacity(mut self, capacity: usize) -> Self {
        self.address_cache_capacity = capacity;
        self
    }
}
