//! Simulated time.
//!
//! The protocol never reads a clock. Delays are attached to outgoing packets
//! and the simulator advances a logical timestamp as it delivers them.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Point in simulated time, in ticks since the simulation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);
    pub const MAX: Timestamp = Timestamp(u64::MAX);

    #[inline]
    pub const fn from_ticks(ticks: u64) -> Self {
        Timestamp(ticks)
    }

    #[inline]
    pub const fn as_ticks(self) -> u64 {
        self.0
    }

    /// Duration since `earlier`, zero if `earlier` is in the future.
    #[inline]
    pub const fn saturating_since(self, earlier: Timestamp) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    /// Saturates at `Timestamp::MAX` so a huge delay never wraps into the past.
    #[inline]
    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign<Duration> for Timestamp {
    #[inline]
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub for Timestamp {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Timestamp) -> Duration {
        self.saturating_since(rhs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}", self.0)
    }
}

/// Span of simulated time, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(u64);

impl Duration {
    pub const ZERO: Duration = Duration(0);

    #[inline]
    pub const fn from_ticks(ticks: u64) -> Self {
        Duration(ticks)
    }

    #[inline]
    pub const fn as_ticks(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn saturating_mul(self, n: u64) -> Self {
        Duration(self.0.saturating_mul(n))
    }
}

impl Add for Duration {
    type Output = Duration;

    #[inline]
    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0.saturating_add(rhs.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_arithmetic() {
        let t = Timestamp::from_ticks(10) + Duration::from_ticks(5);
        assert_eq!(t.as_ticks(), 15);
        assert_eq!((t - Timestamp::from_ticks(3)).as_ticks(), 12);
    }

    #[test]
    fn test_saturation() {
        assert_eq!(Timestamp::MAX + Duration::from_ticks(1), Timestamp::MAX);
        assert_eq!(Timestamp::from_ticks(5) - Timestamp::from_ticks(9), Duration::ZERO);
        assert_eq!(
            Duration::from_ticks(u64::MAX).saturating_mul(2),
            Duration::from_ticks(u64::MAX)
        );
    }
}
