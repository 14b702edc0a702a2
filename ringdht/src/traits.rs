//! Abstraction seams between the protocol and its environment.
//!
//! A peer never delivers anything itself. It hands envelopes to a
//! `Transport`, and whoever owns the event queue (the simulator, or a test)
//! decides when they arrive. Randomness is injected the same way so runs are
//! reproducible from a seed.

use crate::packet::Envelope;

/// Outbound side of the delivery channel.
///
/// Implementations must eventually deliver each envelope exactly once to
/// `envelope.to`, no earlier than `envelope.delay` after it was sent.
///
/// # Example
///
/// ```
/// use ringdht::{Envelope, Transport};
///
/// struct Outbox(Vec<Envelope>);
///
/// impl Transport for Outbox {
///     fn send(&mut self, envelope: Envelope) {
///         self.0.push(envelope);
///     }
/// }
/// ```
pub trait Transport {
    /// Queue an envelope for delivery.
    fn send(&mut self, envelope: Envelope);
}

/// Random number source.
pub trait Random {
    /// Uniform value in `[min, max)`. Returns `min` when the range is empty.
    fn gen_range(&mut self, min: u64, max: u64) -> u64;

    /// Uniform 64-bit value.
    fn next_u64(&mut self) -> u64 {
        self.gen_range(0, u64::MAX)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_impls {
    //! Mock implementations for unit tests and doc tests.
    //!
    //! Available when running tests or with the `test-support` feature enabled.

    use super::*;

    /// Transport that records every envelope.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        sent: Vec<Envelope>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Envelopes sent so far, oldest first.
        pub fn sent(&self) -> &[Envelope] {
            &self.sent
        }

        /// Drain all sent envelopes.
        pub fn take_sent(&mut self) -> Vec<Envelope> {
            std::mem::take(&mut self.sent)
        }
    }

    impl Transport for MockTransport {
        fn send(&mut self, envelope: Envelope) {
            self.sent.push(envelope);
        }
    }

    /// Deterministic LCG.
    pub struct MockRandom {
        pub state: u64,
    }

    impl Default for MockRandom {
        fn default() -> Self {
            Self { state: 12345 }
        }
    }

    impl MockRandom {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_seed(seed: u64) -> Self {
            Self { state: seed }
        }
    }

    impl Random for MockRandom {
        fn gen_range(&mut self, min: u64, max: u64) -> u64 {
            self.state = self
                .state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            if max <= min {
                return min;
            }
            min + (self.state % (max - min))
        }
    }
}
