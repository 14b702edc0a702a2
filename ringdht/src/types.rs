//! Errors, events and counters shared across the protocol.

use crate::id::{PeerAddress, PeerId, PeerRef};
use crate::packet::{Key, Side, UndeliverableReason, Value};

/// Error type for peer operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The operation requires the peer to be part of the ring.
    #[error("peer is idle")]
    NotActive,
    /// The operation requires the peer to be idle.
    #[error("peer is already active")]
    AlreadyActive,
    /// A join was attempted but no active peer exists to contact.
    #[error("no active peer to contact")]
    NoActivePeer,
    /// The address does not resolve to a registered peer.
    #[error("unknown peer {0}")]
    UnknownPeer(PeerAddress),
}

/// Events emitted by a peer for the driver to observe.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The peer became active with these neighbors.
    Joined { left: PeerRef, right: PeerRef },
    /// The peer left the ring and is idle again.
    Left,
    /// A neighbor pointer was overwritten.
    NeighborSwitched { side: Side, neighbor: PeerRef },
    /// A chat message addressed to this peer arrived.
    MessageReceived { from: PeerId, text: String },
    /// A packet this peer originated could not be delivered.
    DeliveryFailed {
        target: PeerId,
        reason: UndeliverableReason,
    },
    /// A get response resolved every local request waiting on `key`.
    GetResolved {
        key: Key,
        value: Option<Value>,
        waiters: usize,
    },
}

/// Per-peer traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerMetrics {
    /// Envelopes handed to the transport.
    pub packets_sent: u64,
    /// Packets accepted by `handle_packet`.
    pub packets_received: u64,
    /// Packets rejected by `handle_packet` (wrong lifecycle state).
    pub packets_rejected: u64,
    /// Discovery, put, get and routed packets passed on to a neighbor.
    pub packets_forwarded: u64,
    /// Routed packets whose target turned out to be missing.
    pub routing_failures: u64,
    /// Replicate packets applied to the local table.
    pub replicas_applied: u64,
}

impl PeerMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}
