//! Packets exchanged between peers.
//!
//! One closed enum covers every message kind, so each handler matches
//! exhaustively. Membership and DHT packets travel one hop to a known
//! neighbor; `Routed` packets are forwarded by identifier comparison until
//! they reach the peer whose id equals `target`.

use std::fmt;

use crate::id::{PeerAddress, PeerId, PeerRef};
use crate::time::Duration;

/// DHT key.
pub type Key = String;

/// DHT value.
pub type Value = Vec<u8>;

/// Which neighbor pointer a `SwitchNeighbor` overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Why a routed packet could not reach its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndeliverableReason {
    /// The target id should sit between two adjacent peers but does not.
    NodeNotFound,
    /// The packet reached a cached address whose peer has left the ring.
    PeerLeft,
}

impl fmt::Display for UndeliverableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndeliverableReason::NodeNotFound => f.write_str("Node not found"),
            UndeliverableReason::PeerLeft => f.write_str("Node has left"),
        }
    }
}

/// Envelope for traffic addressed by peer id rather than by neighbor.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    /// Originator of this packet (cached by every hop).
    pub sender: PeerRef,
    /// Id of the peer that should handle the body.
    pub target: PeerId,
    pub body: RoutedBody,
}

impl Routed {
    pub fn new(sender: PeerRef, target: PeerId, body: RoutedBody) -> Self {
        Self {
            sender,
            target,
            body,
        }
    }
}

/// Payload of a routed packet.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedBody {
    /// Application chat message.
    Message { text: String },
    /// Routing failure notice, sent back toward the original sender.
    Undeliverable {
        reason: UndeliverableReason,
        original: Box<Routed>,
    },
    /// Answer to a `Get`, routed back to the requester.
    GetResponse { key: Key, value: Option<Value> },
}

/// Every packet a peer can receive.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// A joining peer asks where it belongs.
    Discovery { joiner: PeerRef },
    /// Join reply: the neighbors the joiner should adopt.
    Welcome { left: PeerRef, right: PeerRef },
    /// Neighbor-pointer repair after a join or a leave.
    SwitchNeighbor { side: Side, neighbor: PeerRef },
    /// Store request, walked toward the owning partition.
    Put { key: Key, value: Value },
    /// Copy of a stored pair for the owner's neighbors.
    Replicate { key: Key, value: Value },
    /// Read request, walked toward a peer holding the key.
    Get { requester: PeerRef, key: Key },
    /// Id-addressed traffic.
    Routed(Routed),
}

impl Packet {
    /// Short name for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Discovery { .. } => "discovery",
            Packet::Welcome { .. } => "welcome",
            Packet::SwitchNeighbor { .. } => "switch-neighbor",
            Packet::Put { .. } => "put",
            Packet::Replicate { .. } => "replicate",
            Packet::Get { .. } => "get",
            Packet::Routed(routed) => match routed.body {
                RoutedBody::Message { .. } => "message",
                RoutedBody::Undeliverable { .. } => "undeliverable",
                RoutedBody::GetResponse { .. } => "get-response",
            },
        }
    }
}

/// A packet handed to the transport, with the latency it should experience.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub to: PeerAddress,
    pub delay: Duration,
    pub packet: Packet,
}
