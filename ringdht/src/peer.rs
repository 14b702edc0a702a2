//! Peer implementation - the per-node protocol state machine.
//!
//! A `Peer` owns its identity, its two neighbor pointers, the routing address
//! cache and the local key-value store. It is driven entirely from outside:
//! the driver calls lifecycle and DHT operations, and the event loop hands
//! every delivered packet to `handle_packet`. Outgoing packets go to the
//! injected `Transport`; nothing is delivered synchronously.
//!
//! The protocol logic is split across modules, each adding an `impl` block:
//! - [`ring`](crate::ring) - join, discovery, neighbor switch, leave
//! - [`routing`](crate::routing) - id-based forwarding and failure notices
//! - [`dht`](crate::dht) - put, get and replication
//!
//! # Example
//!
//! ```
//! use ringdht::{Envelope, Peer, PeerAddress, PeerConfig, PeerId, Random, Transport};
//!
//! struct Outbox(Vec<Envelope>);
//!
//! impl Transport for Outbox {
//!     fn send(&mut self, envelope: Envelope) {
//!         self.0.push(envelope);
//!     }
//! }
//!
//! struct Fixed;
//!
//! impl Random for Fixed {
//!     fn gen_range(&mut self, min: u64, _max: u64) -> u64 {
//!         min
//!     }
//! }
//!
//! let mut peer = Peer::with_id(
//!     PeerAddress::new(0),
//!     PeerId::new(42),
//!     Outbox(Vec::new()),
//!     Fixed,
//!     PeerConfig::default(),
//! );
//! assert!(peer.is_idle());
//!
//! peer.awake_as_initial().unwrap();
//! assert!(peer.is_solitary());
//! assert_eq!(peer.right().unwrap().id, PeerId::new(42));
//! ```

use hashbrown::HashMap;
use tracing::warn;

use crate::config::PeerConfig;
use crate::id::{PeerAddress, PeerId, PeerRef};
use crate::packet::{Envelope, Packet};
use crate::store::Store;
use crate::time::Duration;
use crate::traits::{Random, Transport};
use crate::types::{Error, Event, PeerMetrics};

/// Lifecycle of a peer. Leaving is an action, not a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not linked into any ring. Must not be routed to.
    Idle,
    /// Part of the ring with both neighbor pointers set.
    Active,
}

/// Routing shortcuts: peer id -> last known address.
pub type AddressCache = HashMap<PeerId, PeerAddress>;

/// One ring member.
///
/// Generic over:
/// - `T`: Transport implementation
/// - `R`: Random number source (latency sampling, identity)
pub struct Peer<T, R> {
    // Dependencies (injected)
    transport: T,
    random: R,
    config: PeerConfig,

    // Identity
    address: PeerAddress,
    id: PeerId,

    // Ring position
    state: LifecycleState,
    left: Option<PeerRef>,
    right: Option<PeerRef>,

    // Caches and storage
    address_cache: AddressCache,
    store: Store,

    // Observability
    events: Vec<Event>,
    metrics: PeerMetrics,
}

impl<T, R> Peer<T, R>
where
    T: Transport,
    R: Random,
{
    /// Create an idle peer with a random identifier.
    pub fn new(address: PeerAddress, transport: T, mut random: R, config: PeerConfig) -> Self {
        let id = PeerId::new(random.next_u64());
        Self::with_id(address, id, transport, random, config)
    }

    /// Create an idle peer with a fixed identifier.
    pub fn with_id(
        address: PeerAddress,
        id: PeerId,
        transport: T,
        random: R,
        config: PeerConfig,
    ) -> Self {
        Self {
            transport,
            random,
            config,

            address,
            id,

            state: LifecycleState::Idle,
            left: None,
            right: None,

            address_cache: HashMap::new(),
            store: Store::new(),

            events: Vec::new(),
            metrics: PeerMetrics::new(),
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn address(&self) -> PeerAddress {
        self.address
    }

    /// Handle other peers use to reach this one.
    pub fn peer_ref(&self) -> PeerRef {
        PeerRef::new(self.address, self.id)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == LifecycleState::Active
    }

    pub fn is_idle(&self) -> bool {
        self.state == LifecycleState::Idle
    }

    pub fn left(&self) -> Option<PeerRef> {
        self.left
    }

    pub fn right(&self) -> Option<PeerRef> {
        self.right
    }

    /// Both neighbor pointers. Fails while idle.
    pub fn neighbors(&self) -> Result<(PeerRef, PeerRef), Error> {
        match (self.state, self.left, self.right) {
            (LifecycleState::Active, Some(left), Some(right)) => Ok((left, right)),
            _ => Err(Error::NotActive),
        }
    }

    /// True when this peer is the only ring member (both pointers at self).
    pub fn is_solitary(&self) -> bool {
        match self.neighbors() {
            Ok((left, right)) => left.address == self.address && right.address == self.address,
            Err(_) => false,
        }
    }

    /// Left neighbor has a larger id: this peer holds the smallest id.
    pub fn is_first(&self) -> Result<bool, Error> {
        let (left, _) = self.neighbors()?;
        Ok(self.id < left.id)
    }

    /// Right neighbor has a smaller id: this peer holds the largest id.
    pub fn is_last(&self) -> Result<bool, Error> {
        let (_, right) = self.neighbors()?;
        Ok(self.id > right.id)
    }

    /// Either side of the wraparound seam.
    pub fn is_edge(&self) -> Result<bool, Error> {
        Ok(self.is_first()? || self.is_last()?)
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn metrics(&self) -> &PeerMetrics {
        &self.metrics
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Last address seen for `id` in routed traffic, if any.
    pub fn cached_address(&self, id: PeerId) -> Option<PeerAddress> {
        self.address_cache.get(&id).copied()
    }

    pub fn address_cache(&self) -> &AddressCache {
        &self.address_cache
    }

    /// Drain events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Process one delivered packet.
    ///
    /// Packets that do not fit the current lifecycle state are rejected with
    /// an error and leave the peer untouched.
    pub fn handle_packet(&mut self, packet: Packet) -> Result<(), Error> {
        let kind = packet.kind();
        let result = match packet {
            Packet::Discovery { joiner } => self.on_discovery(joiner),
            Packet::Welcome { left, right } => self.on_welcome(left, right),
            Packet::SwitchNeighbor { side, neighbor } => self.on_switch_neighbor(side, neighbor),
            Packet::Put { key, value } => self.on_put(key, value),
            Packet::Replicate { key, value } => {
                self.on_replicate(key, value);
                Ok(())
            }
            Packet::Get { requester, key } => self.on_get(requester, key),
            Packet::Routed(routed) => self.on_routed(routed),
        };

        match &result {
            Ok(()) => self.metrics.packets_received += 1,
            Err(err) => {
                self.metrics.packets_rejected += 1;
                warn!(peer = %self.id, packet = kind, state = ?self.state, %err, "rejected packet");
            }
        }
        result
    }

    /// Hand a packet to the transport with a freshly sampled delay.
    pub(crate) fn send(&mut self, to: PeerAddress, packet: Packet) {
        let delay = self.config.latency.sample(&mut self.random);
        self.transport.send(Envelope { to, delay, packet });
        self.metrics.packets_sent += 1;
    }

    /// Queue a packet for delivery on the next event, skipping latency.
    pub(crate) fn send_now(&mut self, to: PeerAddress, packet: Packet) {
        self.transport.send(Envelope {
            to,
            delay: Duration::ZERO,
            packet,
        });
        self.metrics.packets_sent += 1;
    }

    /// Send a packet on toward its destination and count the hop.
    pub(crate) fn forward(&mut self, to: PeerAddress, packet: Packet) {
        self.metrics.packets_forwarded += 1;
        self.send(to, packet);
    }

    pub(crate) fn set_active(&mut self, left: PeerRef, right: PeerRef) {
        self.left = Some(left);
        self.right = Some(right);
        self.state = LifecycleState::Active;
    }

    pub(crate) fn set_idle(&mut self) {
        self.left = None;
        self.right = None;
        self.state = LifecycleState::Idle;
    }

    pub(crate) fn set_left(&mut self, left: PeerRef) {
        self.left = Some(left);
    }

    pub(crate) fn set_right(&mut self, right: PeerRef) {
        self.right = Some(right);
    }

    /// Remember where `peer` lives. Evicts an arbitrary entry when full.
    pub(crate) fn cache_address(&mut self, peer: PeerRef) {
        let capacity = self.config.address_cache_capacity;
        if capacity == 0 || peer.id == self.id {
            return;
        }
        if !self.address_cache.contains_key(&peer.id) && self.address_cache.len() >= capacity {
            if let Some(evict) = self.address_cache.keys().next().copied() {
                self.address_cache.remove(&evict);
            }
        }
        self.address_cache.insert(peer.id, peer.address);
    }

    pub(crate) fn forget_address(&mut self, id: PeerId) {
        self.address_cache.remove(&id);
    }

    pub(crate) fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub(crate) fn metrics_mut(&mut self) -> &mut PeerMetrics {
        &mut self.metrics
    }

    pub(crate) fn push_event(&mut self, event: Event) {
        self.events.push(event);
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::traits::test_impls::{MockRandom, MockTransport};

    #[test]
    fn test_peer_starts_idle() {
        let peer = make_peer(0, 10);
        assert!(peer.is_idle());
        assert_eq!(peer.left(), None);
        assert_eq!(peer.right(), None);
        assert_eq!(peer.neighbors(), Err(Error::NotActive));
        assert_eq!(peer.is_first(), Err(Error::NotActive));
        assert!(!peer.is_solitary());
    }

    #[test]
    fn test_random_identity_is_deterministic() {
        let a: TestPeer = Peer::new(
            PeerAddress::new(0),
            MockTransport::new(),
            MockRandom::with_seed(7),
            PeerConfig::default(),
        );
        let b: TestPeer = Peer::new(
            PeerAddress::new(1),
            MockTransport::new(),
            MockRandom::with_seed(7),
            PeerConfig::default(),
        );
        let c: TestPeer = Peer::new(
            PeerAddress::new(2),
            MockTransport::new(),
            MockRandom::with_seed(8),
            PeerConfig::default(),
        );
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_edge_flags() {
        // Ring 10 -> 20 -> 30 -> 10
        let first = make_active_peer(0, 10, peer_ref(2, 30), peer_ref(1, 20));
        let middle = make_active_peer(1, 20, peer_ref(0, 10), peer_ref(2, 30));
        let last = make_active_peer(2, 30, peer_ref(1, 20), peer_ref(0, 10));

        assert_eq!(first.is_first(), Ok(true));
        assert_eq!(first.is_last(), Ok(false));
        assert_eq!(middle.is_edge(), Ok(false));
        assert_eq!(last.is_first(), Ok(false));
        assert_eq!(last.is_last(), Ok(true));
    }

    #[test]
    fn test_send_samples_configured_latency() {
        let mut peer = Peer::with_id(
            PeerAddress::new(0),
            PeerId::new(1),
            MockTransport::new(),
            MockRandom::new(),
            PeerConfig::default().with_latency(crate::config::LatencyRange::fixed(
                crate::time::Duration::from_ticks(25),
            )),
        );
        peer.send(PeerAddress::new(3), Packet::Discovery { joiner: peer_ref(0, 1) });

        let sent = peer.transport().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, PeerAddress::new(3));
        assert_eq!(sent[0].delay.as_ticks(), 25);
        assert_eq!(peer.metrics().packets_sent, 1);
    }

    #[test]
    fn test_address_cache_bounded() {
        let mut peer = Peer::with_id(
            PeerAddress::new(0),
            PeerId::new(1),
            MockTransport::new(),
            MockRandom::new(),
            PeerConfig::default().with_address_cache_capacity(2),
        );
        peer.cache_address(peer_ref(1, 100));
        peer.cache_address(peer_ref(2, 200));
        peer.cache_address(peer_ref(3, 300));

        assert_eq!(peer.address_cache().len(), 2);
        assert_eq!(peer.cached_address(PeerId::new(300)), Some(PeerAddress::new(3)));
    }

    #[test]
    fn test_address_cache_skips_self_and_disabled() {
        let mut peer = make_peer(0, 1);
        peer.cache_address(peer_ref(0, 1));
        assert!(peer.address_cache().is_empty());

        let mut disabled = Peer::with_id(
            PeerAddress::new(0),
            PeerId::new(1),
            MockTransport::new(),
            MockRandom::new(),
            PeerConfig::default().with_address_cache_capacity(0),
        );
        disabled.cache_address(peer_ref(1, 100));
        assert!(disabled.address_cache().is_empty());
    }

    #[test]
    fn test_rejected_packet_is_counted() {
        let mut peer = make_peer(0, 10);
        let result = peer.handle_packet(Packet::SwitchNeighbor {
            side: crate::packet::Side::Left,
            neighbor: peer_ref(1, 5),
        });
        assert_eq!(result, Err(Error::NotActive));
        assert_eq!(peer.metrics().packets_rejected, 1);
        assert_eq!(peer.metrics().packets_received, 0);
        assert!(peer.is_idle());
    }
}
