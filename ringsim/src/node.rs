//! SimPeer wrapper for simulated ring peers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ringdht::{
    Envelope, Error, Event as PeerEvent, Packet, Peer, PeerAddress, PeerConfig, PeerId, PeerRef,
    Random, Transport,
};

/// Outbox transport for simulation.
///
/// Envelopes wait here until the simulator drains them and schedules their
/// delivery.
#[derive(Debug, Default)]
pub struct SimTransport {
    outbox: Vec<Envelope>,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all outgoing envelopes, oldest first.
    pub fn take_sent(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }
}

impl Transport for SimTransport {
    fn send(&mut self, envelope: Envelope) {
        self.outbox.push(envelope);
    }
}

/// Seeded random source for one peer.
pub struct SimRandom {
    rng: StdRng,
}

impl SimRandom {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Random for SimRandom {
    fn gen_range(&mut self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..max)
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.gen()
    }
}

/// Type alias for simulated peers.
pub type SimPeerInner = Peer<SimTransport, SimRandom>;

/// Wrapper around a ringdht Peer for simulation.
pub struct SimPeer {
    inner: SimPeerInner,
}

impl SimPeer {
    /// Create an idle peer whose identity and latency draws come from `seed`.
    pub fn new(address: PeerAddress, seed: u64, config: PeerConfig) -> Self {
        let inner = Peer::new(address, SimTransport::new(), SimRandom::with_seed(seed), config);
        Self { inner }
    }

    /// Create an idle peer with a fixed id.
    pub fn with_id(address: PeerAddress, id: PeerId, seed: u64, config: PeerConfig) -> Self {
        let inner = Peer::with_id(
            address,
            id,
            SimTransport::new(),
            SimRandom::with_seed(seed),
            config,
        );
        Self { inner }
    }

    pub fn id(&self) -> PeerId {
        self.inner.id()
    }

    pub fn address(&self) -> PeerAddress {
        self.inner.address()
    }

    pub fn peer_ref(&self) -> PeerRef {
        self.inner.peer_ref()
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    pub fn left(&self) -> Option<PeerRef> {
        self.inner.left()
    }

    pub fn right(&self) -> Option<PeerRef> {
        self.inner.right()
    }

    /// Get a reference to the inner peer.
    pub fn inner(&self) -> &SimPeerInner {
        &self.inner
    }

    /// Get a mutable reference to the inner peer.
    pub fn inner_mut(&mut self) -> &mut SimPeerInner {
        &mut self.inner
    }

    /// Hand a delivered packet to the protocol.
    pub fn handle_packet(&mut self, packet: Packet) -> Result<(), Error> {
        self.inner.handle_packet(packet)
    }

    /// Take all outgoing envelopes from the transport.
    pub fn take_outgoing(&mut self) -> Vec<Envelope> {
        self.inner.transport_mut().take_sent()
    }

    /// Take all protocol events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<PeerEvent> {
        self.inner.take_events()
    }
}
