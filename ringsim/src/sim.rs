//! Discrete event simulator for ringdht peers.

use std::collections::BinaryHeap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ringdht::{
    Duration, Error, Event as PeerEvent, GetHandle, Key, Lookup, Packet, PeerAddress, PeerConfig,
    PeerId, Timestamp, Value,
};
use tracing::{debug, info, warn};

use crate::event::{Event, Pick, ScenarioAction, ScheduledEvent, SequenceNumber};
use crate::metrics::{PeerView, RingSnapshot, SimMetrics, SimulationResult};
use crate::node::SimPeer;

/// Simulator-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Seed for contact selection, scripted choices and per-peer RNGs.
    pub seed: u64,
    /// Configuration given to every peer added with `add_peer`.
    pub peer: PeerConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            peer: PeerConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_peer_config(mut self, peer: PeerConfig) -> Self {
        self.peer = peer;
        self
    }
}

/// A protocol event together with where and when it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub time: Timestamp,
    pub peer: PeerAddress,
    pub event: PeerEvent,
}

/// A get issued through the simulator, and its outcome once known.
#[derive(Debug)]
pub struct GetRecord {
    pub issued_at: Timestamp,
    pub peer: PeerAddress,
    pub key: Key,
    pub handle: GetHandle,
    /// `None` while the response is outstanding.
    pub result: Option<Lookup>,
}

/// Discrete event simulator for ring networks.
pub struct Simulator {
    /// All peers, indexed by address.
    peers: Vec<SimPeer>,
    /// Settings for new peers.
    config: SimConfig,
    /// Current simulation time.
    current_time: Timestamp,
    /// Priority queue of scheduled events.
    event_queue: BinaryHeap<ScheduledEvent>,
    /// Collected metrics.
    metrics: SimMetrics,
    /// Next sequence number for event ordering.
    next_seq: u64,
    /// Driver-side randomness (contact and scripted peer choice, peer seeds).
    rng: StdRng,
    /// Protocol events not yet taken.
    events: Vec<EventRecord>,
    /// Every get issued so far.
    gets: Vec<GetRecord>,
}

impl Simulator {
    /// Create a new simulator.
    pub fn new(config: SimConfig) -> Self {
        Self {
            peers: Vec::new(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            current_time: Timestamp::ZERO,
            event_queue: BinaryHeap::new(),
            metrics: SimMetrics::new(),
            next_seq: 0,
            events: Vec::new(),
            gets: Vec::new(),
        }
    }

    /// Add an idle peer with a random id.
    pub fn add_peer(&mut self) -> PeerAddress {
        let address = PeerAddress::new(self.peers.len());
        let seed = self.rng.gen();
        self.peers.push(SimPeer::new(address, seed, self.config.peer.clone()));
        address
    }

    /// Add an idle peer with a fixed id.
    pub fn add_peer_with_id(&mut self, id: PeerId) -> PeerAddress {
        let address = PeerAddress::new(self.peers.len());
        let seed = self.rng.gen();
        let peer = SimPeer::with_id(address, id, seed, self.config.peer.clone());
        self.peers.push(peer);
        address
    }

    /// Get a reference to a peer.
    pub fn peer(&self, address: PeerAddress) -> Option<&SimPeer> {
        self.peers.get(address.index())
    }

    /// Get a mutable reference to a peer.
    pub fn peer_mut(&mut self, address: PeerAddress) -> Option<&mut SimPeer> {
        self.peers.get_mut(address.index())
    }

    /// All peers, indexed by address.
    pub fn peers(&self) -> &[SimPeer] {
        &self.peers
    }

    /// Get the current simulation time.
    pub fn current_time(&self) -> Timestamp {
        self.current_time
    }

    /// Get collected metrics.
    pub fn metrics(&self) -> &SimMetrics {
        &self.metrics
    }

    /// Number of events still queued.
    pub fn pending_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Number of active peers.
    pub fn active_count(&self) -> usize {
        self.peers.iter().filter(|p| p.is_active()).count()
    }

    /// Uniformly pick an active peer matching `predicate`.
    pub fn random_active_address<F>(&mut self, predicate: F) -> Option<PeerAddress>
    where
        F: Fn(&SimPeer) -> bool,
    {
        let candidates: Vec<PeerAddress> = self
            .peers
            .iter()
            .filter(|p| p.is_active() && predicate(*p))
            .map(|p| p.address())
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..candidates.len());
        Some(candidates[index])
    }

    /// Seed a new ring with `address`.
    pub fn awake_as_initial(&mut self, address: PeerAddress) -> Result<(), Error> {
        self.drive(address, |peer| peer.inner_mut().awake_as_initial())
    }

    /// Join `address` to the ring through a random active contact.
    pub fn awake(&mut self, address: PeerAddress) -> Result<(), Error> {
        if self.peer(address).ok_or(Error::UnknownPeer(address))?.is_active() {
            return Err(Error::AlreadyActive);
        }
        let contact = self
            .random_active_address(|p| p.address() != address)
            .ok_or(Error::NoActivePeer)?;
        self.drive(address, |peer| peer.inner_mut().awake(contact))
    }

    /// Make `address` leave the ring.
    pub fn leave(&mut self, address: PeerAddress) -> Result<(), Error> {
        self.drive(address, |peer| peer.inner_mut().leave())
    }

    /// Store a value through `address`.
    pub fn put(&mut self, address: PeerAddress, key: &str, value: Value) -> Result<(), Error> {
        self.drive(address, |peer| peer.inner_mut().put(key, value))
    }

    /// Look a value up through `address`.
    ///
    /// The handle is also recorded for `get_results`. Both share one result
    /// slot: taking it through the returned handle leaves the record empty.
    pub fn get(&mut self, address: PeerAddress, key: &str) -> Result<GetHandle, Error> {
        let handle = self.drive(address, |peer| peer.inner_mut().get(key))?;
        self.gets.push(GetRecord {
            issued_at: self.current_time,
            peer: address,
            key: key.to_owned(),
            handle: handle.clone(),
            result: None,
        });
        Ok(handle)
    }

    /// Send a chat message from `address` to the peer with id `target`.
    pub fn send_message(
        &mut self,
        address: PeerAddress,
        target: PeerId,
        text: &str,
    ) -> Result<(), Error> {
        self.drive(address, |peer| peer.inner_mut().send_message(target, text))
    }

    /// Run a driver operation on one peer, then queue what it sent.
    fn drive<T, F>(&mut self, address: PeerAddress, op: F) -> Result<T, Error>
    where
        F: FnOnce(&mut SimPeer) -> Result<T, Error>,
    {
        let peer = self
            .peers
            .get_mut(address.index())
            .ok_or(Error::UnknownPeer(address))?;
        let result = op(peer);
        // A failed operation may still have sent packets before failing.
        self.collect_outgoing(address);
        result
    }

    /// Schedule an event.
    pub fn schedule(&mut self, time: Timestamp, event: Event) {
        let seq = SequenceNumber::new(self.next_seq);
        self.next_seq += 1;
        self.event_queue.push(ScheduledEvent::new(time, seq, event));
    }

    /// Schedule a scenario action.
    pub fn schedule_action(&mut self, time: Timestamp, action: ScenarioAction) {
        self.schedule(time, Event::ScenarioAction(action));
    }

    /// Run simulation until specified time.
    pub fn run_until(&mut self, end_time: Timestamp) -> SimulationResult {
        while let Some(next) = self.event_queue.peek() {
            if next.time > end_time {
                break;
            }
            let Some(event) = self.event_queue.pop() else {
                break;
            };
            self.advance_time(event.time);
            self.process_event(event.event);
        }

        // Advance to end_time even if no more events
        self.advance_time(end_time);
        self.finish()
    }

    /// Run simulation for specified duration.
    pub fn run_for(&mut self, duration: Duration) -> SimulationResult {
        self.run_until(self.current_time + duration)
    }

    /// Run until the event queue is empty or `max_events` were processed.
    pub fn run_until_idle(&mut self, max_events: usize) -> SimulationResult {
        let mut processed = 0;
        while processed < max_events {
            let Some(event) = self.event_queue.pop() else {
                break;
            };
            self.advance_time(event.time);
            self.process_event(event.event);
            processed += 1;
        }
        self.finish()
    }

    fn finish(&mut self) -> SimulationResult {
        self.take_snapshot();
        SimulationResult {
            end_time: self.current_time,
            metrics: self.metrics.clone(),
            queue_exhausted: self.event_queue.is_empty(),
        }
    }

    /// Advance simulation time.
    fn advance_time(&mut self, time: Timestamp) {
        if time > self.current_time {
            self.current_time = time;
        }
    }

    /// Process a single event.
    fn process_event(&mut self, event: Event) {
        match event {
            Event::Delivery { to, packet } => self.deliver(to, packet),
            Event::ScenarioAction(action) => self.execute_action(action),
        }
    }

    /// Deliver a packet to a peer.
    fn deliver(&mut self, to: PeerAddress, packet: Packet) {
        let kind = packet.kind();
        let Some(peer) = self.peers.get_mut(to.index()) else {
            warn!(%to, packet = kind, "delivery to unknown address");
            self.metrics.packets_rejected += 1;
            return;
        };
        match peer.handle_packet(packet) {
            Ok(()) => self.metrics.packets_delivered += 1,
            // The peer already logged the rejection.
            Err(_) => self.metrics.packets_rejected += 1,
        }
        self.collect_outgoing(to);
    }

    /// Schedule everything `sender` sent and record its events.
    fn collect_outgoing(&mut self, sender: PeerAddress) {
        let Some(peer) = self.peers.get_mut(sender.index()) else {
            return;
        };
        let envelopes = peer.take_outgoing();
        let events = peer.take_events();

        let now = self.current_time;
        self.events.extend(events.into_iter().map(|event| EventRecord {
            time: now,
            peer: sender,
            event,
        }));

        for envelope in envelopes {
            self.metrics.packets_scheduled += 1;
            self.schedule(
                now + envelope.delay,
                Event::Delivery {
                    to: envelope.to,
                    packet: envelope.packet,
                },
            );
        }
    }

    fn resolve(&mut self, pick: Pick) -> Result<PeerAddress, Error> {
        match pick {
            Pick::Peer(address) => Ok(address),
            Pick::AnyActive => self.random_active_address(|_| true).ok_or(Error::NoActivePeer),
        }
    }

    /// Execute a scenario action.
    fn execute_action(&mut self, action: ScenarioAction) {
        self.metrics.actions_executed += 1;
        if let Err(err) = self.try_action(action) {
            self.metrics.actions_failed += 1;
            warn!(time = %self.current_time, %err, "scenario action failed");
        }
    }

    fn try_action(&mut self, action: ScenarioAction) -> Result<(), Error> {
        match action {
            ScenarioAction::AwakeAsInitial { peer } => {
                info!(%peer, "waking up initial peer");
                self.awake_as_initial(peer)
            }
            ScenarioAction::Awake { peer } => {
                info!(%peer, "waking up peer");
                self.awake(peer)
            }
            ScenarioAction::Leave { peer } => {
                let peer = self.resolve(peer)?;
                info!(%peer, "disconnecting peer");
                self.leave(peer)
            }
            ScenarioAction::Put { peer, key, value } => {
                let peer = self.resolve(peer)?;
                info!(%peer, %key, "inserting key/value");
                self.put(peer, &key, value)
            }
            ScenarioAction::Get { peer, key } => {
                let peer = self.resolve(peer)?;
                info!(%peer, %key, "fetching key");
                self.get(peer, &key).map(|_| ())
            }
            ScenarioAction::SendMessage { from, to, text } => {
                let from = self.resolve(from)?;
                let to = self.resolve(to)?;
                let target = self.peer(to).ok_or(Error::UnknownPeer(to))?.id();
                info!(%from, %to, %target, %text, "sending message");
                self.send_message(from, target, &text)
            }
            ScenarioAction::TakeSnapshot => {
                self.take_snapshot();
                if let Some(snapshot) = self.metrics.latest_snapshot() {
                    info!(ring = %snapshot.display_ring(), "ring");
                }
                Ok(())
            }
        }
    }

    /// Current ring state, without recording it.
    pub fn snapshot(&self) -> RingSnapshot {
        let mut snapshot = RingSnapshot::new(self.current_time);
        for peer in &self.peers {
            snapshot.record_peer(PeerView {
                address: peer.address(),
                id: peer.id(),
                active: peer.is_active(),
                left: peer.left(),
                right: peer.right(),
            });
        }
        snapshot
    }

    /// Take a ring snapshot and record it in the metrics.
    pub fn take_snapshot(&mut self) {
        let snapshot = self.snapshot();
        debug!(time = %snapshot.time, active = snapshot.active_count(), "snapshot");
        self.metrics.add_snapshot(snapshot);
    }

    /// Drain protocol events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.events)
    }

    /// Every get issued through the simulator, with results filled in for
    /// the ones that have been answered.
    pub fn get_results(&mut self) -> &[GetRecord] {
        for record in &mut self.gets {
            if record.result.is_none() {
                record.result = record.handle.try_take();
            }
        }
        &self.gets
    }
}
