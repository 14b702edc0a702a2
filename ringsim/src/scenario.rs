//! Scenario builder for setting up and running simulations.

use ringdht::{Duration, Key, LatencyRange, PeerAddress, PeerConfig, Timestamp, Value};

use crate::event::{Pick, ScenarioAction};
use crate::metrics::SimulationResult;
use crate::sim::{SimConfig, Simulator};

/// Builder for simulation scenarios.
pub struct ScenarioBuilder {
    /// Number of peers to create.
    num_peers: usize,
    /// RNG seed for determinism.
    seed: u64,
    /// Per-packet delivery delay bounds.
    latency: LatencyRange,
    /// Address cache size for every peer.
    address_cache_capacity: usize,
    /// Gap between consecutive joins. `None` derives one from the latency.
    join_spacing: Option<Duration>,
    /// Whether to schedule the joins of every peer.
    join_all: bool,
    /// Scheduled actions.
    actions: Vec<(Timestamp, ScenarioAction)>,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ScenarioBuilder {
    /// Create a new scenario with the specified number of peers.
    pub fn new(num_peers: usize) -> Self {
        let defaults = PeerConfig::default();
        Self {
            num_peers,
            seed: 42,
            latency: defaults.latency,
            address_cache_capacity: defaults.address_cache_capacity,
            join_spacing: None,
            join_all: false,
            actions: Vec::new(),
        }
    }

    /// Set the RNG seed for deterministic simulation.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the delivery delay bounds.
    pub fn with_latency(mut self, latency: LatencyRange) -> Self {
        self.latency = latency;
        self
    }

    /// Set the address cache size. Zero disables routing shortcuts.
    pub fn with_address_cache_capacity(mut self, capacity: usize) -> Self {
        self.address_cache_capacity = capacity;
        self
    }

    /// Set the gap between consecutive joins.
    pub fn with_join_spacing(mut self, spacing: Duration) -> Self {
        self.join_spacing = Some(spacing);
        self
    }

    /// Peer 0 seeds the ring at time zero; the others join one by one.
    pub fn join_all(mut self) -> Self {
        self.join_all = true;
        self
    }

    /// Gap between joins: long enough for a discovery to cross the whole
    /// ring and the welcome to come back, unless set explicitly.
    pub fn join_spacing(&self) -> Duration {
        self.join_spacing.unwrap_or_else(|| {
            let hops = self.num_peers as u64 + 2;
            self.latency.max.saturating_mul(hops)
        })
    }

    /// Time by which every scheduled join has completed.
    pub fn joins_complete_at(&self) -> Timestamp {
        Timestamp::ZERO + self.join_spacing().saturating_mul(self.num_peers.max(1) as u64)
    }

    /// Schedule peer `index` to leave.
    pub fn leave_at(mut self, time: Timestamp, index: usize) -> Self {
        self.actions.push((
            time,
            ScenarioAction::Leave {
                peer: Pick::Peer(PeerAddress::new(index)),
            },
        ));
        self
    }

    /// Schedule a put through `peer`.
    pub fn put_at(
        mut self,
        time: Timestamp,
        peer: Pick,
        key: impl Into<Key>,
        value: impl Into<Value>,
    ) -> Self {
        self.actions.push((
            time,
            ScenarioAction::Put {
                peer,
                key: key.into(),
                value: value.into(),
            },
        ));
        self
    }

    /// Schedule a get through `peer`.
    pub fn get_at(mut self, time: Timestamp, peer: Pick, key: impl Into<Key>) -> Self {
        self.actions.push((
            time,
            ScenarioAction::Get {
                peer,
                key: key.into(),
            },
        ));
        self
    }

    /// Schedule a chat message between two peers.
    pub fn message_at(
        mut self,
        time: Timestamp,
        from: Pick,
        to: Pick,
        text: impl Into<String>,
    ) -> Self {
        self.actions.push((
            time,
            ScenarioAction::SendMessage {
                from,
                to,
                text: text.into(),
            },
        ));
        self
    }

    /// Schedule a snapshot at the specified time.
    pub fn snapshot_at(mut self, time: Timestamp) -> Self {
        self.actions.push((time, ScenarioAction::TakeSnapshot));
        self
    }

    /// Build the simulator with all peers and scheduled actions.
    pub fn build(self) -> (Simulator, Vec<PeerAddress>) {
        let peer_config = PeerConfig::default()
            .with_latency(self.latency)
            .with_address_cache_capacity(self.address_cache_capacity);
        let config = SimConfig::default()
            .with_seed(self.seed)
            .with_peer_config(peer_config);
        let mut sim = Simulator::new(config);

        let peers: Vec<PeerAddress> = (0..self.num_peers).map(|_| sim.add_peer()).collect();

        if self.join_all {
            let spacing = self.join_spacing();
            let mut at = Timestamp::ZERO;
            for (i, peer) in peers.iter().enumerate() {
                let action = if i == 0 {
                    ScenarioAction::AwakeAsInitial { peer: *peer }
                } else {
                    ScenarioAction::Awake { peer: *peer }
                };
                sim.schedule_action(at, action);
                at += spacing;
            }
        }

        for (time, action) in self.actions {
            sim.schedule_action(time, action);
        }

        (sim, peers)
    }

    /// Build and run for the specified duration.
    pub fn run_for(self, duration: Duration) -> SimulationResult {
        let (mut sim, _) = self.build();
        sim.run_for(duration)
    }
}

/// The scripted demo run.
///
/// Every peer joins, the ring is shown, the first peer leaves, three chat
/// messages go between random peers, then one value is stored and read back.
pub fn demo_scenario(num_peers: usize, seed: u64, latency: LatencyRange) -> ScenarioBuilder {
    let builder = ScenarioBuilder::new(num_peers)
        .with_seed(seed)
        .with_latency(latency)
        .join_all();

    let step = builder.join_spacing();
    let mut at = builder.joins_complete_at();
    let mut next = || {
        let time = at;
        at += step;
        time
    };

    builder
        .snapshot_at(next())
        .leave_at(next(), 0)
        .message_at(next(), Pick::AnyActive, Pick::AnyActive, "Hello world")
        .message_at(next(), Pick::AnyActive, Pick::AnyActive, "Hello universe")
        .message_at(next(), Pick::AnyActive, Pick::AnyActive, "Hello cosmos")
        .put_at(next(), Pick::AnyActive, "La clef", "La valeur")
        .get_at(next(), Pick::AnyActive, "La clef")
        .snapshot_at(next())
}
