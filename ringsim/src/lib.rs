//! ringsim - Discrete event simulator for the ringdht protocol.
//!
//! This crate provides a deterministic, discrete-event simulator that drives
//! many ringdht peers in one process, with no real-time delays.
//!
//! # Features
//!
//! - **Discrete event simulation**: deterministic `(time, sequence)` ordering
//! - **Peer arena**: peers are addressed by index, neighbors by `PeerRef`
//! - **Latency model**: each packet is delayed uniformly within a configured range
//! - **Scenario builder**: scheduled joins, leaves, puts, gets and messages
//! - **Metrics collection**: ring snapshots, packet counts, protocol events
//!
//! # Example
//!
//! ```
//! use ringsim::{Duration, ScenarioBuilder};
//!
//! // Join 5 peers one after another and let the ring settle
//! let result = ScenarioBuilder::new(5)
//!     .with_seed(42)
//!     .join_all()
//!     .run_for(Duration::from_ticks(10_000));
//!
//! assert_eq!(result.final_active_count(), 5);
//! assert!(result.consistent());
//! ```
//!
//! # Architecture
//!
//! The simulator uses a priority queue of events ordered by (time, sequence_number).
//! The main loop:
//! 1. Pop next event from queue
//! 2. Advance simulation time
//! 3. Process event (hand the packet to the peer, or run a scripted action)
//! 4. Drain the peer's outbox and events
//! 5. Schedule each outgoing envelope at `now + delay`
//!
//! Peers never see each other: every packet carries the addresses it needs,
//! and the simulator is the only place that maps an address to a peer.

pub mod event;
pub mod metrics;
pub mod node;
pub mod scenario;
pub mod sim;

// Re-export main types
pub use event::{Event, Pick, ScenarioAction, ScheduledEvent};
pub use metrics::{PeerView, RingSnapshot, SimMetrics, SimulationResult};
pub use node::SimPeer;
pub use ringdht::{Duration, LatencyRange, PeerAddress, PeerId, Timestamp};
pub use scenario::{demo_scenario, ScenarioBuilder};
pub use sim::{EventRecord, GetRecord, SimConfig, Simulator};

#[cfg(test)]
mod tests {
    use ringdht::{Event as PeerEvent, Lookup};

    use super::*;

    const MAX_EVENTS: usize = 1_000_000;

    #[test]
    fn test_single_peer_ring() {
        let result = ScenarioBuilder::new(1)
            .with_seed(42)
            .join_all()
            .run_for(Duration::from_ticks(1_000));

        let snapshot = result.metrics.latest_snapshot().unwrap();
        assert_eq!(snapshot.active_count(), 1);
        assert!(snapshot.is_consistent());
        assert_eq!(snapshot.ring_order().len(), 1);
    }

    #[test]
    fn test_three_peer_example() {
        // A seeds the ring, B and C join; C reads what B wrote.
        let mut sim = Simulator::new(SimConfig::default().with_seed(9));
        let a = sim.add_peer();
        let b = sim.add_peer();
        let c = sim.add_peer();

        sim.awake_as_initial(a).unwrap();
        sim.awake(b).unwrap();
        sim.run_until_idle(MAX_EVENTS);
        sim.awake(c).unwrap();
        sim.run_until_idle(MAX_EVENTS);

        let snapshot = sim.snapshot();
        assert!(snapshot.is_consistent());
        assert_eq!(snapshot.ring_order().len(), 3);

        sim.put(b, "x", vec![1]).unwrap();
        sim.run_until_idle(MAX_EVENTS);

        // Owner plus both neighbors hold the value in a ring of three.
        for peer in sim.peers() {
            assert_eq!(peer.inner().store().get("x"), Some(&vec![1]));
        }

        let handle = sim.get(c, "x").unwrap();
        sim.run_until_idle(MAX_EVENTS);
        assert_eq!(handle.try_take(), Some(Lookup::Found(vec![1])));
    }

    #[test]
    fn test_replicas_on_owner_neighbors() {
        let (mut sim, peers) = ScenarioBuilder::new(8).with_seed(5).join_all().build();
        sim.run_until_idle(MAX_EVENTS);
        sim.put(peers[3], "La clef", b"La valeur".to_vec()).unwrap();
        sim.run_until_idle(MAX_EVENTS);

        let holders: Vec<_> = sim
            .peers()
            .iter()
            .filter(|p| p.inner().store().contains_key("La clef"))
            .collect();
        assert_eq!(holders.len(), 3);

        // Holders are three consecutive ring members.
        let order = sim.snapshot().ring_order();
        let position = |address: PeerAddress| order.iter().position(|r| r.address == address);
        let mut positions: Vec<usize> = holders
            .iter()
            .filter_map(|p| position(p.address()))
            .collect();
        positions.sort_unstable();
        let n = order.len();
        let consecutive = (0..n).any(|start| {
            let mut window: Vec<usize> = (0..3).map(|k| (start + k) % n).collect();
            window.sort_unstable();
            window == positions
        });
        assert!(consecutive, "holders {:?} are not adjacent", positions);
    }

    #[test]
    fn test_get_twice_for_missing_key() {
        let (mut sim, peers) = ScenarioBuilder::new(5).with_seed(21).join_all().build();
        sim.run_until_idle(MAX_EVENTS);

        let first = sim.get(peers[1], "never written").unwrap();
        let second = sim.get(peers[1], "never written").unwrap();
        sim.run_until_idle(MAX_EVENTS);

        assert_eq!(first.try_take(), Some(Lookup::NotFound));
        assert_eq!(second.try_take(), Some(Lookup::NotFound));
        for peer in sim.peers() {
            assert!(peer.inner().store().is_empty());
        }
    }

    #[test]
    fn test_demo_scenario() {
        let (mut sim, _) = demo_scenario(10, 42, LatencyRange::default()).build();
        let result = sim.run_until_idle(MAX_EVENTS);

        assert!(result.queue_exhausted);
        assert_eq!(result.metrics.actions_failed, 0);
        assert_eq!(result.final_active_count(), 9);
        assert!(result.consistent());

        let results = sim.get_results();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].result,
            Some(Lookup::Found(b"La valeur".to_vec()))
        );

        let messages = sim
            .take_events()
            .into_iter()
            .filter(|r| matches!(r.event, PeerEvent::MessageReceived { .. }))
            .count();
        assert_eq!(messages, 3);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn proptest_ring_closure(seed in any::<u64>(), peers in 1usize..24) {
                let result = ScenarioBuilder::new(peers)
                    .with_seed(seed)
                    .join_all()
                    .build()
                    .0
                    .run_until_idle(MAX_EVENTS);

                prop_assert!(result.queue_exhausted);
                prop_assert_eq!(result.final_active_count(), peers);
                prop_assert!(result.consistent());
            }

            #[test]
            fn proptest_put_get_roundtrip(
                seed in any::<u64>(),
                peers in 2usize..16,
                key in "[a-z]{1,12}",
                value in proptest::collection::vec(any::<u8>(), 0..16),
                writer in any::<prop::sample::Index>(),
                reader in any::<prop::sample::Index>(),
            ) {
                let (mut sim, addresses) = ScenarioBuilder::new(peers)
                    .with_seed(seed)
                    .join_all()
                    .build();
                sim.run_until_idle(MAX_EVENTS);

                sim.put(*writer.get(&addresses), &key, value.clone()).unwrap();
                sim.run_until_idle(MAX_EVENTS);
                let handle = sim.get(*reader.get(&addresses), &key).unwrap();
                sim.run_until_idle(MAX_EVENTS);

                prop_assert_eq!(handle.try_take(), Some(Lookup::Found(value)));
            }

            #[test]
            fn proptest_routing_walk_is_bounded(seed in any::<u64>(), peers in 1usize..10) {
                // Without shortcuts every routed packet walks the ring.
                let (mut sim, addresses) = ScenarioBuilder::new(peers)
                    .with_seed(seed)
                    .with_address_cache_capacity(0)
                    .join_all()
                    .build();
                prop_assert!(sim.run_until_idle(MAX_EVENTS).queue_exhausted);
                sim.take_events();

                let mut ids: Vec<PeerId> = sim.peers().iter().map(|p| p.id()).collect();
                ids.sort_unstable();
                let mut missing = vec![PeerId::MIN, PeerId::MAX];
                if ids.len() > 1 {
                    missing.push(PeerId::midpoint(ids[0], ids[1]));
                }
                missing.retain(|id| !ids.contains(id));
                let max_hops = peers as u64 - 1;

                for &from in &addresses {
                    for &to in &addresses {
                        let target = sim.peer(to).map(|p| p.id()).unwrap();
                        let before = sim.metrics().packets_scheduled;
                        sim.send_message(from, target, "ping").unwrap();
                        let result = sim.run_until_idle(MAX_EVENTS);

                        prop_assert!(result.queue_exhausted);
                        prop_assert!(result.metrics.packets_scheduled - before <= max_hops);
                        let received: Vec<_> = sim
                            .take_events()
                            .into_iter()
                            .filter(|r| matches!(r.event, PeerEvent::MessageReceived { .. }))
                            .collect();
                        prop_assert_eq!(received.len(), 1);
                        prop_assert_eq!(received[0].peer, to);
                    }

                    for &target in &missing {
                        let before = sim.metrics().packets_scheduled;
                        sim.send_message(from, target, "ping").unwrap();
                        let result = sim.run_until_idle(MAX_EVENTS);

                        // Out to the gap, then the notice walks back.
                        prop_assert!(result.queue_exhausted);
                        prop_assert!(result.metrics.packets_scheduled - before <= 2 * max_hops);
                        let failed: Vec<_> = sim
                            .take_events()
                            .into_iter()
                            .filter(|r| matches!(r.event, PeerEvent::DeliveryFailed { .. }))
                            .collect();
                        prop_assert_eq!(failed.len(), 1);
                        prop_assert_eq!(failed[0].peer, from);
                    }
                }
            }
        }
    }
}
