//! Event types and priority queue for discrete event simulation.

use std::cmp::Ordering;

use ringdht::{Key, Packet, PeerAddress, Timestamp, Value};

/// Unique sequence number for deterministic event ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Which peer a scripted action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    /// A specific peer.
    Peer(PeerAddress),
    /// Any active peer, chosen uniformly when the action runs.
    AnyActive,
}

impl From<PeerAddress> for Pick {
    fn from(address: PeerAddress) -> Self {
        Pick::Peer(address)
    }
}

/// Scenario actions that can be scheduled during simulation.
#[derive(Debug, Clone)]
pub enum ScenarioAction {
    /// Seed a new ring with this peer.
    AwakeAsInitial { peer: PeerAddress },
    /// Join through a random active contact.
    Awake { peer: PeerAddress },
    /// Leave the ring.
    Leave { peer: Pick },
    /// Store a value.
    Put { peer: Pick, key: Key, value: Value },
    /// Look a value up. The handle is kept for `Simulator::get_results`.
    Get { peer: Pick, key: Key },
    /// Send a chat message to another peer's id.
    SendMessage { from: Pick, to: Pick, text: String },
    /// Take a ring snapshot for metrics.
    TakeSnapshot,
}

/// Events in the discrete event simulation.
#[derive(Debug, Clone)]
pub enum Event {
    /// Deliver a packet to a peer.
    Delivery { to: PeerAddress, packet: Packet },
    /// Execute a scenario action.
    ScenarioAction(ScenarioAction),
}

/// A scheduled event with timestamp and sequence number for ordering.
#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    /// When the event should occur.
    pub time: Timestamp,
    /// Sequence number for deterministic ordering of same-time events.
    pub seq: SequenceNumber,
    /// The event to process.
    pub event: Event,
}

impl ScheduledEvent {
    pub fn new(time: Timestamp, seq: SequenceNumber, event: Event) -> Self {
        Self { time, seq, event }
    }
}

// Min-heap ordering (BinaryHeap is a max-heap, so compare reversed).
impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier time first, then earlier sequence number.
        match other.time.cmp(&self.time) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BinaryHeap;

    use super::*;

    fn snapshot_at(ticks: u64, seq: u64) -> ScheduledEvent {
        ScheduledEvent::new(
            Timestamp::from_ticks(ticks),
            SequenceNumber::new(seq),
            Event::ScenarioAction(ScenarioAction::TakeSnapshot),
        )
    }

    #[test]
    fn test_event_ordering() {
        let e1 = snapshot_at(10, 1);
        let e2 = snapshot_at(5, 2);

        // e2 has earlier time, so it should be "greater" in min-heap terms
        assert!(e2 > e1);
    }

    #[test]
    fn test_same_time_sequence_ordering() {
        let e1 = snapshot_at(10, 1);
        let e2 = snapshot_at(10, 2);

        // Same time, e1 was scheduled first so it is processed first
        assert!(e1 > e2);
    }

    #[test]
    fn test_heap_pops_in_time_then_schedule_order() {
        let mut heap = BinaryHeap::new();
        heap.push(snapshot_at(20, 0));
        heap.push(snapshot_at(10, 1));
        heap.push(snapshot_at(20, 2));
        heap.push(snapshot_at(10, 3));

        let order: Vec<(u64, u64)> = std::iter::from_fn(|| heap.pop())
            .map(|e| (e.time.as_ticks(), e.seq.value()))
            .collect();
        assert_eq!(order, vec![(10, 1), (10, 3), (20, 0), (20, 2)]);
    }
}
