//! Metrics collection for simulation analysis.

use ringdht::{PeerAddress, PeerId, PeerRef, Timestamp};

/// One peer's ring state at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerView {
    pub address: PeerAddress,
    pub id: PeerId,
    pub active: bool,
    pub left: Option<PeerRef>,
    pub right: Option<PeerRef>,
}

/// A snapshot of ring state at a point in time.
#[derive(Debug, Clone)]
pub struct RingSnapshot {
    /// When this snapshot was taken.
    pub time: Timestamp,
    /// Every peer, indexed by address.
    pub peers: Vec<PeerView>,
}

impl RingSnapshot {
    /// Create a new empty snapshot.
    pub fn new(time: Timestamp) -> Self {
        Self {
            time,
            peers: Vec::new(),
        }
    }

    /// Record a peer's state. Peers must be recorded in address order.
    pub fn record_peer(&mut self, view: PeerView) {
        self.peers.push(view);
    }

    fn view(&self, address: PeerAddress) -> Option<&PeerView> {
        self.peers.get(address.index())
    }

    /// Number of active peers.
    pub fn active_count(&self) -> usize {
        self.peers.iter().filter(|p| p.active).count()
    }

    /// Walk `right` pointers from the active peer with the smallest id.
    ///
    /// Stops on returning to the start, on a broken link, or after visiting
    /// every active peer once more than expected.
    pub fn ring_order(&self) -> Vec<PeerRef> {
        let Some(start) = self
            .peers
            .iter()
            .filter(|p| p.active)
            .min_by_key(|p| p.id)
        else {
            return Vec::new();
        };

        let limit = self.active_count() + 1;
        let mut order = vec![PeerRef::new(start.address, start.id)];
        let mut current = start;
        while order.len() < limit {
            let Some(next) = current.right.and_then(|r| self.view(r.address)) else {
                break;
            };
            if next.address == start.address || !next.active {
                break;
            }
            order.push(PeerRef::new(next.address, next.id));
            current = next;
        }
        order
    }

    /// Ring closure plus mutual neighbor agreement.
    ///
    /// Holds when the `right` walk visits every active peer exactly once and
    /// returns to its start, every `right` link is mirrored by a `left` link,
    /// and ids increase along the walk with exactly one wrap.
    pub fn is_consistent(&self) -> bool {
        let active = self.active_count();
        if active == 0 {
            return true;
        }

        let order = self.ring_order();
        if order.len() != active {
            return false;
        }

        let mut wraps = 0;
        for (i, at) in order.iter().enumerate() {
            let next = order[(i + 1) % order.len()];
            let Some(view) = self.view(at.address) else {
                return false;
            };
            let Some(next_view) = self.view(next.address) else {
                return false;
            };
            if view.right != Some(next) || next_view.left != Some(*at) {
                return false;
            }
            if next.id <= at.id {
                wraps += 1;
            }
        }
        wraps == 1
    }

    /// Ring as `id (#address) => id (#address) => ...`.
    pub fn display_ring(&self) -> String {
        self.ring_order()
            .iter()
            .map(|peer| peer.to_string())
            .collect::<Vec<_>>()
            .join(" => ")
    }
}

/// Simulation metrics collected over time.
#[derive(Debug, Clone, Default)]
pub struct SimMetrics {
    /// Packets handed to the event queue.
    pub packets_scheduled: u64,
    /// Packets accepted by their destination.
    pub packets_delivered: u64,
    /// Packets the destination refused (wrong lifecycle state).
    pub packets_rejected: u64,
    /// Scenario actions that ran.
    pub actions_executed: u64,
    /// Scenario actions that failed (no candidate peer, peer in wrong state).
    pub actions_failed: u64,
    /// Ring snapshots taken during the run.
    pub snapshots: Vec<RingSnapshot>,
}

impl SimMetrics {
    /// Create new empty metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a snapshot.
    pub fn add_snapshot(&mut self, snapshot: RingSnapshot) {
        self.snapshots.push(snapshot);
    }

    /// Get the latest snapshot.
    pub fn latest_snapshot(&self) -> Option<&RingSnapshot> {
        self.snapshots.last()
    }
}

/// Result of running a simulation.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// Final simulation time.
    pub end_time: Timestamp,
    /// Collected metrics.
    pub metrics: SimMetrics,
    /// Whether simulation ended due to event queue exhaustion (vs time or event limit).
    pub queue_exhausted: bool,
}

impl SimulationResult {
    /// Check whether the final ring is closed and consistent.
    pub fn consistent(&self) -> bool {
        self.metrics
            .latest_snapshot()
            .is_some_and(|s| s.is_consistent())
    }

    /// Number of active peers at the end.
    pub fn final_active_count(&self) -> usize {
        self.metrics
            .latest_snapshot()
            .map(|s| s.active_count())
            .unwrap_or(0)
    }

    /// The final ring, formatted for display.
    pub fn final_ring(&self) -> String {
        self.metrics
            .latest_snapshot()
            .map(|s| s.display_ring())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(address: usize, id: u64) -> PeerRef {
        PeerRef::new(PeerAddress::new(address), PeerId::new(id))
    }

    fn view(address: usize, id: u64, left: PeerRef, right: PeerRef) -> PeerView {
        PeerView {
            address: PeerAddress::new(address),
            id: PeerId::new(id),
            active: true,
            left: Some(left),
            right: Some(right),
        }
    }

    fn idle(address: usize, id: u64) -> PeerView {
        PeerView {
            address: PeerAddress::new(address),
            id: PeerId::new(id),
            active: false,
            left: None,
            right: None,
        }
    }

    /// 30 (#0), 10 (#1), 20 (#2) linked in id order.
    fn three_ring() -> RingSnapshot {
        let mut snapshot = RingSnapshot::new(Timestamp::ZERO);
        snapshot.record_peer(view(0, 30, r(2, 20), r(1, 10)));
        snapshot.record_peer(view(1, 10, r(0, 30), r(2, 20)));
        snapshot.record_peer(view(2, 20, r(1, 10), r(0, 30)));
        snapshot
    }

    #[test]
    fn test_ring_order_starts_at_smallest() {
        let snapshot = three_ring();
        assert_eq!(snapshot.ring_order(), vec![r(1, 10), r(2, 20), r(0, 30)]);
        assert!(snapshot.is_consistent());
    }

    #[test]
    fn test_display_ring() {
        let mut snapshot = RingSnapshot::new(Timestamp::ZERO);
        snapshot.record_peer(view(0, 0xa, r(1, 0xb), r(1, 0xb)));
        snapshot.record_peer(view(1, 0xb, r(0, 0xa), r(0, 0xa)));
        assert_eq!(
            snapshot.display_ring(),
            "000000000000000a (#0) => 000000000000000b (#1)"
        );
    }

    #[test]
    fn test_solitary_ring_is_consistent() {
        let mut snapshot = RingSnapshot::new(Timestamp::ZERO);
        snapshot.record_peer(view(0, 5, r(0, 5), r(0, 5)));
        snapshot.record_peer(idle(1, 9));
        assert!(snapshot.is_consistent());
        assert_eq!(snapshot.active_count(), 1);
    }

    #[test]
    fn test_empty_ring_is_consistent() {
        let mut snapshot = RingSnapshot::new(Timestamp::ZERO);
        snapshot.record_peer(idle(0, 9));
        assert!(snapshot.is_consistent());
        assert!(snapshot.ring_order().is_empty());
    }

    #[test]
    fn test_broken_back_pointer_detected() {
        let mut snapshot = three_ring();
        // 20 still thinks its left is 30.
        snapshot.peers[2].left = Some(r(0, 30));
        assert!(!snapshot.is_consistent());
    }

    #[test]
    fn test_unsorted_ring_detected() {
        // 10 -> 30 -> 20 -> 10: closed and mirrored, but wraps twice.
        let mut snapshot = RingSnapshot::new(Timestamp::ZERO);
        snapshot.record_peer(view(0, 30, r(1, 10), r(2, 20)));
        snapshot.record_peer(view(1, 10, r(2, 20), r(0, 30)));
        snapshot.record_peer(view(2, 20, r(0, 30), r(1, 10)));
        assert_eq!(snapshot.ring_order().len(), 3);
        assert!(!snapshot.is_consistent());
    }

    #[test]
    fn test_pointer_to_idle_peer_breaks_ring() {
        let mut snapshot = three_ring();
        snapshot.peers[0] = idle(0, 30);
        assert!(!snapshot.is_consistent());
    }
}
