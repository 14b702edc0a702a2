//! Key-value storage on top of the ring.
//!
//! A key is hashed onto the id space. The owner of a hash is the peer whose
//! partition contains it, where partition boundaries sit at the midpoint
//! between adjacent ids: the first peer also owns everything below its id and
//! the last peer everything above. A boundary value belongs to the upper peer.
//!
//! The owner stores the pair and replicates it to both neighbors, so any
//! peer whose `[left, right]` span covers a hash can answer a get for it.
//!
//! ```text
//!     first          middle           last
//!   ----[A]-----|-----[B]-----|-----[C]----
//!   ..owned by A | owned by B  | owned by C..
//!            mid(A,B)      mid(B,C)
//! ```

use tracing::{debug, trace};

use crate::id::{PeerId, PeerRef};
use crate::packet::{Key, Packet, Routed, RoutedBody, Value};
use crate::peer::Peer;
use crate::store::GetHandle;
use crate::traits::{Random, Transport};
use crate::types::{Error, Event};

/// Where a hash lives relative to a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Inside this peer's partition.
    Local,
    /// Owned by some peer to the left.
    Left,
    /// Owned by some peer to the right.
    Right,
}

impl<T, R> Peer<T, R>
where
    T: Transport,
    R: Random,
{
    /// Store `value` under `key` somewhere in the ring.
    pub fn put(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Result<(), Error> {
        self.on_put(key.into(), value.into())
    }

    /// Look up `key`.
    ///
    /// The returned handle resolves when the response comes back, never
    /// before this call returns: a peer that can answer from its own table
    /// queues the response to itself. Every pending handle for the same key
    /// on this peer resolves together.
    pub fn get(&mut self, key: impl Into<Key>) -> Result<GetHandle, Error> {
        let key = key.into();
        self.neighbors()?;
        let handle = self.store_mut().register_get(&key);
        let requester = self.peer_ref();
        self.on_get(requester, key)?;
        Ok(handle)
    }

    /// Partition bounds `[lo, hi)` this peer owns. `None` means unbounded.
    pub fn partition(&self) -> Result<(Option<PeerId>, Option<PeerId>), Error> {
        let (left, right) = self.neighbors()?;
        if self.is_solitary() {
            return Ok((None, None));
        }
        let lo = if self.is_first()? {
            None
        } else {
            Some(PeerId::midpoint(left.id, self.id()))
        };
        let hi = if self.is_last()? {
            None
        } else {
            Some(PeerId::midpoint(self.id(), right.id))
        };
        Ok((lo, hi))
    }

    /// Which direction a put for `hash` should travel.
    pub fn placement(&self, hash: PeerId) -> Result<Placement, Error> {
        let (lo, hi) = self.partition()?;
        if hi.is_some_and(|hi| hash >= hi) {
            return Ok(Placement::Right);
        }
        if lo.is_some_and(|lo| hash < lo) {
            return Ok(Placement::Left);
        }
        Ok(Placement::Local)
    }

    pub(crate) fn on_put(&mut self, key: Key, value: Value) -> Result<(), Error> {
        let (left, right) = self.neighbors()?;
        let hash = PeerId::from_key(&key);
        match self.placement(hash)? {
            Placement::Local => {
                self.store_owned(key, value, hash, left, right);
            }
            Placement::Right => {
                trace!(peer = %self.id(), %key, %hash, next = %right, "forwarding put right");
                self.forward(right.address, Packet::Put { key, value });
            }
            Placement::Left => {
                trace!(peer = %self.id(), %key, %hash, next = %left, "forwarding put left");
                self.forward(left.address, Packet::Put { key, value });
            }
        }
        Ok(())
    }

    fn store_owned(&mut self, key: Key, value: Value, hash: PeerId, left: PeerRef, right: PeerRef) {
        debug!(peer = %self.id(), %key, %hash, "storing owned value");
        self.store_mut().insert(key.clone(), value.clone());

        let me = self.address();
        let mut targets = vec![left];
        if right.address != left.address {
            targets.push(right);
        }
        for neighbor in targets.into_iter().filter(|n| n.address != me) {
            debug!(peer = %self.id(), %key, %neighbor, "replicating value");
            self.send(
                neighbor.address,
                Packet::Replicate {
                    key: key.clone(),
                    value: value.clone(),
                },
            );
        }
    }

    pub(crate) fn on_replicate(&mut self, key: Key, value: Value) {
        debug!(peer = %self.id(), %key, "applying replica");
        self.store_mut().insert(key, value);
        self.metrics_mut().replicas_applied += 1;
    }

    pub(crate) fn on_get(&mut self, requester: PeerRef, key: Key) -> Result<(), Error> {
        let (left, right) = self.neighbors()?;
        let hash = PeerId::from_key(&key);

        if !self.is_solitary() {
            if hash > right.id && !self.is_last()? {
                trace!(peer = %self.id(), %key, %hash, next = %right, "forwarding get right");
                self.forward(right.address, Packet::Get { requester, key });
                return Ok(());
            }
            if hash < left.id && !self.is_first()? {
                trace!(peer = %self.id(), %key, %hash, next = %left, "forwarding get left");
                self.forward(left.address, Packet::Get { requester, key });
                return Ok(());
            }
        }

        let value = self.store().get(&key).cloned();
        debug!(peer = %self.id(), %key, found = value.is_some(), requester = %requester, "answering get");
        let response = Routed::new(
            self.peer_ref(),
            requester.id,
            RoutedBody::GetResponse { key, value },
        );
        if requester.id == self.id() {
            self.send_now(self.address(), Packet::Routed(response));
            return Ok(());
        }
        self.cache_address(requester);
        self.route(response)
    }

    pub(crate) fn on_get_response(&mut self, key: Key, value: Option<Value>) {
        let waiters = self.store_mut().resolve_gets(&key, value.clone());
        debug!(peer = %self.id(), %key, found = value.is_some(), waiters, "get resolved");
        self.push_event(Event::GetResolved {
            key,
            value,
            waiters,
        });
    }
}
