//! Ring membership: join, discovery walk, neighbor repair, leave.
//!
//! A joiner sends `Discovery` to any active contact. The packet walks the
//! ring by id comparison until it reaches the peer adjacent to the joiner's
//! slot. That peer answers with `Welcome`, tells the peer on the far side of
//! the slot to repoint with `SwitchNeighbor`, and adopts the joiner itself.
//!
//! The seam between the largest and smallest id is a valid insertion point:
//! a joiner larger than every id lands right of the last peer, a joiner
//! smaller than every id lands left of the first.

use std::cmp::Ordering;

use tracing::{debug, info, trace, warn};

use crate::id::{PeerAddress, PeerRef};
use crate::packet::{Packet, Side};
use crate::peer::Peer;
use crate::traits::{Random, Transport};
use crate::types::{Error, Event};

impl<T, R> Peer<T, R>
where
    T: Transport,
    R: Random,
{
    /// Become the first member of a new ring.
    pub fn awake_as_initial(&mut self) -> Result<(), Error> {
        if self.is_active() {
            return Err(Error::AlreadyActive);
        }
        let me = self.peer_ref();
        self.set_active(me, me);
        info!(peer = %self.id(), "created a new ring");
        self.push_event(Event::Joined {
            left: me,
            right: me,
        });
        Ok(())
    }

    /// Start joining the ring `contact` belongs to.
    ///
    /// The peer stays idle until the matching `Welcome` arrives.
    pub fn awake(&mut self, contact: PeerAddress) -> Result<(), Error> {
        if self.is_active() {
            return Err(Error::AlreadyActive);
        }
        info!(peer = %self.id(), %contact, "joining through contact");
        let joiner = self.peer_ref();
        self.send(contact, Packet::Discovery { joiner });
        Ok(())
    }

    /// Unlink from the ring.
    ///
    /// Each neighbor is told to point at the other. Nothing is handed off:
    /// values stored here survive only as replicas on the neighbors.
    pub fn leave(&mut self) -> Result<(), Error> {
        let (left, right) = self.neighbors()?;
        if !self.is_solitary() {
            self.send(
                left.address,
                Packet::SwitchNeighbor {
                    side: Side::Right,
                    neighbor: right,
                },
            );
            self.send(
                right.address,
                Packet::SwitchNeighbor {
                    side: Side::Left,
                    neighbor: left,
                },
            );
        }
        self.set_idle();
        info!(peer = %self.id(), "left the ring");
        self.push_event(Event::Left);
        Ok(())
    }

    pub(crate) fn on_discovery(&mut self, joiner: PeerRef) -> Result<(), Error> {
        let (left, right) = self.neighbors()?;
        let me = self.peer_ref();

        if self.is_solitary() {
            debug!(peer = %self.id(), %joiner, "welcoming second ring member");
            self.send(
                joiner.address,
                Packet::Welcome {
                    left: me,
                    right: me,
                },
            );
            self.set_left(joiner);
            self.set_right(joiner);
            self.push_event(Event::NeighborSwitched {
                side: Side::Left,
                neighbor: joiner,
            });
            self.push_event(Event::NeighborSwitched {
                side: Side::Right,
                neighbor: joiner,
            });
            return Ok(());
        }

        match joiner.id.cmp(&self.id()) {
            Ordering::Greater => {
                // Right wraps when we hold the largest id.
                if joiner.id < right.id || self.id() > right.id {
                    debug!(peer = %self.id(), %joiner, "welcoming new right neighbor");
                    self.send(joiner.address, Packet::Welcome { left: me, right });
                    self.send(
                        right.address,
                        Packet::SwitchNeighbor {
                            side: Side::Left,
                            neighbor: joiner,
                        },
                    );
                    self.set_right(joiner);
                    self.push_event(Event::NeighborSwitched {
                        side: Side::Right,
                        neighbor: joiner,
                    });
                } else {
                    trace!(peer = %self.id(), %joiner, next = %right, "forwarding discovery right");
                    self.forward(right.address, Packet::Discovery { joiner });
                }
            }
            Ordering::Less => {
                // Left wraps when we hold the smallest id.
                if joiner.id > left.id || self.id() < left.id {
                    debug!(peer = %self.id(), %joiner, "welcoming new left neighbor");
                    self.send(joiner.address, Packet::Welcome { left, right: me });
                    self.send(
                        left.address,
                        Packet::SwitchNeighbor {
                            side: Side::Right,
                            neighbor: joiner,
                        },
                    );
                    self.set_left(joiner);
                    self.push_event(Event::NeighborSwitched {
                        side: Side::Left,
                        neighbor: joiner,
                    });
                } else {
                    trace!(peer = %self.id(), %joiner, next = %left, "forwarding discovery left");
                    self.forward(left.address, Packet::Discovery { joiner });
                }
            }
            Ordering::Equal => {
                warn!(peer = %self.id(), %joiner, "dropping discovery from a peer with a colliding id");
            }
        }
        Ok(())
    }

    pub(crate) fn on_welcome(&mut self, left: PeerRef, right: PeerRef) -> Result<(), Error> {
        if self.is_active() {
            return Err(Error::AlreadyActive);
        }
        self.set_active(left, right);
        info!(peer = %self.id(), %left, %right, "joined the ring");
        self.push_event(Event::Joined { left, right });
        Ok(())
    }

    pub(crate) fn on_switch_neighbor(&mut self, side: Side, neighbor: PeerRef) -> Result<(), Error> {
        self.neighbors()?;
        match side {
            Side::Left => self.set_left(neighbor),
            Side::Right => self.set_right(neighbor),
        }
        debug!(peer = %self.id(), %side, %neighbor, "switched neighbor");
        self.push_event(Event::NeighborSwitched { side, neighbor });
        Ok(())
    }
}
