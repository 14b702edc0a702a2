//! Id-based routing of `Routed` packets.
//!
//! Each hop first tries the address cache for a direct shortcut to the
//! target. Otherwise the packet moves one neighbor toward the target id.
//! When the target falls strictly between two adjacent peers, or past the
//! seam, it does not exist: the hop sends an `Undeliverable` notice back to
//! the original sender instead.
//!
//! Every hop remembers the sender's address, so the notice and any
//! `GetResponse` usually take the shortcut home. A shortcut can outlive the
//! peer it points at: a departed peer answers such packets with a
//! `PeerLeft` notice sent straight to the sender, which then drops the
//! stale entry.

use std::cmp::Ordering;

use tracing::{debug, error, info, trace};

use crate::id::PeerId;
use crate::packet::{Packet, Routed, RoutedBody, UndeliverableReason};
use crate::peer::Peer;
use crate::traits::{Random, Transport};
use crate::types::{Error, Event};

impl<T, R> Peer<T, R>
where
    T: Transport,
    R: Random,
{
    /// Send a chat message to the peer with id `target`.
    pub fn send_message(&mut self, target: PeerId, text: impl Into<String>) -> Result<(), Error> {
        let routed = Routed::new(
            self.peer_ref(),
            target,
            RoutedBody::Message { text: text.into() },
        );
        self.route(routed)
    }

    /// Routed packet arriving from the network.
    pub(crate) fn on_routed(&mut self, routed: Routed) -> Result<(), Error> {
        if self.is_idle() {
            self.notify_departed(routed);
            return Err(Error::NotActive);
        }
        self.route(routed)
    }

    /// Move a routed packet one step, or handle it here.
    pub fn route(&mut self, routed: Routed) -> Result<(), Error> {
        let (left, right) = self.neighbors()?;
        self.cache_address(routed.sender);

        if routed.target != self.id() {
            if let Some(address) = self.cached_address(routed.target) {
                trace!(peer = %self.id(), target = %routed.target, %address, "routing via cached address");
                self.forward(address, Packet::Routed(routed));
                return Ok(());
            }
        }

        match routed.target.cmp(&self.id()) {
            Ordering::Equal => {
                self.deliver_local(routed);
                Ok(())
            }
            Ordering::Greater => {
                // Nothing larger lies right of us across the seam.
                if right.id <= self.id() || routed.target < right.id {
                    self.target_missing(routed)
                } else {
                    trace!(peer = %self.id(), target = %routed.target, next = %right, "routing right");
                    self.forward(right.address, Packet::Routed(routed));
                    Ok(())
                }
            }
            Ordering::Less => {
                if left.id >= self.id() || routed.target > left.id {
                    self.target_missing(routed)
                } else {
                    trace!(peer = %self.id(), target = %routed.target, next = %left, "routing left");
                    self.forward(left.address, Packet::Routed(routed));
                    Ok(())
                }
            }
        }
    }

    fn target_missing(&mut self, routed: Routed) -> Result<(), Error> {
        self.metrics_mut().routing_failures += 1;
        let reason = UndeliverableReason::NodeNotFound;

        if routed.sender.id == self.id() {
            error!(peer = %self.id(), target = %routed.target, %reason, "could not deliver packet");
            self.push_event(Event::DeliveryFailed {
                target: routed.target,
                reason,
            });
            return Ok(());
        }

        if matches!(routed.body, RoutedBody::Undeliverable { .. }) {
            debug!(peer = %self.id(), target = %routed.target, "dropping undeliverable notice for a missing sender");
            return Ok(());
        }

        error!(peer = %self.id(), target = %routed.target, sender = %routed.sender, %reason, "returning undeliverable notice");
        let notice = Routed::new(
            self.peer_ref(),
            routed.sender.id,
            RoutedBody::Undeliverable {
                reason,
                original: Box::new(routed),
            },
        );
        self.route(notice)
    }

    /// Reached through a stale cached address while idle.
    fn notify_departed(&mut self, routed: Routed) {
        let is_notice = matches!(routed.body, RoutedBody::Undeliverable { .. });
        if is_notice || routed.sender.id == self.id() {
            return;
        }
        let reason = UndeliverableReason::PeerLeft;
        debug!(peer = %self.id(), sender = %routed.sender, %reason, "bouncing packet back to its sender");
        let to = routed.sender.address;
        let notice = Routed::new(
            self.peer_ref(),
            routed.sender.id,
            RoutedBody::Undeliverable {
                reason,
                original: Box::new(routed),
            },
        );
        self.send(to, Packet::Routed(notice));
    }

    fn deliver_local(&mut self, routed: Routed) {
        let from = routed.sender.id;
        match routed.body {
            RoutedBody::Message { text } => {
                info!(peer = %self.id(), %from, %text, "received message");
                self.push_event(Event::MessageReceived { from, text });
            }
            RoutedBody::Undeliverable { reason, original } => {
                error!(peer = %self.id(), target = %original.target, %reason, "was not able to deliver a packet");
                self.forget_address(original.target);
                self.push_event(Event::DeliveryFailed {
                    target: original.target,
                    reason,
                });
            }
            RoutedBody::GetResponse { key, value } => self.on_get_response(key, value),
        }
    }
}
