#![forbid(unsafe_code)]
//! ringdht - Self-organizing ring DHT protocol
//!
//! Peers arrange themselves into a doubly-linked ring ordered by a 64-bit
//! identifier and provide id-addressed messaging and a replicated key-value
//! store on top of it.
//!
//! # Key Properties
//!
//! - Joins walk the ring by id comparison until the joiner's slot is found
//! - The seam between the largest and smallest id is an ordinary link
//! - Each peer owns the ids up to the midpoints with its neighbors
//! - Values are stored on the owner and replicated to both neighbors
//! - Undeliverable traffic is reported back to its sender
//!
//! The crate does no I/O of its own. Outgoing packets go through the
//! [`Transport`] trait and incoming ones are fed to [`Peer::handle_packet`],
//! so any event loop (the `ringsim` simulator, or a test) can drive it.
//!
//! # Example
//!
//! ```text
//! use ringdht::{Peer, PeerAddress, PeerConfig};
//!
//! // Implement Transport and Random for your environment...
//!
//! let mut first = Peer::new(PeerAddress::new(0), transport, random, PeerConfig::default());
//! first.awake_as_initial()?;
//!
//! let mut second = Peer::new(PeerAddress::new(1), transport, random, PeerConfig::default());
//! second.awake(first.address())?;
//!
//! // Deliver each sent envelope to `handle_packet` on its destination...
//!
//! let handle = second.get("La clef")?;
//! ```
//!
//! # Module Structure
//!
//! - [`id`] - Identifiers, addresses and key hashing
//! - [`packet`] - Packet kinds exchanged between peers
//! - [`peer`] - Peer state machine and public API
//! - [`ring`] - Join, discovery, neighbor switch, leave
//! - [`routing`] - Id-based routing and failure notices
//! - [`dht`] - Put, get and replication
//! - [`store`] - Local table and pending gets
//! - [`traits`] - Transport and Random traits
//! - [`config`] - Per-peer runtime configuration
//! - [`time`] - Timestamp and Duration types
//! - [`types`] - Errors, events and metrics

// Mock implementations are for tests only.
#[cfg(all(feature = "test-support", not(test), not(debug_assertions)))]
compile_error!("The `test-support` feature must not be enabled in release builds.");

pub mod config;
pub mod dht;
pub mod id;
pub mod packet;
pub mod peer;
pub mod ring;
pub mod routing;
pub mod store;
pub mod time;
pub mod traits;
pub mod types;

// Re-export main types at crate root
pub use config::{LatencyRange, PeerConfig};
pub use dht::Placement;
pub use id::{PeerAddress, PeerId, PeerRef};
pub use packet::{
    Envelope, Key, Packet, Routed, RoutedBody, Side, UndeliverableReason, Value,
};
pub use peer::{LifecycleState, Peer};
pub use store::{GetHandle, Lookup, Store};
pub use time::{Duration, Timestamp};
pub use traits::{Random, Transport};
pub use types::{Error, Event, PeerMetrics};
