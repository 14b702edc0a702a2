//! Identifier space shared by peers and keys.
//!
//! Peers and hashed keys live on the same 64-bit ring. Ordering is the plain
//! integer order; wraparound is handled by the callers that look at neighbor
//! pointers (a peer whose right neighbor has a smaller id sits on the seam).

use std::fmt;

use sha2::{Digest, Sha256};

/// Position on the identifier ring.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PeerId(u64);

impl PeerId {
    /// Smallest identifier.
    pub const MIN: PeerId = PeerId(0);

    /// Largest identifier.
    pub const MAX: PeerId = PeerId(u64::MAX);

    #[inline]
    pub const fn new(raw: u64) -> Self {
        PeerId(raw)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Hash a key into the identifier space.
    ///
    /// Takes the first eight bytes of the SHA-256 digest, big-endian.
    pub fn from_key(key: &str) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        PeerId(u64::from_be_bytes(head))
    }

    /// Arithmetic mean of two identifiers, without overflow.
    #[inline]
    pub const fn midpoint(a: PeerId, b: PeerId) -> PeerId {
        PeerId((a.0 / 2) + (b.0 / 2) + (a.0 & b.0 & 1))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({:016x})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Transport address of a peer.
///
/// Stable for the lifetime of the simulation. An address may point at a peer
/// that has since left the ring; delivering there is rejected by the peer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct PeerAddress(usize);

impl PeerAddress {
    #[inline]
    pub const fn new(index: usize) -> Self {
        PeerAddress(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to another peer: where to send, and where it sits on the ring.
///
/// Neighbor pointers are stored as `PeerRef`s, never as references to the
/// peer itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PeerRef {
    pub address: PeerAddress,
    pub id: PeerId,
}

impl PeerRef {
    pub const fn new(address: PeerAddress, id: PeerId) -> Self {
        Self { address, id }
    }
}

impl fmt::Display for PeerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint_no_overflow() {
        let mid = PeerId::midpoint(PeerId::MAX, PeerId::new(u64::MAX - 2));
        assert_eq!(mid, PeerId::new(u64::MAX - 1));

        let mid = PeerId::midpoint(PeerId::new(3), PeerId::new(5));
        assert_eq!(mid, PeerId::new(4));

        // Truncates toward the smaller id.
        let mid = PeerId::midpoint(PeerId::new(2), PeerId::new(5));
        assert_eq!(mid, PeerId::new(3));
    }

    #[test]
    fn test_midpoint_is_symmetric() {
        let a = PeerId::new(0x1234_5678_9abc_def1);
        let b = PeerId::new(0x0fed_cba9_8765_4321);
        assert_eq!(PeerId::midpoint(a, b), PeerId::midpoint(b, a));
        assert!(PeerId::midpoint(a, b) > b);
        assert!(PeerId::midpoint(a, b) < a);
    }

    #[test]
    fn test_key_hash_is_stable() {
        assert_eq!(PeerId::from_key("La clef"), PeerId::from_key("La clef"));
        assert_ne!(PeerId::from_key("La clef"), PeerId::from_key("La valeur"));
    }

    #[test]
    fn test_key_hash_matches_sha256_prefix() {
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(PeerId::from_key("abc"), PeerId::new(0xba78_16bf_8f01_cfea));
    }

    #[test]
    fn test_display_is_fixed_width_hex() {
        assert_eq!(PeerId::new(0xab).to_string(), "00000000000000ab");
        assert_eq!(PeerAddress::new(3).to_string(), "#3");
    }
}
