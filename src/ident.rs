//! Numeric identifier codec.
//!
//! Requests and channels are named on the wire by a single signed 32-bit
//! integer that packs an origin flag and a non-negative id:
//! ```text
//! wire = (id << 1) | (origin == Client ? 0 : 1)
//! ```
//! Decoding is the exact inverse (`id = wire >>> 1`, origin from bit 0).
//! Keeping the identifier to one integer instead of a tagged pair matters on
//! a high-volume request/reply transport.
//!
//! The id range is checked once, at construction; encoding itself is a pure
//! bit-packing function with no hidden state.
//!
//! # Example
//!
//! ```
//! use remoting_core::ident::{IdOrigin, NumericId};
//!
//! let id = NumericId::new(IdOrigin::Client, 5).unwrap();
//! assert_eq!(id.to_wire(), 10);
//! assert_eq!(NumericId::from_wire(10), id);
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{RemotingError, Result};

/// Wire size of an encoded identifier in bytes.
pub const IDENT_SIZE: usize = 4;

/// Largest representable id. The id is shifted left by one bit on the wire,
/// so it must fit in 31 bits.
pub const MAX_ID: u32 = 0x7FFF_FFFF;

/// Which side of the transport issued an identifier.
///
/// `Client` marks locally issued ids, `Server` remotely issued ones; the two
/// spaces never collide on the wire because the origin occupies bit 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdOrigin {
    /// Issued by the local (client) side. Encodes bit 0 = 0.
    Client,
    /// Issued by the remote (server) side. Encodes bit 0 = 1.
    Server,
}

impl IdOrigin {
    /// The value of wire bit 0 for this origin.
    #[inline]
    fn wire_bit(self) -> u32 {
        match self {
            IdOrigin::Client => 0,
            IdOrigin::Server => 1,
        }
    }
}

/// A compact wire-encoded (origin, id) pair.
///
/// Two identifiers are equal iff their encoded wire forms are equal, and the
/// hash is the wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericId {
    origin: IdOrigin,
    id: u32,
}

impl NumericId {
    /// Create a new identifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `id` exceeds [`MAX_ID`] (it would lose
    /// its top bit in the shift). This is the only range check; `to_wire`
    /// never fails.
    pub fn new(origin: IdOrigin, id: u32) -> Result<Self> {
        if id > MAX_ID {
            return Err(RemotingError::InvalidArgument(format!(
                "id {} exceeds maximum {}",
                id, MAX_ID
            )));
        }
        Ok(Self { origin, id })
    }

    /// Get the origin flag.
    #[inline]
    pub fn origin(&self) -> IdOrigin {
        self.origin
    }

    /// Get the numeric id.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Whether this id was issued by the local (client) side.
    #[inline]
    pub fn is_client(&self) -> bool {
        self.origin == IdOrigin::Client
    }

    /// Pack into the signed 32-bit wire form.
    #[inline]
    pub fn to_wire(&self) -> i32 {
        ((self.id << 1) | self.origin.wire_bit()) as i32
    }

    /// Unpack from the signed 32-bit wire form.
    ///
    /// Total: every `i32` decodes to a valid identifier (the id is the upper
    /// 31 bits, so it cannot be out of range).
    #[inline]
    pub fn from_wire(wire: i32) -> Self {
        let raw = wire as u32;
        Self {
            origin: if raw & 1 == 0 {
                IdOrigin::Client
            } else {
                IdOrigin::Server
            },
            id: raw >> 1,
        }
    }

    /// Encode to bytes (Big Endian), matching the rest of the wire format.
    pub fn encode(&self) -> [u8; IDENT_SIZE] {
        self.to_wire().to_be_bytes()
    }

    /// Decode from bytes (Big Endian).
    ///
    /// Returns `None` if the buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < IDENT_SIZE {
            return None;
        }
        let wire = i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        Some(Self::from_wire(wire))
    }
}

impl std::hash::Hash for NumericId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_i32(self.to_wire());
    }
}

impl std::fmt::Display for NumericId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = if self.is_client() { "client" } else { "server" };
        write!(f, "{}:{}", side, self.id)
    }
}

impl Serialize for NumericId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.to_wire())
    }
}

impl<'de> Deserialize<'de> for NumericId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let wire = i32::deserialize(deserializer)?;
        Ok(NumericId::from_wire(wire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(id: &NumericId) -> u64 {
        let mut h = DefaultHasher::new();
        id.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_known_wire_vectors() {
        assert_eq!(NumericId::new(IdOrigin::Client, 5).unwrap().to_wire(), 10);
        assert_eq!(NumericId::new(IdOrigin::Server, 5).unwrap().to_wire(), 11);

        let decoded = NumericId::from_wire(10);
        assert_eq!(decoded.origin(), IdOrigin::Client);
        assert_eq!(decoded.id(), 5);

        let decoded = NumericId::from_wire(11);
        assert_eq!(decoded.origin(), IdOrigin::Server);
        assert_eq!(decoded.id(), 5);
    }

    #[test]
    fn test_roundtrip_across_range() {
        let ids = [0, 1, 2, 41, 1 << 20, MAX_ID - 1, MAX_ID];
        for origin in [IdOrigin::Client, IdOrigin::Server] {
            for &id in &ids {
                let original = NumericId::new(origin, id).unwrap();
                assert_eq!(NumericId::from_wire(original.to_wire()), original);
            }
        }
    }

    #[test]
    fn test_max_id_wire_form() {
        // MAX_ID shifted left fills the full 32 bits without losing anything.
        let client = NumericId::new(IdOrigin::Client, MAX_ID).unwrap();
        assert_eq!(client.to_wire() as u32, 0xFFFF_FFFE);
        let server = NumericId::new(IdOrigin::Server, MAX_ID).unwrap();
        assert_eq!(server.to_wire() as u32, 0xFFFF_FFFF);
        assert_eq!(NumericId::from_wire(server.to_wire()), server);
    }

    #[test]
    fn test_out_of_range_id_rejected() {
        for id in [MAX_ID + 1, u32::MAX] {
            let result = NumericId::new(IdOrigin::Client, id);
            assert!(matches!(result, Err(RemotingError::InvalidArgument(_))));
        }
    }

    #[test]
    fn test_equality_and_hash_follow_wire_form() {
        let a = NumericId::new(IdOrigin::Client, 7).unwrap();
        let b = NumericId::from_wire(a.to_wire());
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        // Same id, different origin: different wire form, not equal.
        let c = NumericId::new(IdOrigin::Server, 7).unwrap();
        assert_ne!(a, c);
        assert_ne!(a.to_wire(), c.to_wire());
    }

    #[test]
    fn test_byte_encode_decode_roundtrip() {
        let original = NumericId::new(IdOrigin::Server, 0x1234).unwrap();
        let bytes = original.encode();
        assert_eq!(bytes.len(), IDENT_SIZE);
        let decoded = NumericId::decode(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_byte_encoding_is_big_endian() {
        // wire = (5 << 1) | 1 = 11 = 0x0000000B
        let id = NumericId::new(IdOrigin::Server, 5).unwrap();
        assert_eq!(id.encode(), [0x00, 0x00, 0x00, 0x0B]);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        assert!(NumericId::decode(&[0x00, 0x00, 0x0B]).is_none());
    }

    #[test]
    fn test_serde_uses_packed_wire_form() {
        // The identifier serializes as its packed i32, not field-wise.
        let id = NumericId::new(IdOrigin::Server, 5).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "11");

        // MAX_ID on the server side fills all 32 bits: -1 as a signed wire
        // integer.
        let max = NumericId::new(IdOrigin::Server, MAX_ID).unwrap();
        assert_eq!(serde_json::to_string(&max).unwrap(), "-1");

        let decoded: NumericId = serde_json::from_str("11").unwrap();
        assert_eq!(decoded, id);
        let decoded: NumericId = serde_json::from_str("-1").unwrap();
        assert_eq!(decoded, max);
    }

    #[test]
    fn test_display() {
        let id = NumericId::new(IdOrigin::Client, 42).unwrap();
        assert_eq!(id.to_string(), "client:42");
        let id = NumericId::new(IdOrigin::Server, 42).unwrap();
        assert_eq!(id.to_string(), "server:42");
    }
}
