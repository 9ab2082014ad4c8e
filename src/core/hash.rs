//! Domain-Separated Hashing
//!
//! Every digest in the protocol goes through SHA-256 with a domain prefix:
//! - Ledger map leaves and nodes
//! - Account-to-ledger-key derivation
//! - Action log chaining
//! - Signed message digests (channel proofs, signed calls)

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type Hash256 = [u8; 32];

/// Incremental hasher with a domain separator.
///
/// Wraps SHA-256 with helpers for the integer types the protocol commits to.
/// Order of updates is part of the encoding.
pub struct DomainHasher {
    hasher: Sha256,
}

impl DomainHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u64 value (little-endian).
    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i64 value (little-endian, two's complement).
    #[inline]
    pub fn update_i64(&mut self, value: i64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Update with a 32-byte digest.
    #[inline]
    pub fn update_hash(&mut self, hash: &Hash256) {
        self.hasher.update(hash);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> Hash256 {
        self.hasher.finalize().into()
    }
}

/// Compute hash with domain separator.
pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    hasher.finalize().into()
}
