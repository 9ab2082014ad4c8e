//! Account Identities
//!
//! Accounts are identified by their Ed25519 public key. The ledger never
//! stores accounts directly: each account maps to a 256-bit ledger key
//! derived by domain-separated hashing.

use std::fmt;

use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Serialize, Deserialize};

use super::hash::{hash_with_domain, Hash256};

/// Domain separator for account → ledger key derivation.
const ACCOUNT_KEY_DOMAIN: &[u8] = b"CHANNEL_CUSTODY_ACCOUNT_KEY_V1";

/// Position of an account in the authenticated ledger map.
pub type LedgerKey = Hash256;

/// Account identifier (Ed25519 public key bytes).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// Create from raw public key bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Identity of a verifying key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }

    /// Identity of the public half of a signing key.
    pub fn from_signing_key(key: &SigningKey) -> Self {
        Self::from_verifying_key(&key.verifying_key())
    }

    /// Decode the public key.
    ///
    /// Fails if the bytes are not a valid compressed Edwards point.
    pub fn verifying_key(&self) -> Result<VerifyingKey, ed25519_dalek::SignatureError> {
        VerifyingKey::from_bytes(&self.0)
    }

    /// Ledger map key for this account.
    pub fn ledger_key(&self) -> LedgerKey {
        hash_with_domain(ACCOUNT_KEY_DOMAIN, &self.0)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First four bytes in hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<&SigningKey> for AccountId {
    fn from(key: &SigningKey) -> Self {
        Self::from_signing_key(key)
    }
}
