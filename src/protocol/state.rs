//! Persisted Protocol State
//!
//! Three fields carry the protocol: the committed ledger root, the trusted
//! oracle key and the action log cursor. A fourth, the signed-call nonce,
//! makes each signed call single-use.

use serde::{Serialize, Deserialize};

use crate::core::account::AccountId;
use crate::core::hash::Hash256;
use crate::proof::merkle::empty_root;
use crate::settlement::queue::ActionsCursor;

/// Committed protocol state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolState {
    /// Root of the collateral ledger map.
    pub root: Hash256,
    /// Trusted randomness oracle (unset until rotated in).
    pub oracle_key: Option<AccountId>,
    /// How much of the action log has been folded into `root`.
    pub actions_cursor: ActionsCursor,
    /// Nonce the next signed call must carry.
    #[serde(default)]
    pub call_nonce: u64,
}

impl Default for ProtocolState {
    fn default() -> Self {
        Self::genesis()
    }
}

impl ProtocolState {
    /// State at creation: empty map, no oracle, empty log.
    pub fn genesis() -> Self {
        Self {
            root: empty_root(),
            oracle_key: None,
            actions_cursor: ActionsCursor::genesis(),
            call_nonce: 0,
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to binary (bincode).
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary (bincode).
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}
