//! Collateral Events
//!
//! Every enqueued action is mirrored by an event so observers can rebuild
//! the ledger map and hand out fresh witnesses. The protocol never reads
//! its own events back.

use serde::{Serialize, Deserialize};

use crate::core::account::AccountId;
use crate::proof::merkle::MerkleWitness;
use crate::settlement::queue::PendingAction;

/// Emitted for every deposit and withdrawal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralUpdateEvent {
    /// Account whose collateral changes.
    pub owner: AccountId,
    /// Collateral value after settlement.
    pub new_value: u64,
    /// Witness the update was computed with.
    pub witness: MerkleWitness,
}

impl CollateralUpdateEvent {
    /// Event mirroring a pending action.
    pub fn from_action(action: &PendingAction) -> Self {
        Self {
            owner: action.owner,
            new_value: action.new_value,
            witness: action.witness.clone(),
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
