//! Authenticated Ledger
//!
//! The protocol never holds the balance map. It holds one committed root and
//! checks every balance claim against it with a [`MerkleWitness`].

use thiserror::Error;

use crate::core::account::LedgerKey;
use crate::core::hash::Hash256;
use crate::proof::merkle::{MerkleWitness, MAP_DEPTH};

/// Why a membership proof was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Witness path is not the full tree depth.
    #[error("witness has {got} levels, expected {expected}")]
    MalformedWitness {
        /// Required path length.
        expected: usize,
        /// Supplied path length.
        got: usize,
    },
    /// Witness and value do not reconstruct the committed root.
    #[error("witness root {} does not match committed root {}", hex::encode(.computed), hex::encode(.committed))]
    RootMismatch {
        /// Root the protocol has committed.
        committed: Hash256,
        /// Root reconstructed from the witness.
        computed: Hash256,
    },
    /// Witness path points at a different key.
    #[error("witness key does not match account key")]
    KeyMismatch,
}

/// Prove that `key` holds `value` under `committed_root`.
///
/// Both the reconstructed root and the key encoded by the witness path must
/// match.
pub fn prove_membership(
    key: &LedgerKey,
    value: u64,
    witness: &MerkleWitness,
    committed_root: &Hash256,
) -> Result<(), LedgerError> {
    if !witness.is_well_formed() {
        return Err(LedgerError::MalformedWitness {
            expected: MAP_DEPTH,
            got: witness.path.len(),
        });
    }

    let (computed, witness_key) = witness.compute_root_and_key(value);

    if computed != *committed_root {
        return Err(LedgerError::RootMismatch {
            committed: *committed_root,
            computed,
        });
    }

    if witness_key != *key {
        return Err(LedgerError::KeyMismatch);
    }

    Ok(())
}

/// Root that results from writing `new_value` at the witness position.
///
/// Does not check the old value; callers prove it first with
/// [`prove_membership`].
pub fn compute_updated_root(new_value: u64, witness: &MerkleWitness) -> Hash256 {
    witness.compute_root_and_key(new_value).0
}
