//! Pending Action Queue
//!
//! Append-only log of ledger updates waiting to be folded into the root.
//! Positions are addressed by a running digest over the log, not by index:
//! `tail' = H(ACTIONS_DOMAIN || tail || H(action))`.

use serde::{Serialize, Deserialize};

use crate::core::account::{AccountId, LedgerKey};
use crate::core::hash::{hash_with_domain, DomainHasher, Hash256};
use crate::proof::merkle::MerkleWitness;
use crate::settlement::ReducerError;

/// Domain separator for the empty log digest.
const ACTIONS_EMPTY_DOMAIN: &[u8] = b"CHANNEL_CUSTODY_ACTIONS_EMPTY_V1";

/// Domain separator for log chaining.
const ACTIONS_DOMAIN: &[u8] = b"CHANNEL_CUSTODY_ACTIONS_V1";

/// Domain separator for a single action digest.
const ACTION_DOMAIN: &[u8] = b"CHANNEL_CUSTODY_ACTION_V1";

/// Position in the action log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionsCursor(pub Hash256);

impl ActionsCursor {
    /// Digest of the empty log.
    pub fn genesis() -> Self {
        Self(hash_with_domain(ACTIONS_EMPTY_DOMAIN, &[]))
    }

    /// Cursor after appending `action` at this position.
    pub fn advance(&self, action: &PendingAction) -> Self {
        let mut hasher = DomainHasher::new(ACTIONS_DOMAIN);
        hasher.update_hash(&self.0);
        hasher.update_hash(&action.digest());
        Self(hasher.finalize())
    }

    /// First four bytes in hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl Default for ActionsCursor {
    fn default() -> Self {
        Self::genesis()
    }
}

/// A ledger write waiting for settlement.
///
/// The witness was taken against the root committed when the action was
/// enqueued.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    /// Account whose balance changes.
    pub owner: AccountId,
    /// Ledger key of `owner`.
    pub ledger_key: LedgerKey,
    /// Value proven at enqueue time.
    pub previous_value: u64,
    /// Value to write.
    pub new_value: u64,
    /// Witness for `ledger_key` at enqueue time.
    pub witness: MerkleWitness,
}

impl PendingAction {
    /// Build an action for `owner`.
    pub fn new(owner: AccountId, previous_value: u64, new_value: u64, witness: MerkleWitness) -> Self {
        Self {
            owner,
            ledger_key: owner.ledger_key(),
            previous_value,
            new_value,
            witness,
        }
    }

    /// Commitment to every field of the action.
    pub fn digest(&self) -> Hash256 {
        let mut hasher = DomainHasher::new(ACTION_DOMAIN);
        hasher.update_bytes(self.owner.as_bytes());
        hasher.update_hash(&self.ledger_key);
        hasher.update_u64(self.previous_value);
        hasher.update_u64(self.new_value);
        hasher.update_u64(self.witness.path.len() as u64);
        for node in &self.witness.path {
            hasher.update_hash(&node.sibling);
            hasher.update_bool(node.is_left);
        }
        hasher.finalize()
    }
}

/// An action with the log position reached by appending it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedAction {
    /// Log digest after this action.
    pub cursor: ActionsCursor,
    /// The action itself.
    pub action: PendingAction,
}

/// Ordered, append-only queue of pending actions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionQueue {
    entries: Vec<QueuedAction>,
    tail: ActionsCursor,
}

impl ActionQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action and return the new tail.
    pub fn enqueue(&mut self, action: PendingAction) -> ActionsCursor {
        let cursor = self.tail.advance(&action);
        self.entries.push(QueuedAction { cursor, action });
        self.tail = cursor;
        cursor
    }

    /// Every action appended after `cursor`, oldest first.
    pub fn actions_after(&self, cursor: &ActionsCursor) -> Result<&[QueuedAction], ReducerError> {
        if *cursor == ActionsCursor::genesis() {
            return Ok(&self.entries);
        }

        self.entries
            .iter()
            .position(|entry| entry.cursor == *cursor)
            .map(|index| &self.entries[index + 1..])
            .ok_or(ReducerError::UnknownCursor(*cursor))
    }

    /// Digest of the whole log.
    pub fn tail(&self) -> ActionsCursor {
        self.tail
    }

    /// Number of actions ever enqueued.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was ever enqueued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[QueuedAction] {
        &self.entries
    }
}
