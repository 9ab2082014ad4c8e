//! Action Reducer
//!
//! Folds queued actions into the committed root, oldest first. This is the
//! only code path that advances the ledger root.
//!
//! Each action's witness was taken against the root committed at enqueue
//! time. In [`FoldMode::Replay`] the fold trusts that witness: the root after
//! an action is whatever its witness yields for the new value, regardless of
//! what earlier actions in the same batch did. Two actions touching one key
//! resolve to the later write. Two actions on different keys, both
//! witnessed against the same root, lose the earlier write.
//! [`FoldMode::Reprove`] re-proves `previous_value` against the running root
//! and skips actions whose witness has gone stale.

use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use crate::core::account::AccountId;
use crate::core::hash::Hash256;
use crate::proof::ledger::{compute_updated_root, prove_membership, LedgerError};
use crate::settlement::queue::{ActionQueue, ActionsCursor, PendingAction};
use crate::settlement::ReducerError;

/// How the reducer treats witnesses taken against an older root.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoldMode {
    /// Apply every action using its enqueue-time witness.
    #[default]
    Replay,
    /// Re-prove each action against the running root; skip stale ones.
    Reprove,
}

impl std::str::FromStr for FoldMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replay" => Ok(Self::Replay),
            "reprove" => Ok(Self::Reprove),
            other => Err(format!("unknown fold mode: {}", other)),
        }
    }
}

/// An action the reducer refused to apply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedAction {
    /// Log position of the action.
    pub cursor: ActionsCursor,
    /// Account the action was for.
    pub owner: AccountId,
    /// Value the action would have written.
    pub new_value: u64,
    /// Why the re-proof failed.
    pub reason: String,
}

/// Result of one fold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoldOutcome {
    /// Root after the last folded action.
    pub root: Hash256,
    /// Log position after the last folded action.
    pub cursor: ActionsCursor,
    /// Number of actions written into the root.
    pub applied: usize,
    /// Actions consumed without effect.
    pub skipped: Vec<SkippedAction>,
}

impl FoldOutcome {
    /// Whether the fold consumed anything.
    pub fn is_noop(&self) -> bool {
        self.applied == 0 && self.skipped.is_empty()
    }
}

/// Fold every action after `cursor` into `root`.
///
/// Consumes actions exactly once and in enqueue order. With `cursor` at the
/// queue tail the root and cursor come back unchanged.
pub fn fold_from(
    queue: &ActionQueue,
    cursor: ActionsCursor,
    root: Hash256,
    mode: FoldMode,
) -> Result<FoldOutcome, ReducerError> {
    let pending = queue.actions_after(&cursor)?;

    let mut outcome = FoldOutcome {
        root,
        cursor,
        applied: 0,
        skipped: Vec::new(),
    };

    for entry in pending {
        match reduce(outcome.root, &entry.action, mode) {
            Ok(next_root) => {
                outcome.root = next_root;
                outcome.applied += 1;
            }
            Err(err) => {
                warn!(
                    "Skipping stale action for {} at {}: {}",
                    entry.action.owner.short(),
                    entry.cursor.short(),
                    err
                );
                outcome.skipped.push(SkippedAction {
                    cursor: entry.cursor,
                    owner: entry.action.owner,
                    new_value: entry.action.new_value,
                    reason: err.to_string(),
                });
            }
        }
        outcome.cursor = entry.cursor;
    }

    debug!(
        "Folded {} actions ({} skipped) to root {}",
        outcome.applied,
        outcome.skipped.len(),
        hex::encode(&outcome.root[..4])
    );

    Ok(outcome)
}

/// Apply one action to `state`.
fn reduce(state: Hash256, action: &PendingAction, mode: FoldMode) -> Result<Hash256, LedgerError> {
    if mode == FoldMode::Reprove {
        prove_membership(&action.ledger_key, action.previous_value, &action.witness, &state)?;
    }
    Ok(compute_updated_root(action.new_value, &action.witness))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::merkle::{empty_root, MerkleMap};
    use ed25519_dalek::SigningKey;

    fn account(seed: u8) -> AccountId {
        AccountId::from(&SigningKey::from_bytes(&[seed; 32]))
    }

    fn deposit_action(map: &MerkleMap, owner: AccountId, amount: u64) -> PendingAction {
        let key = owner.ledger_key();
        let previous = map.get(&key);
        PendingAction::new(owner, previous, previous + amount, map.witness(&key))
    }

    #[test]
    fn test_fold_single_action() {
        let map = MerkleMap::new();
        let mut queue = ActionQueue::new();
        let alice = account(1);
        queue.enqueue(deposit_action(&map, alice, 10));

        let outcome = fold_from(&queue, ActionsCursor::genesis(), empty_root(), FoldMode::Replay).unwrap();

        let mut expected = MerkleMap::new();
        expected.set(alice.ledger_key(), 10);
        assert_eq!(outcome.root, expected.root());
        assert_eq!(outcome.cursor, queue.tail());
        assert_eq!(outcome.applied, 1);
    }

    #[test]
    fn test_fold_at_tail_is_noop() {
        let map = MerkleMap::new();
        let mut queue = ActionQueue::new();
        queue.enqueue(deposit_action(&map, account(1), 10));

        let first = fold_from(&queue, ActionsCursor::genesis(), empty_root(), FoldMode::Replay).unwrap();
        let second = fold_from(&queue, first.cursor, first.root, FoldMode::Replay).unwrap();

        assert!(second.is_noop());
        assert_eq!(second.root, first.root);
        assert_eq!(second.cursor, first.cursor);
    }

    #[test]
    fn test_same_key_later_action_wins() {
        let map = MerkleMap::new();
        let alice = account(1);
        let mut queue = ActionQueue::new();
        queue.enqueue(deposit_action(&map, alice, 10));
        queue.enqueue(deposit_action(&map, alice, 25));

        let outcome = fold_from(&queue, ActionsCursor::genesis(), empty_root(), FoldMode::Replay).unwrap();

        let mut expected = MerkleMap::new();
        expected.set(alice.ledger_key(), 25);
        assert_eq!(outcome.root, expected.root());
        assert_eq!(outcome.applied, 2);
    }

    #[test]
    fn test_replay_loses_sibling_write() {
        let map = MerkleMap::new();
        let alice = account(1);
        let bob = account(2);
        let mut queue = ActionQueue::new();
        queue.enqueue(deposit_action(&map, alice, 10));
        queue.enqueue(deposit_action(&map, bob, 20));

        let outcome = fold_from(&queue, ActionsCursor::genesis(), empty_root(), FoldMode::Replay).unwrap();

        let mut only_bob = MerkleMap::new();
        only_bob.set(bob.ledger_key(), 20);
        assert_eq!(outcome.root, only_bob.root());

        let mut both = MerkleMap::new();
        both.set(alice.ledger_key(), 10);
        both.set(bob.ledger_key(), 20);
        assert_ne!(outcome.root, both.root());
    }

    #[test]
    fn test_reprove_skips_stale_witness() {
        let map = MerkleMap::new();
        let alice = account(1);
        let bob = account(2);
        let mut queue = ActionQueue::new();
        queue.enqueue(deposit_action(&map, alice, 10));
        let bob_cursor = queue.enqueue(deposit_action(&map, bob, 20));

        let outcome = fold_from(&queue, ActionsCursor::genesis(), empty_root(), FoldMode::Reprove).unwrap();

        let mut only_alice = MerkleMap::new();
        only_alice.set(alice.ledger_key(), 10);
        assert_eq!(outcome.root, only_alice.root());
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].owner, bob);
        assert_eq!(outcome.skipped[0].cursor, bob_cursor);
        assert_eq!(outcome.cursor, queue.tail());
    }

    #[test]
    fn test_reprove_accepts_chained_witnesses() {
        let mut map = MerkleMap::new();
        let alice = account(1);
        let bob = account(2);
        let mut queue = ActionQueue::new();

        let first = deposit_action(&map, alice, 10);
        map.set(alice.ledger_key(), 10);
        let second = deposit_action(&map, bob, 20);
        map.set(bob.ledger_key(), 20);
        queue.enqueue(first);
        queue.enqueue(second);

        let outcome = fold_from(&queue, ActionsCursor::genesis(), empty_root(), FoldMode::Reprove).unwrap();
        assert_eq!(outcome.root, map.root());
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn test_fold_resumes_from_cursor() {
        let map = MerkleMap::new();
        let alice = account(1);
        let mut queue = ActionQueue::new();
        queue.enqueue(deposit_action(&map, alice, 10));

        let first = fold_from(&queue, ActionsCursor::genesis(), empty_root(), FoldMode::Replay).unwrap();

        let mut after = MerkleMap::new();
        after.set(alice.ledger_key(), 10);
        queue.enqueue(deposit_action(&after, alice, 5));

        let second = fold_from(&queue, first.cursor, first.root, FoldMode::Replay).unwrap();
        assert_eq!(second.applied, 1);

        after.set(alice.ledger_key(), 15);
        assert_eq!(second.root, after.root());
    }

    #[test]
    fn test_unknown_cursor_fails() {
        let queue = ActionQueue::new();
        let bogus = ActionsCursor([1; 32]);
        assert_eq!(
            fold_from(&queue, bogus, empty_root(), FoldMode::Replay),
            Err(ReducerError::UnknownCursor(bogus))
        );
    }

    #[test]
    fn test_fold_mode_parse() {
        assert_eq!("replay".parse::<FoldMode>(), Ok(FoldMode::Replay));
        assert_eq!("REPROVE".parse::<FoldMode>(), Ok(FoldMode::Reprove));
        assert!("strict".parse::<FoldMode>().is_err());
    }
}
