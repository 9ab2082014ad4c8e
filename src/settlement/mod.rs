//! Deferred Settlement
//!
//! Operations never write the root directly. They append a
//! [`PendingAction`] to the [`ActionQueue`]; a separate settlement step folds
//! the queue into the next root with [`fold_from`].

pub mod queue;
pub mod reducer;

use thiserror::Error;

pub use queue::{ActionQueue, ActionsCursor, PendingAction, QueuedAction};
pub use reducer::{fold_from, FoldMode, FoldOutcome, SkippedAction};

/// Reducer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReducerError {
    /// Cursor is not a position in this queue.
    #[error("cursor {} is not in the action log", .0.short())]
    UnknownCursor(ActionsCursor),
}
