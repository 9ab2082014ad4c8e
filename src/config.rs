//! Protocol Configuration

use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::settlement::reducer::FoldMode;

/// Flip threshold: the post-delta balance must be strictly above this.
pub const DEFAULT_FLIP_THRESHOLD: u64 = 25;

/// Flip stake credited or debited per flip.
pub const DEFAULT_FLIP_MAGNITUDE: u64 = 5;

/// Largest magnitude a signed outcome can carry.
pub const MAX_FLIP_MAGNITUDE: u64 = i64::MAX as u64;

/// Tunable protocol parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Minimum post-delta balance (exclusive) to flip.
    pub flip_threshold: u64,
    /// Outcome magnitude.
    pub flip_magnitude: u64,
    /// Reducer witness policy.
    pub fold_mode: FoldMode,
    /// Reject a deposit or withdrawal while the account has an unsettled
    /// action.
    #[serde(default)]
    pub exclusive_pending: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            flip_threshold: DEFAULT_FLIP_THRESHOLD,
            flip_magnitude: DEFAULT_FLIP_MAGNITUDE,
            fold_mode: FoldMode::Replay,
            exclusive_pending: false,
        }
    }
}

impl ProtocolConfig {
    /// Create config from environment variables.
    ///
    /// Unset, unparsable or out-of-range variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |name: &str| lookup(name).map(|v| v.trim().to_string());

        let flip_magnitude = parse("CUSTODY_FLIP_MAGNITUDE")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|m| *m <= MAX_FLIP_MAGNITUDE);
        if flip_magnitude.is_none() && lookup("CUSTODY_FLIP_MAGNITUDE").is_some() {
            warn!("Ignoring CUSTODY_FLIP_MAGNITUDE: not an integer up to {}", MAX_FLIP_MAGNITUDE);
        }

        Self {
            flip_threshold: parse("CUSTODY_FLIP_THRESHOLD")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.flip_threshold),
            flip_magnitude: flip_magnitude.unwrap_or(defaults.flip_magnitude),
            fold_mode: parse("CUSTODY_FOLD_MODE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.fold_mode),
            exclusive_pending: parse("CUSTODY_EXCLUSIVE_PENDING")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.exclusive_pending),
        }
    }

    /// Builder-style fold mode override.
    pub fn with_fold_mode(mut self, mode: FoldMode) -> Self {
        self.fold_mode = mode;
        self
    }

    /// Builder-style exclusive pending override.
    pub fn with_exclusive_pending(mut self, exclusive: bool) -> Self {
        self.exclusive_pending = exclusive;
        self
    }
}
