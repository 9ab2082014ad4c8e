//! Protocol Errors
//!
//! Every check is an assertion: on the first failure the operation aborts
//! with no state change and no event. Nothing is retried internally.

use thiserror::Error;

use crate::core::account::AccountId;
use crate::proof::channel::ChannelError;
use crate::proof::encryption::EncryptionError;
use crate::proof::ledger::LedgerError;
use crate::proof::oracle::OracleError;
use crate::protocol::context::CallError;
use crate::protocol::host::HostError;
use crate::settlement::ReducerError;

/// Which signature failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureFailure {
    /// Channel delta-balance proof.
    #[error("channel proof: {0}")]
    Channel(#[from] ChannelError),
    /// Oracle signature over randomness.
    #[error("oracle randomness: {0}")]
    Oracle(OracleError),
    /// Signed call envelope.
    #[error("signed call: {0}")]
    Call(#[from] CallError),
}

/// Protocol operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Witness and value do not reconstruct the committed root or key.
    #[error("proof mismatch: {0}")]
    ProofMismatch(#[from] LedgerError),

    /// Channel, oracle or call signature failed verification.
    #[error("signature invalid: {0}")]
    SignatureInvalid(#[from] SignatureFailure),

    /// Custody balance cannot cover the withdrawal.
    #[error("custody holds {available}, withdrawal needs {required}")]
    InsufficientBalance {
        /// Withdrawal amount.
        required: u64,
        /// Custody balance.
        available: u64,
    },

    /// Post-delta balance too low to flip.
    #[error("balance {balance} is not above flip threshold {threshold}")]
    BelowThreshold {
        /// Ledger balance plus channel delta.
        balance: i128,
        /// Configured threshold.
        threshold: u64,
    },

    /// Caller is not the admin.
    #[error("caller {0} is not the admin")]
    UnauthorizedAdmin(AccountId),

    /// Caller may not act for this account.
    #[error("caller {caller} may not act for {expected}")]
    UnauthorizedCaller {
        /// Authenticated caller.
        caller: AccountId,
        /// Identity the operation requires.
        expected: AccountId,
    },

    /// Collateral arithmetic overflowed.
    #[error("collateral arithmetic overflow")]
    ArithmeticOverflow,

    /// Channel debit larger than the collateral it is applied to.
    #[error("channel debit {delta} exceeds collateral {collateral}")]
    DeltaExceedsCollateral {
        /// Proven collateral.
        collateral: u64,
        /// Signed channel delta.
        delta: i64,
    },

    /// Account already has an unsettled action (exclusive pending mode).
    #[error("account {0} has an unsettled action")]
    PendingAction(AccountId),

    /// No oracle key has been registered.
    #[error("oracle key not set")]
    OracleKeyUnset,

    /// Oracle ciphertext could not be decrypted.
    #[error("randomness decryption failed: {0}")]
    DecryptionFailed(EncryptionError),

    /// Settlement could not locate the cursor.
    #[error("settlement failed: {0}")]
    Settlement(#[from] ReducerError),

    /// Host ledger refused a transfer.
    #[error("host ledger: {0}")]
    Host(#[from] HostError),
}

impl From<ChannelError> for ProtocolError {
    fn from(err: ChannelError) -> Self {
        Self::SignatureInvalid(SignatureFailure::Channel(err))
    }
}

impl From<CallError> for ProtocolError {
    fn from(err: CallError) -> Self {
        Self::SignatureInvalid(SignatureFailure::Call(err))
    }
}

impl From<OracleError> for ProtocolError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Decryption(inner) => Self::DecryptionFailed(inner),
            other => Self::SignatureInvalid(SignatureFailure::Oracle(other)),
        }
    }
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
