//! Call Authentication
//!
//! Operations receive the caller's identity from the surrounding call
//! mechanism. Authority is never proven by passing a private key as an
//! argument; a caller is either vouched for by the sequencer
//! ([`CallContext::authenticated`]) or proves itself with a signature over
//! the operation it requests ([`CallContext::from_signed_call`]).
//!
//! A signed call is scoped: it names one protocol instance, one operation
//! with its exact arguments, and the instance's call nonce at signing time.
//! The controller rejects a signed context used for anything else, and each
//! accepted mutating call advances the nonce, so an envelope works once.

use ed25519_dalek::{Signature, Signer, SigningKey};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::account::AccountId;
use crate::core::hash::{DomainHasher, Hash256};

/// Domain separator for signed calls.
const SIGNED_CALL_DOMAIN: &[u8] = b"CHANNEL_CUSTODY_SIGNED_CALL_V2";

/// Signed call rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// Caller key bytes are not a valid public key.
    #[error("malformed caller key")]
    MalformedKey,
    /// Signature does not verify.
    #[error("call signature does not verify")]
    BadSignature,
    /// Call was signed for another protocol instance.
    #[error("call is for instance {signed}, not {invoked}")]
    WrongInstance {
        /// Instance named in the call.
        signed: AccountId,
        /// Instance it was presented to.
        invoked: AccountId,
    },
    /// Call authorizes a different operation or different arguments.
    #[error("call authorizes {signed}, not this {invoked}")]
    OperationMismatch {
        /// Operation named in the call.
        signed: &'static str,
        /// Operation actually invoked.
        invoked: &'static str,
    },
    /// Call nonce is not the instance's current nonce.
    #[error("call nonce {got} is not the current nonce {expected}")]
    StaleNonce {
        /// Current instance nonce.
        expected: u64,
        /// Nonce in the call.
        got: u64,
    },
}

/// An operation and the arguments a signed call commits to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallOperation {
    /// Replace the oracle key.
    RotateOracleKey {
        /// Key to install.
        new_key: AccountId,
    },
    /// Reset the ledger root.
    ResetLedger,
    /// Add collateral.
    Deposit {
        /// Depositing player.
        player: AccountId,
        /// Amount transferred into custody.
        amount: u64,
        /// Proven collateral before the deposit.
        previous_value: u64,
    },
    /// Withdraw collateral.
    Withdraw {
        /// Withdrawing player.
        player: AccountId,
        /// Proven collateral.
        collateral: u64,
        /// Channel proof delta.
        delta_balance: i64,
        /// Channel proof nonce.
        channel_nonce: u64,
    },
    /// Flip a coin.
    Flip {
        /// Player the flip is for.
        player: AccountId,
        /// Proven ledger balance.
        balance: u64,
    },
}

impl CallOperation {
    /// Operation name, for errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RotateOracleKey { .. } => "rotate_oracle_key",
            Self::ResetLedger => "reset_ledger",
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::Flip { .. } => "flip",
        }
    }

    fn commit(&self, hasher: &mut DomainHasher) {
        match self {
            Self::RotateOracleKey { new_key } => {
                hasher.update_u8(0);
                hasher.update_bytes(new_key.as_bytes());
            }
            Self::ResetLedger => hasher.update_u8(1),
            Self::Deposit { player, amount, previous_value } => {
                hasher.update_u8(2);
                hasher.update_bytes(player.as_bytes());
                hasher.update_u64(*amount);
                hasher.update_u64(*previous_value);
            }
            Self::Withdraw { player, collateral, delta_balance, channel_nonce } => {
                hasher.update_u8(3);
                hasher.update_bytes(player.as_bytes());
                hasher.update_u64(*collateral);
                hasher.update_i64(*delta_balance);
                hasher.update_u64(*channel_nonce);
            }
            Self::Flip { player, balance } => {
                hasher.update_u8(4);
                hasher.update_bytes(player.as_bytes());
                hasher.update_u64(*balance);
            }
        }
    }
}

/// What a verified signed call authorizes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallScope {
    /// Protocol instance (its operator account).
    pub instance: AccountId,
    /// Operation and arguments.
    pub operation: CallOperation,
    /// Instance call nonce at signing time.
    pub nonce: u64,
}

/// Authenticated caller identity for one operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallContext {
    caller: AccountId,
    scope: Option<CallScope>,
}

impl CallContext {
    /// Caller already authenticated by the sequencer for this one call.
    pub fn authenticated(caller: AccountId) -> Self {
        Self { caller, scope: None }
    }

    /// Authenticate a caller from a signed request.
    pub fn from_signed_call(call: &SignedCall) -> Result<Self, CallError> {
        call.verify()?;
        Ok(Self {
            caller: call.caller,
            scope: Some(CallScope {
                instance: call.instance,
                operation: call.operation.clone(),
                nonce: call.nonce,
            }),
        })
    }

    /// Who is calling.
    pub fn caller(&self) -> &AccountId {
        &self.caller
    }

    /// Scope of the signed call, if the context came from one.
    pub fn scope(&self) -> Option<&CallScope> {
        self.scope.as_ref()
    }

    /// Check this context may run `operation` on `instance` at `nonce`.
    ///
    /// Returns whether the context came from a signed call, in which case a
    /// mutating operation must consume the nonce.
    pub fn authorize(
        &self,
        instance: &AccountId,
        operation: &CallOperation,
        nonce: u64,
    ) -> Result<bool, CallError> {
        let Some(scope) = &self.scope else {
            return Ok(false);
        };

        if scope.instance != *instance {
            return Err(CallError::WrongInstance {
                signed: scope.instance,
                invoked: *instance,
            });
        }

        if scope.operation != *operation {
            return Err(CallError::OperationMismatch {
                signed: scope.operation.name(),
                invoked: operation.name(),
            });
        }

        if scope.nonce != nonce {
            return Err(CallError::StaleNonce {
                expected: nonce,
                got: scope.nonce,
            });
        }

        Ok(true)
    }
}

/// A request signed by its caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCall {
    /// Claimed caller.
    pub caller: AccountId,
    /// Protocol instance the call is for.
    pub instance: AccountId,
    /// Operation and arguments.
    pub operation: CallOperation,
    /// Instance call nonce.
    pub nonce: u64,
    /// Caller signature over instance, operation and nonce.
    pub signature: Signature,
}

impl SignedCall {
    /// Sign a request as the holder of `key`.
    pub fn sign(key: &SigningKey, instance: AccountId, operation: CallOperation, nonce: u64) -> Self {
        let caller = AccountId::from(key);
        let digest = call_digest(&caller, &instance, &operation, nonce);
        Self {
            caller,
            instance,
            operation,
            nonce,
            signature: key.sign(&digest),
        }
    }

    fn verify(&self) -> Result<(), CallError> {
        let key = self.caller.verifying_key().map_err(|_| CallError::MalformedKey)?;
        let digest = call_digest(&self.caller, &self.instance, &self.operation, self.nonce);
        key.verify_strict(&digest, &self.signature)
            .map_err(|_| CallError::BadSignature)
    }
}

fn call_digest(caller: &AccountId, instance: &AccountId, operation: &CallOperation, nonce: u64) -> Hash256 {
    let mut hasher = DomainHasher::new(SIGNED_CALL_DOMAIN);
    hasher.update_bytes(caller.as_bytes());
    hasher.update_bytes(instance.as_bytes());
    operation.commit(&mut hasher);
    hasher.update_u64(nonce);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> AccountId {
        AccountId::from(&SigningKey::from_bytes(&[0xA0; 32]))
    }

    fn rotate(seed: u8) -> CallOperation {
        CallOperation::RotateOracleKey {
            new_key: AccountId::from(&SigningKey::from_bytes(&[seed; 32])),
        }
    }

    #[test]
    fn test_signed_call_authenticates() {
        let key = SigningKey::from_bytes(&[4; 32]);
        let call = SignedCall::sign(&key, instance(), CallOperation::ResetLedger, 0);
        let ctx = CallContext::from_signed_call(&call).unwrap();
        assert_eq!(*ctx.caller(), AccountId::from(&key));
        assert_eq!(ctx.scope().map(|s| s.nonce), Some(0));
    }

    #[test]
    fn test_claimed_caller_must_sign() {
        let key = SigningKey::from_bytes(&[4; 32]);
        let admin = AccountId::from(&SigningKey::from_bytes(&[5; 32]));
        let mut call = SignedCall::sign(&key, instance(), CallOperation::ResetLedger, 0);
        call.caller = admin;

        assert_eq!(CallContext::from_signed_call(&call), Err(CallError::BadSignature));
    }

    #[test]
    fn test_operation_is_bound() {
        let key = SigningKey::from_bytes(&[4; 32]);
        let mut call = SignedCall::sign(&key, instance(), CallOperation::ResetLedger, 0);
        call.operation = rotate(9);

        assert_eq!(CallContext::from_signed_call(&call), Err(CallError::BadSignature));
    }

    #[test]
    fn test_arguments_and_nonce_are_bound() {
        let key = SigningKey::from_bytes(&[4; 32]);
        let mut call = SignedCall::sign(&key, instance(), rotate(1), 0);
        call.operation = rotate(2);
        assert_eq!(CallContext::from_signed_call(&call), Err(CallError::BadSignature));

        let mut call = SignedCall::sign(&key, instance(), rotate(1), 0);
        call.nonce = 1;
        assert_eq!(CallContext::from_signed_call(&call), Err(CallError::BadSignature));
    }

    #[test]
    fn test_sequencer_context_is_unscoped() {
        let ctx = CallContext::authenticated(instance());
        assert!(ctx.scope().is_none());
        assert_eq!(ctx.authorize(&instance(), &CallOperation::ResetLedger, 7), Ok(false));
    }

    #[test]
    fn test_authorize_checks_scope() {
        let key = SigningKey::from_bytes(&[4; 32]);
        let call = SignedCall::sign(&key, instance(), rotate(1), 3);
        let ctx = CallContext::from_signed_call(&call).unwrap();

        assert_eq!(ctx.authorize(&instance(), &rotate(1), 3), Ok(true));
        assert_eq!(
            ctx.authorize(&instance(), &CallOperation::ResetLedger, 3),
            Err(CallError::OperationMismatch { signed: "rotate_oracle_key", invoked: "reset_ledger" })
        );
        assert!(matches!(
            ctx.authorize(&instance(), &rotate(2), 3),
            Err(CallError::OperationMismatch { .. })
        ));
        assert_eq!(
            ctx.authorize(&instance(), &rotate(1), 4),
            Err(CallError::StaleNonce { expected: 4, got: 3 })
        );

        let other = AccountId::from(&SigningKey::from_bytes(&[0xA1; 32]));
        assert!(matches!(
            ctx.authorize(&other, &rotate(1), 3),
            Err(CallError::WrongInstance { .. })
        ));
    }
}
