//! Channel Delta-Balance Proofs
//!
//! The operator attests the net balance change of a player since the last
//! on-ledger settlement by signing `(player, counterparty, delta, nonce)`.
//!
//! The nonce is carried and signed but never compared against a previously
//! seen value. An older signed delta keeps verifying after a newer one has
//! been issued.

use ed25519_dalek::{Signature, Signer, SigningKey};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::account::AccountId;
use crate::core::hash::{DomainHasher, Hash256};

/// Domain separator for channel proof digests.
const CHANNEL_PROOF_DOMAIN: &[u8] = b"CHANNEL_CUSTODY_CHANNEL_PROOF_V1";

/// Channel proof rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Proof is for a different player than the one acting.
    #[error("proof player {proof} does not match caller {expected}")]
    PlayerMismatch {
        /// Player the operation is bound to.
        expected: AccountId,
        /// Player named in the proof.
        proof: AccountId,
    },
    /// Proof names a different counterparty.
    #[error("proof counterparty {proof} does not match {expected}")]
    CounterpartyMismatch {
        /// Counterparty the protocol trusts.
        expected: AccountId,
        /// Counterparty named in the proof.
        proof: AccountId,
    },
    /// Counterparty key bytes are not a valid public key.
    #[error("malformed counterparty key")]
    MalformedKey,
    /// Signature does not verify.
    #[error("channel signature does not verify")]
    BadSignature,
}

/// Signed delta-balance attestation.
///
/// Built per call and never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelProof {
    /// Player whose channel balance moved.
    pub player: AccountId,
    /// Signing counterparty (the operator).
    pub counterparty: AccountId,
    /// Net balance change for the player (positive = player won).
    pub delta_balance: i64,
    /// Channel state sequence number.
    pub nonce: u64,
    /// Counterparty signature over the other four fields.
    pub signature: Signature,
}

impl ChannelProof {
    /// Sign a delta for `player` as the counterparty holding `signing_key`.
    pub fn sign(signing_key: &SigningKey, player: AccountId, delta_balance: i64, nonce: u64) -> Self {
        let counterparty = AccountId::from(signing_key);
        let digest = signing_digest(&player, &counterparty, delta_balance, nonce);
        let signature = signing_key.sign(&digest);

        Self {
            player,
            counterparty,
            delta_balance,
            nonce,
            signature,
        }
    }

    /// Canonical digest the signature covers.
    pub fn digest(&self) -> Hash256 {
        signing_digest(&self.player, &self.counterparty, self.delta_balance, self.nonce)
    }

    /// Verify the proof for `expected_player` under `counterparty_key`.
    ///
    /// The player field is bound to the acting identity before any
    /// signature work.
    pub fn verify(&self, expected_player: &AccountId, counterparty_key: &AccountId) -> Result<(), ChannelError> {
        if self.player != *expected_player {
            return Err(ChannelError::PlayerMismatch {
                expected: *expected_player,
                proof: self.player,
            });
        }

        if self.counterparty != *counterparty_key {
            return Err(ChannelError::CounterpartyMismatch {
                expected: *counterparty_key,
                proof: self.counterparty,
            });
        }

        let key = counterparty_key
            .verifying_key()
            .map_err(|_| ChannelError::MalformedKey)?;

        key.verify_strict(&self.digest(), &self.signature)
            .map_err(|_| ChannelError::BadSignature)
    }
}

/// Apply a signed delta to a base balance.
///
/// Non-negative deltas add, negative deltas subtract their magnitude.
/// Returns `None` on overflow or when the debit exceeds `base`.
pub fn apply_delta(base: u64, delta: i64) -> Option<u64> {
    if delta >= 0 {
        base.checked_add(delta.unsigned_abs())
    } else {
        base.checked_sub(delta.unsigned_abs())
    }
}

fn signing_digest(player: &AccountId, counterparty: &AccountId, delta: i64, nonce: u64) -> Hash256 {
    let mut hasher = DomainHasher::new(CHANNEL_PROOF_DOMAIN);
    hasher.update_bytes(player.as_bytes());
    hasher.update_bytes(counterparty.as_bytes());
    hasher.update_i64(delta);
    hasher.update_u64(nonce);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn operator() -> SigningKey {
        SigningKey::from_bytes(&[0xA0; 32])
    }

    fn player() -> AccountId {
        AccountId::from(&SigningKey::from_bytes(&[0x01; 32]))
    }

    #[test]
    fn test_valid_proof_verifies() {
        let op = operator();
        let proof = ChannelProof::sign(&op, player(), -3, 1);
        assert!(proof.verify(&player(), &AccountId::from(&op)).is_ok());
    }

    #[test]
    fn test_player_binding() {
        let op = operator();
        let proof = ChannelProof::sign(&op, player(), 3, 1);
        let other = AccountId::from(&SigningKey::from_bytes(&[0x02; 32]));

        assert!(matches!(
            proof.verify(&other, &AccountId::from(&op)),
            Err(ChannelError::PlayerMismatch { .. })
        ));
    }

    #[test]
    fn test_tampered_delta_fails() {
        let op = operator();
        let mut proof = ChannelProof::sign(&op, player(), -3, 1);
        proof.delta_balance = 3;

        assert_eq!(
            proof.verify(&player(), &AccountId::from(&op)),
            Err(ChannelError::BadSignature)
        );
    }

    #[test]
    fn test_tampered_nonce_fails() {
        let op = operator();
        let mut proof = ChannelProof::sign(&op, player(), 5, 7);
        proof.nonce = 8;

        assert_eq!(
            proof.verify(&player(), &AccountId::from(&op)),
            Err(ChannelError::BadSignature)
        );
    }

    #[test]
    fn test_wrong_signer_fails() {
        let op = operator();
        let impostor = SigningKey::from_bytes(&[0xBB; 32]);
        let proof = ChannelProof::sign(&impostor, player(), 10, 1);

        assert!(matches!(
            proof.verify(&player(), &AccountId::from(&op)),
            Err(ChannelError::CounterpartyMismatch { .. })
        ));

        // Relabelling the counterparty does not help.
        let mut relabelled = proof.clone();
        relabelled.counterparty = AccountId::from(&op);
        assert_eq!(
            relabelled.verify(&player(), &AccountId::from(&op)),
            Err(ChannelError::BadSignature)
        );
    }

    #[test]
    fn test_stale_nonce_still_verifies() {
        let op = operator();
        let old = ChannelProof::sign(&op, player(), 10, 1);
        let _newer = ChannelProof::sign(&op, player(), -20, 2);

        assert!(old.verify(&player(), &AccountId::from(&op)).is_ok());
    }

    #[test]
    fn test_apply_delta() {
        assert_eq!(apply_delta(20, -3), Some(17));
        assert_eq!(apply_delta(20, 3), Some(23));
        assert_eq!(apply_delta(20, 0), Some(20));
        assert_eq!(apply_delta(20, -20), Some(0));
        assert_eq!(apply_delta(20, -21), None);
        assert_eq!(apply_delta(u64::MAX, 1), None);
        assert_eq!(apply_delta(u64::MAX, i64::MIN), Some(u64::MAX - (1u64 << 63)));
    }
}
