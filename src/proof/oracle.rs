//! Oracle Randomness
//!
//! The randomness oracle encrypts a random `u64` to the operator's
//! encryption key and signs the two ciphertext field elements. The flip
//! verifies that signature under the stored oracle key, decrypts with the
//! operator's decryption key and reads the outcome from the parity.
//!
//! One operator holds the decryption key and chooses which oracle key is
//! trusted, so it controls both secrecy and authenticity of the randomness.

use ed25519_dalek::{Signature, Signer, SigningKey};
use rand::{CryptoRng, RngCore};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::account::AccountId;
use crate::core::hash::{DomainHasher, Hash256};
use crate::proof::encryption::{self, Ciphertext, DecryptionKey, EncryptionError, EncryptionPublicKey};

/// Domain separator for oracle signatures.
const ORACLE_SIGNATURE_DOMAIN: &[u8] = b"CHANNEL_CUSTODY_ORACLE_RANDOMNESS_V1";

/// Oracle randomness failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// Oracle key bytes are not a valid public key.
    #[error("malformed oracle key")]
    MalformedKey,
    /// Signature over the ciphertext does not verify.
    #[error("oracle signature does not verify")]
    BadSignature,
    /// Ciphertext could not be decrypted.
    #[error("decryption failed: {0}")]
    Decryption(#[from] EncryptionError),
}

/// Ciphertext plus the oracle's signature over its field elements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRandomness {
    /// Encrypted random value.
    pub ciphertext: Ciphertext,
    /// Oracle signature over `ciphertext.fields`.
    pub signature: Signature,
}

/// Result of a coin flip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlipOutcome {
    /// Credit (positive) or debit (negative) for the player.
    pub delta: i64,
    /// Decrypted oracle value the outcome was read from.
    pub random_value: u64,
}

/// Oracle side: produces signed, encrypted randomness.
pub struct RandomnessOracle {
    signing_key: SigningKey,
}

impl RandomnessOracle {
    /// Wrap the oracle's signing key.
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Public identity to register as the protocol's oracle key.
    pub fn account(&self) -> AccountId {
        AccountId::from(&self.signing_key)
    }

    /// Encrypt `value` to `recipient` and sign the result.
    pub fn issue<R: RngCore + CryptoRng>(
        &self,
        recipient: &EncryptionPublicKey,
        value: u64,
        rng: &mut R,
    ) -> Result<SignedRandomness, OracleError> {
        let ciphertext = encryption::encrypt(recipient, value, rng)?;
        Ok(self.sign(ciphertext))
    }

    /// Sign an existing ciphertext.
    pub fn sign(&self, ciphertext: Ciphertext) -> SignedRandomness {
        let digest = signature_digest(&ciphertext);
        let signature = self.signing_key.sign(&digest);
        SignedRandomness { ciphertext, signature }
    }
}

/// Check the oracle's signature over the two ciphertext field elements.
///
/// The ephemeral point is not covered; altering it breaks the
/// authentication tag at decryption instead.
pub fn verify_signature(
    ciphertext: &Ciphertext,
    oracle_key: &AccountId,
    signature: &Signature,
) -> Result<(), OracleError> {
    let key = oracle_key.verifying_key().map_err(|_| OracleError::MalformedKey)?;
    key.verify_strict(&signature_digest(ciphertext), signature)
        .map_err(|_| OracleError::BadSignature)
}

/// Recover the random value with the operator's decryption key.
pub fn decrypt_randomness(ciphertext: &Ciphertext, key: &DecryptionKey) -> Result<u64, OracleError> {
    Ok(encryption::decrypt(ciphertext, key)?)
}

/// Outcome from parity: even credits `magnitude`, odd debits it.
///
/// Magnitudes above `i64::MAX` saturate.
#[inline]
pub fn derive_outcome(random_value: u64, magnitude: u64) -> i64 {
    let magnitude = i64::try_from(magnitude).unwrap_or(i64::MAX);
    if random_value % 2 == 0 {
        magnitude
    } else {
        -magnitude
    }
}

fn signature_digest(ciphertext: &Ciphertext) -> Hash256 {
    let mut hasher = DomainHasher::new(ORACLE_SIGNATURE_DOMAIN);
    for field in &ciphertext.fields {
        hasher.update_hash(field);
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup() -> (RandomnessOracle, DecryptionKey, StdRng) {
        (
            RandomnessOracle::new(SigningKey::from_bytes(&[0x0C; 32])),
            DecryptionKey::from_seed(&[0x0D; 32]),
            StdRng::seed_from_u64(1),
        )
    }

    #[test]
    fn test_issue_verify_decrypt() {
        let (oracle, key, mut rng) = setup();
        let signed = oracle.issue(&key.public_key(), 1234, &mut rng).unwrap();

        assert!(verify_signature(&signed.ciphertext, &oracle.account(), &signed.signature).is_ok());
        assert_eq!(decrypt_randomness(&signed.ciphertext, &key).unwrap(), 1234);
    }

    #[test]
    fn test_wrong_oracle_key_rejected() {
        let (oracle, key, mut rng) = setup();
        let signed = oracle.issue(&key.public_key(), 7, &mut rng).unwrap();
        let impostor = RandomnessOracle::new(SigningKey::from_bytes(&[0x0E; 32]));

        assert_eq!(
            verify_signature(&signed.ciphertext, &impostor.account(), &signed.signature),
            Err(OracleError::BadSignature)
        );
    }

    #[test]
    fn test_tampered_field_breaks_signature() {
        let (oracle, key, mut rng) = setup();
        let mut signed = oracle.issue(&key.public_key(), 7, &mut rng).unwrap();
        signed.ciphertext.fields[1][31] ^= 0x80;

        assert_eq!(
            verify_signature(&signed.ciphertext, &oracle.account(), &signed.signature),
            Err(OracleError::BadSignature)
        );
    }

    #[test]
    fn test_decrypt_with_wrong_key() {
        let (oracle, key, mut rng) = setup();
        let signed = oracle.issue(&key.public_key(), 7, &mut rng).unwrap();
        let other = DecryptionKey::from_seed(&[0x0F; 32]);

        assert_eq!(
            decrypt_randomness(&signed.ciphertext, &other),
            Err(OracleError::Decryption(EncryptionError::AuthenticationFailed))
        );
    }

    #[test]
    fn test_outcome_parity() {
        assert_eq!(derive_outcome(0, 5), 5);
        assert_eq!(derive_outcome(1, 5), -5);
        assert_eq!(derive_outcome(42, 5), 5);
        assert_eq!(derive_outcome(43, 5), -5);
        assert_eq!(derive_outcome(u64::MAX, 5), -5);
    }

    #[test]
    fn test_outcome_magnitude_saturates() {
        assert_eq!(derive_outcome(0, u64::MAX), i64::MAX);
        assert_eq!(derive_outcome(1, u64::MAX), -i64::MAX);
        assert_eq!(derive_outcome(1, 1u64 << 63), -i64::MAX);
        assert_eq!(derive_outcome(1, i64::MAX as u64), -i64::MAX);
    }

    proptest! {
        #[test]
        fn prop_outcome_follows_parity(value in any::<u64>()) {
            let outcome = derive_outcome(value, 5);
            if value % 2 == 0 {
                prop_assert_eq!(outcome, 5);
            } else {
                prop_assert_eq!(outcome, -5);
            }
        }
    }
}
