//! Randomness Encryption
//!
//! ElGamal-style hybrid encryption over Ristretto for a single `u64`
//! plaintext. A ciphertext is an ephemeral point `r·G` plus two field
//! elements: the masked plaintext and an authentication tag, both derived
//! from the shared secret `r·PK`.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use rand::{CryptoRng, RngCore};
use serde::{Serialize, Deserialize};
use sha2::{Digest, Sha512};
use thiserror::Error;

use crate::core::hash::{DomainHasher, Hash256};

/// Domain separator for key scalar derivation.
const KEY_DERIVE_DOMAIN: &[u8] = b"CHANNEL_CUSTODY_ENC_KEY_V1";

/// Domain separator for ephemeral nonce derivation.
const NONCE_DERIVE_DOMAIN: &[u8] = b"CHANNEL_CUSTODY_ENC_NONCE_V1";

/// Domain separator for the plaintext mask.
const MASK_DOMAIN: &[u8] = b"CHANNEL_CUSTODY_ENC_MASK_V1";

/// Domain separator for the authentication tag.
const TAG_DOMAIN: &[u8] = b"CHANNEL_CUSTODY_ENC_TAG_V1";

/// Encryption and decryption failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncryptionError {
    /// Point bytes are not a canonical Ristretto encoding.
    #[error("malformed group element")]
    MalformedPoint,
    /// Authentication tag does not match (wrong key or tampered ciphertext).
    #[error("ciphertext authentication failed")]
    AuthenticationFailed,
    /// Plaintext does not fit a u64.
    #[error("decrypted value is not a u64")]
    MalformedPlaintext,
}

/// Public encryption key (compressed Ristretto point).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionPublicKey(pub [u8; 32]);

/// Secret decryption key.
#[derive(Clone)]
pub struct DecryptionKey {
    scalar: Scalar,
}

impl std::fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionKey").finish_non_exhaustive()
    }
}

impl DecryptionKey {
    /// Derive a key deterministically from 32 seed bytes.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            scalar: wide_scalar(KEY_DERIVE_DOMAIN, seed),
        }
    }

    /// Generate a fresh key.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self::from_seed(&seed)
    }

    /// Matching public key.
    pub fn public_key(&self) -> EncryptionPublicKey {
        let point = RISTRETTO_BASEPOINT_POINT * self.scalar;
        EncryptionPublicKey(point.compress().to_bytes())
    }
}

/// Encrypted `u64`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    /// Ephemeral point `r·G`.
    pub ephemeral: [u8; 32],
    /// Masked plaintext, then authentication tag.
    pub fields: [Hash256; 2],
}

/// Encrypt `plaintext` to `recipient` with a fresh nonce.
pub fn encrypt<R: RngCore + CryptoRng>(
    recipient: &EncryptionPublicKey,
    plaintext: u64,
    rng: &mut R,
) -> Result<Ciphertext, EncryptionError> {
    let mut nonce_seed = [0u8; 32];
    rng.fill_bytes(&mut nonce_seed);
    encrypt_with_nonce(recipient, plaintext, &nonce_seed)
}

/// Encrypt with a caller-chosen nonce seed.
///
/// Reusing a seed for two plaintexts to the same key leaks their XOR.
pub fn encrypt_with_nonce(
    recipient: &EncryptionPublicKey,
    plaintext: u64,
    nonce_seed: &[u8; 32],
) -> Result<Ciphertext, EncryptionError> {
    let recipient_point = decompress(&recipient.0)?;
    let r = wide_scalar(NONCE_DERIVE_DOMAIN, nonce_seed);

    let ephemeral = (RISTRETTO_BASEPOINT_POINT * r).compress().to_bytes();
    let shared = (recipient_point * r).compress().to_bytes();

    let mask = mask_for(&shared, &ephemeral);
    let mut masked = [0u8; 32];
    masked[..8].copy_from_slice(&plaintext.to_le_bytes());
    xor_in_place(&mut masked, &mask);

    let tag = tag_for(&shared, &masked);

    Ok(Ciphertext {
        ephemeral,
        fields: [masked, tag],
    })
}

/// Decrypt a ciphertext with the recipient's key.
pub fn decrypt(ciphertext: &Ciphertext, key: &DecryptionKey) -> Result<u64, EncryptionError> {
    let ephemeral_point = decompress(&ciphertext.ephemeral)?;
    let shared = (ephemeral_point * key.scalar).compress().to_bytes();

    let [masked, tag] = &ciphertext.fields;
    if tag_for(&shared, masked) != *tag {
        return Err(EncryptionError::AuthenticationFailed);
    }

    let mut plain = *masked;
    xor_in_place(&mut plain, &mask_for(&shared, &ciphertext.ephemeral));

    if plain[8..].iter().any(|b| *b != 0) {
        return Err(EncryptionError::MalformedPlaintext);
    }

    let mut value = [0u8; 8];
    value.copy_from_slice(&plain[..8]);
    Ok(u64::from_le_bytes(value))
}

fn decompress(bytes: &[u8; 32]) -> Result<RistrettoPoint, EncryptionError> {
    CompressedRistretto(*bytes)
        .decompress()
        .ok_or(EncryptionError::MalformedPoint)
}

fn wide_scalar(domain: &[u8], seed: &[u8; 32]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(domain);
    hasher.update(seed);
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    Scalar::from_bytes_mod_order_wide(&wide)
}

fn mask_for(shared: &[u8; 32], ephemeral: &[u8; 32]) -> Hash256 {
    let mut hasher = DomainHasher::new(MASK_DOMAIN);
    hasher.update_bytes(shared);
    hasher.update_bytes(ephemeral);
    hasher.finalize()
}

fn tag_for(shared: &[u8; 32], masked: &Hash256) -> Hash256 {
    let mut hasher = DomainHasher::new(TAG_DOMAIN);
    hasher.update_bytes(shared);
    hasher.update_hash(masked);
    hasher.finalize()
}

fn xor_in_place(target: &mut Hash256, mask: &Hash256) {
    for (t, m) in target.iter_mut().zip(mask.iter()) {
        *t ^= m;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_encrypt_decrypt() {
        let key = DecryptionKey::from_seed(&[1; 32]);
        let mut rng = StdRng::seed_from_u64(7);

        for value in [0u64, 1, 2, 42, u64::MAX] {
            let ct = encrypt(&key.public_key(), value, &mut rng).unwrap();
            assert_eq!(decrypt(&ct, &key).unwrap(), value);
        }
    }

    #[test]
    fn test_fixed_nonce_is_deterministic() {
        let key = DecryptionKey::from_seed(&[1; 32]);
        let a = encrypt_with_nonce(&key.public_key(), 9, &[5; 32]).unwrap();
        let b = encrypt_with_nonce(&key.public_key(), 9, &[5; 32]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fresh_nonces_differ() {
        let key = DecryptionKey::from_seed(&[1; 32]);
        let a = encrypt_with_nonce(&key.public_key(), 9, &[5; 32]).unwrap();
        let b = encrypt_with_nonce(&key.public_key(), 9, &[6; 32]).unwrap();
        assert_ne!(a.fields, b.fields);
        assert_ne!(a.ephemeral, b.ephemeral);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = DecryptionKey::from_seed(&[1; 32]);
        let other = DecryptionKey::from_seed(&[2; 32]);
        let ct = encrypt_with_nonce(&key.public_key(), 9, &[5; 32]).unwrap();

        assert_eq!(decrypt(&ct, &other), Err(EncryptionError::AuthenticationFailed));
    }

    #[test]
    fn test_tampered_field_fails() {
        let key = DecryptionKey::from_seed(&[1; 32]);
        let mut ct = encrypt_with_nonce(&key.public_key(), 9, &[5; 32]).unwrap();
        ct.fields[0][0] ^= 1;

        assert_eq!(decrypt(&ct, &key), Err(EncryptionError::AuthenticationFailed));
    }

    #[test]
    fn test_tampered_ephemeral_fails() {
        let key = DecryptionKey::from_seed(&[1; 32]);
        let other = encrypt_with_nonce(&key.public_key(), 1, &[8; 32]).unwrap();
        let mut ct = encrypt_with_nonce(&key.public_key(), 9, &[5; 32]).unwrap();
        ct.ephemeral = other.ephemeral;

        assert_eq!(decrypt(&ct, &key), Err(EncryptionError::AuthenticationFailed));
    }

    #[test]
    fn test_malformed_point() {
        let key = DecryptionKey::from_seed(&[1; 32]);
        let mut ct = encrypt_with_nonce(&key.public_key(), 9, &[5; 32]).unwrap();
        ct.ephemeral = [0xFF; 32];

        assert_eq!(decrypt(&ct, &key), Err(EncryptionError::MalformedPoint));
        assert_eq!(
            encrypt_with_nonce(&EncryptionPublicKey([0xFF; 32]), 1, &[0; 32]),
            Err(EncryptionError::MalformedPoint)
        );
    }
}
