//! Verification Primitives
//!
//! Everything the protocol checks before it accepts an operation:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF PRIMITIVES                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  merkle.rs     - Sparse Merkle map and witnesses            │
//! │  ledger.rs     - Membership proofs against the root         │
//! │  channel.rs    - Signed channel delta-balance proofs        │
//! │  encryption.rs - Ristretto ElGamal for oracle randomness    │
//! │  oracle.rs     - Oracle signatures and flip outcomes        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod merkle;
pub mod ledger;
pub mod channel;
pub mod encryption;
pub mod oracle;

// Re-export key types
pub use merkle::{MerkleMap, MerkleWitness, WitnessNode, empty_root, MAP_DEPTH};
pub use ledger::{prove_membership, compute_updated_root, LedgerError};
pub use channel::{ChannelProof, ChannelError, apply_delta};
pub use encryption::{Ciphertext, DecryptionKey, EncryptionPublicKey, EncryptionError};
pub use oracle::{
    RandomnessOracle, SignedRandomness, FlipOutcome, OracleError,
    verify_signature, decrypt_randomness, derive_outcome,
};
