//! # Channel Custody
//!
//! Collateral custody and coin-flip settlement for a two-party payment
//! channel between players and an operator.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CHANNEL CUSTODY                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Hashing and account identities           │
//! │  ├── hash.rs     - Domain-separated SHA-256                 │
//! │  └── account.rs  - Ed25519 account ids, ledger keys         │
//! │                                                             │
//! │  proof/          - Verification primitives                  │
//! │  ├── merkle.rs   - Sparse Merkle map and witnesses          │
//! │  ├── ledger.rs   - Membership proofs, root updates          │
//! │  ├── channel.rs  - Signed channel delta-balance proofs      │
//! │  ├── encryption.rs - Ristretto ElGamal                      │
//! │  └── oracle.rs   - Signed randomness, flip outcomes         │
//! │                                                             │
//! │  settlement/     - Deferred ledger writes                   │
//! │  ├── queue.rs    - Digest-chained action log                │
//! │  └── reducer.rs  - Folds actions into the root              │
//! │                                                             │
//! │  protocol/       - Operation surface                        │
//! │  └── controller.rs - deposit, withdraw, settle, flip        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## State Model
//!
//! The protocol persists three values: the ledger root, the oracle key and
//! the actions cursor. Per-player balances live off-state in a depth-256
//! sparse Merkle map; callers prove their balance with a witness on every
//! operation. Writes are queued and only reach the root at settlement.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod error;
pub mod proof;
pub mod protocol;
pub mod settlement;

// Re-export commonly used types
pub use config::ProtocolConfig;
pub use crate::core::{AccountId, Hash256, LedgerKey};
pub use error::{ProtocolError, ProtocolResult, SignatureFailure};
pub use proof::{ChannelProof, DecryptionKey, FlipOutcome, MerkleMap, MerkleWitness, RandomnessOracle, SignedRandomness};
pub use protocol::{CallContext, HostLedger, InMemoryHost, ProtocolController, ProtocolState, SettlementReport};
pub use settlement::{ActionQueue, ActionsCursor, FoldMode};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
