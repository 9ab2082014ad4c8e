//! Core primitives.
//!
//! Domain-separated hashing and account identities. Everything above this
//! layer commits to data through [`DomainHasher`].

pub mod account;
pub mod hash;

// Re-export core types
pub use account::{AccountId, LedgerKey};
pub use hash::{hash_with_domain, DomainHasher, Hash256};
