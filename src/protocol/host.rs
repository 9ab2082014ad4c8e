//! Host Ledger
//!
//! The protocol does not move value itself. The host ledger owns account
//! balances, performs transfers and reports the custody balance.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::account::AccountId;

/// Host ledger transfer failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// Sender balance too low.
    #[error("account {account} has {available}, needs {required}")]
    InsufficientFunds {
        /// Sending account.
        account: AccountId,
        /// Amount requested.
        required: u64,
        /// Amount held.
        available: u64,
    },
    /// Receiver balance would overflow.
    #[error("balance overflow for account {0}")]
    Overflow(AccountId),
}

/// Value-transfer collaborator.
///
/// Implementations must apply a transfer fully or not at all.
pub trait HostLedger {
    /// Current balance of `account`.
    fn balance(&self, account: &AccountId) -> u64;

    /// Move `amount` from `from` to `to`.
    fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: u64) -> Result<(), HostError>;
}

/// In-process host ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemoryHost {
    balances: BTreeMap<AccountId, u64>,
}

impl InMemoryHost {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint `amount` into `account`.
    pub fn credit(&mut self, account: AccountId, amount: u64) -> Result<(), HostError> {
        let balance = self.balances.entry(account).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(HostError::Overflow(account))?;
        Ok(())
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> u128 {
        self.balances.values().map(|v| *v as u128).sum()
    }
}

impl HostLedger for InMemoryHost {
    fn balance(&self, account: &AccountId) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: u64) -> Result<(), HostError> {
        let available = self.balance(from);
        if available < amount {
            return Err(HostError::InsufficientFunds {
                account: *from,
                required: amount,
                available,
            });
        }

        if from == to {
            return Ok(());
        }

        let receiver = self.balance(to);
        let credited = receiver.checked_add(amount).ok_or(HostError::Overflow(*to))?;

        self.balances.insert(*from, available - amount);
        self.balances.insert(*to, credited);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(b: u8) -> AccountId {
        AccountId::new([b; 32])
    }

    #[test]
    fn test_transfer_moves_value() {
        let mut host = InMemoryHost::new();
        host.credit(id(1), 100).unwrap();
        host.transfer(&id(1), &id(2), 40).unwrap();

        assert_eq!(host.balance(&id(1)), 60);
        assert_eq!(host.balance(&id(2)), 40);
        assert_eq!(host.total_supply(), 100);
    }

    #[test]
    fn test_transfer_exact_balance() {
        let mut host = InMemoryHost::new();
        host.credit(id(1), 40).unwrap();
        host.transfer(&id(1), &id(2), 40).unwrap();
        assert_eq!(host.balance(&id(1)), 0);
    }

    #[test]
    fn test_insufficient_funds_leaves_balances() {
        let mut host = InMemoryHost::new();
        host.credit(id(1), 10).unwrap();

        let err = host.transfer(&id(1), &id(2), 11).unwrap_err();
        assert_eq!(err, HostError::InsufficientFunds { account: id(1), required: 11, available: 10 });
        assert_eq!(host.balance(&id(1)), 10);
        assert_eq!(host.balance(&id(2)), 0);
    }

    #[test]
    fn test_overflow_rejected_atomically() {
        let mut host = InMemoryHost::new();
        host.credit(id(1), 10).unwrap();
        host.credit(id(2), u64::MAX).unwrap();

        assert_eq!(host.transfer(&id(1), &id(2), 1), Err(HostError::Overflow(id(2))));
        assert_eq!(host.balance(&id(1)), 10);
    }
}
