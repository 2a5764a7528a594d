//! Transaction records: the immutable, append-only monetary history.

use ledgercore_common::{now, AccountNumber, Amount, Timestamp, TransactionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of monetary event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Single-account credit initiated by the account holder.
    Deposit,
    /// Single-account credit initiated by a merchant or external party.
    Charge,
    /// Two-account debit+credit; one logical event visible from both
    /// account histories.
    Transfer,
}

impl TransactionKind {
    /// Stable string form used by the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Charge => "charge",
            TransactionKind::Transfer => "transfer",
        }
    }

    /// Parse the store's string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "deposit" => Some(TransactionKind::Deposit),
            "charge" => Some(TransactionKind::Charge),
            "transfer" => Some(TransactionKind::Transfer),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed monetary event.
///
/// Immutable once created; never updated or deleted. A `Transfer` record
/// carries both account references under a single id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique, time-ordered identifier.
    pub id: TransactionId,
    /// Event kind.
    pub kind: TransactionKind,
    /// Amount moved; always strictly positive.
    pub amount: Amount,
    /// Source account; present only for transfers.
    pub from_account: Option<AccountNumber>,
    /// Destination account.
    pub to_account: AccountNumber,
    /// Server-assigned commit timestamp.
    pub created_at: Timestamp,
}

impl TransactionRecord {
    /// Create a single-account credit record.
    pub fn credit(kind: TransactionKind, to_account: AccountNumber, amount: Amount) -> Self {
        debug_assert!(kind != TransactionKind::Transfer);
        Self {
            id: TransactionId::new(),
            kind,
            amount,
            from_account: None,
            to_account,
            created_at: now(),
        }
    }

    /// Create a transfer record referencing both accounts.
    pub fn transfer(from_account: AccountNumber, to_account: AccountNumber, amount: Amount) -> Self {
        Self {
            id: TransactionId::new(),
            kind: TransactionKind::Transfer,
            amount,
            from_account: Some(from_account),
            to_account,
            created_at: now(),
        }
    }

    /// Check whether the record references the given account as source or
    /// destination.
    pub fn references(&self, number: &AccountNumber) -> bool {
        self.to_account == *number || self.from_account.as_ref() == Some(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            TransactionKind::Deposit,
            TransactionKind::Charge,
            TransactionKind::Transfer,
        ] {
            assert_eq!(TransactionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TransactionKind::parse("withdrawal"), None);
    }

    #[test]
    fn test_transfer_references_both_sides() {
        let record = TransactionRecord::transfer(
            AccountNumber::new("1111"),
            AccountNumber::new("2222"),
            Amount::from_cents(4000),
        );

        assert!(record.references(&AccountNumber::new("1111")));
        assert!(record.references(&AccountNumber::new("2222")));
        assert!(!record.references(&AccountNumber::new("3333")));
    }

    #[test]
    fn test_credit_has_no_source() {
        let record = TransactionRecord::credit(
            TransactionKind::Deposit,
            AccountNumber::new("1111"),
            Amount::from_cents(10_000),
        );

        assert!(record.from_account.is_none());
        assert!(record.references(&AccountNumber::new("1111")));
    }
}
