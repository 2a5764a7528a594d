//! Error types for ledgercore operations.

use crate::{AccountNumber, Amount, UserId};
use thiserror::Error;

/// Main error type for ledger operations.
///
/// Business-rule failures are detected before or within an atomic unit and
/// abort it cleanly; no variant is ever raised after a partial mutation has
/// become visible.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Monetary amount is zero or negative.
    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: Amount },

    /// Referenced account does not exist.
    #[error("Account not found: {0}")]
    NoAccount(AccountNumber),

    /// Referenced user does not exist.
    #[error("User not found: {0}")]
    NoUser(UserId),

    /// Registration hit a uniqueness constraint.
    #[error("User already exists with phone number {phone_number}")]
    UserAlreadyExists { phone_number: String },

    /// Source balance is too low for the requested debit.
    #[error("Insufficient funds: balance = {balance}, requested = {requested}")]
    InsufficientFunds { balance: Amount, requested: Amount },

    /// The operation's atomic unit exceeded its deadline and was aborted.
    #[error("Operation deadline exceeded: {operation}")]
    DeadlineExceeded { operation: &'static str },

    /// The underlying store was unreachable or aborted the unit for
    /// infrastructure reasons. Safe to retry: an aborted unit leaves no
    /// effect.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Credential hashing failed.
    #[error("Credential hashing failed: {0}")]
    CredentialHash(String),
}

impl LedgerError {
    /// Check if the whole operation can be safely retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::StorageUnavailable(_) | LedgerError::DeadlineExceeded { .. }
        )
    }

    /// Check if this is a business-rule rejection rather than an
    /// infrastructure failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidAmount { .. }
                | LedgerError::NoAccount(_)
                | LedgerError::NoUser(_)
                | LedgerError::UserAlreadyExists { .. }
                | LedgerError::InsufficientFunds { .. }
        )
    }

    /// Get a stable error code for the request surface.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount { .. } => "INVALID_AMOUNT",
            LedgerError::NoAccount(_) => "NO_ACCOUNT",
            LedgerError::NoUser(_) => "NO_USER",
            LedgerError::UserAlreadyExists { .. } => "USER_ALREADY_EXISTS",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
            LedgerError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            LedgerError::CredentialHash(_) => "CREDENTIAL_HASH",
        }
    }
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
