//! User and account domain types.

use ledgercore_common::{AccountId, AccountNumber, Amount, Timestamp, UserId};
use ledgercore_crypto::CredentialHash;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A monetary account owned by exactly one user.
///
/// The balance is non-negative at every durable commit point and is mutated
/// only by the ledger engine's credit and transfer operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Surrogate row id.
    pub id: AccountId,
    /// Owning user.
    pub user_id: UserId,
    /// External account number callers address the account by.
    pub number: AccountNumber,
    /// Current balance.
    pub balance: Amount,
    /// When the account was created.
    pub created_at: Timestamp,
}

/// A registered user with their account, as returned by queries.
///
/// Never carries the credential hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    /// Natural key; unique across all users.
    pub phone_number: String,
    pub email: String,
    pub created_at: Timestamp,
    pub account: Account,
}

/// Candidate profile for registration, before any persistence.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: String,
    /// Raw credential; hashed before the atomic unit begins.
    pub password: String,
}

/// A user row ready for insertion: profile fields plus the already-hashed
/// credential. The raw credential never reaches the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: String,
    pub credential_hash: CredentialHash,
}

/// Result of a successful registration: assigned identifiers and the public
/// account fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub user_id: UserId,
    pub account_id: AccountId,
    pub account_number: AccountNumber,
    pub balance: Amount,
}

/// Generate a fresh 16-digit account number.
///
/// The store's uniqueness constraint is the authority; a collision surfaces
/// as `UserAlreadyExists` and the caller may retry registration.
pub fn generate_account_number() -> AccountNumber {
    let mut rng = rand::thread_rng();
    let digits: String = (0..16).map(|_| rng.gen_range(0..=9).to_string()).collect();
    AccountNumber::new(digits)
}
