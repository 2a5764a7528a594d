//! The atomic-unit boundary between the ledger engine and durable storage.
//!
//! The store is a passive persistence collaborator: it holds account rows
//! and the append-only transaction log but carries no business logic. All
//! invariant enforcement happens in the engine, inside one [`AtomicUnit`]
//! per operation.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use ledgercore_common::{AccountId, AccountNumber, Amount, Result, UserId};

use crate::account::{Account, NewUser, User};
use crate::transaction::TransactionRecord;

/// Access mode for an atomic unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Non-blocking reads; no writes permitted.
    ReadOnly,
    /// Reads and writes with row-level isolation.
    ReadWrite,
}

/// Row-locking behavior for account lookups within a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLock {
    /// Plain read.
    None,
    /// Hold an exclusive lock on the row until the unit resolves, so a
    /// concurrent unit against the same account serializes after this one.
    ForUpdate,
}

/// A transactional store the engine runs its atomic units against.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Unit: AtomicUnit;

    /// Begin a new atomic unit.
    async fn begin(&self, mode: AccessMode) -> Result<Self::Unit>;
}

/// A group of reads and writes that commit or abort as a whole.
///
/// Dropping a unit without calling [`commit`](AtomicUnit::commit) aborts it;
/// an aborted unit leaves no visible effect.
#[async_trait]
pub trait AtomicUnit: Send {
    /// Insert a user row and its zero-balance account as one step.
    ///
    /// Fails with `UserAlreadyExists` on a phone-number or account-number
    /// uniqueness violation, leaving no partial row behind.
    async fn insert_user(
        &mut self,
        user: &NewUser,
        number: &AccountNumber,
    ) -> Result<(UserId, AccountId)>;

    /// Look up an account by number, optionally locking the row.
    async fn find_account(
        &mut self,
        number: &AccountNumber,
        lock: RowLock,
    ) -> Result<Option<Account>>;

    /// Overwrite an account's balance.
    async fn write_balance(&mut self, id: AccountId, balance: Amount) -> Result<()>;

    /// Append a record to the transaction log.
    ///
    /// A transfer record is materialized under both the source and the
    /// destination account's query paths, with one id and one timestamp.
    async fn append_transaction(&mut self, record: &TransactionRecord) -> Result<()>;

    /// Fetch a user with their account.
    async fn fetch_user(&mut self, id: UserId) -> Result<Option<User>>;

    /// Fetch all users with their accounts.
    async fn fetch_users(&mut self) -> Result<Vec<User>>;

    /// Fetch all records referencing the account, most recent first.
    async fn fetch_history(
        &mut self,
        number: &AccountNumber,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>>;

    /// Delete a user; the account cascades, the transaction log does not.
    /// Returns `false` when no such user exists.
    async fn delete_user(&mut self, id: UserId) -> Result<bool>;

    /// Make the unit's effects durable.
    async fn commit(self) -> Result<()>
    where
        Self: Sized;

    /// Discard the unit's effects.
    async fn abort(self) -> Result<()>
    where
        Self: Sized;
}
