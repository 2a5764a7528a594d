//! In-memory store for tests and simulation.
//!
//! Write units hold the state lock for their whole lifetime and mutate a
//! staged copy, so every write unit is serialized and commit/abort is
//! all-or-nothing. That is strictly stronger isolation than the row locks
//! the Postgres store takes, which keeps the engine's assumptions honest
//! under test. Read units clone a snapshot and release the lock at once.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use ledgercore_common::{
    now, AccountId, AccountNumber, Amount, LedgerError, Result, Timestamp, UserId,
};
use ledgercore_crypto::CredentialHash;

use crate::account::{Account, NewUser, User};
use crate::store::{AccessMode, AtomicUnit, RowLock, Store};
use crate::transaction::TransactionRecord;

#[derive(Debug, Clone)]
struct StoredUser {
    id: UserId,
    first_name: String,
    last_name: String,
    phone_number: String,
    email: String,
    #[allow(dead_code)]
    credential_hash: CredentialHash,
    created_at: Timestamp,
}

#[derive(Debug, Clone, Default)]
struct MemState {
    users: HashMap<UserId, StoredUser>,
    accounts: HashMap<AccountId, Account>,
    accounts_by_number: HashMap<AccountNumber, AccountId>,
    /// Append-only log; insertion order is commit order.
    log: Vec<TransactionRecord>,
}

impl MemState {
    fn user_view(&self, stored: &StoredUser) -> Option<User> {
        let account = self
            .accounts
            .values()
            .find(|a| a.user_id == stored.id)
            .cloned()?;

        Some(User {
            id: stored.id,
            first_name: stored.first_name.clone(),
            last_name: stored.last_name.clone(),
            phone_number: stored.phone_number.clone(),
            email: stored.email.clone(),
            created_at: stored.created_at,
            account,
        })
    }
}

/// In-memory [`Store`] implementation.
#[derive(Debug, Clone, Default)]
pub struct MemStore {
    state: Arc<Mutex<MemState>>,
}

impl MemStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemStore {
    type Unit = MemUnit;

    async fn begin(&self, mode: AccessMode) -> Result<Self::Unit> {
        match mode {
            AccessMode::ReadOnly => {
                let snapshot = self.state.lock().await.clone();
                Ok(MemUnit {
                    mode,
                    guard: None,
                    staged: snapshot,
                })
            }
            AccessMode::ReadWrite => {
                let guard = self.state.clone().lock_owned().await;
                let staged = guard.clone();
                Ok(MemUnit {
                    mode,
                    guard: Some(guard),
                    staged,
                })
            }
        }
    }
}

/// An atomic unit over [`MemStore`].
pub struct MemUnit {
    mode: AccessMode,
    guard: Option<OwnedMutexGuard<MemState>>,
    staged: MemState,
}

impl MemUnit {
    fn require_writable(&self) -> Result<()> {
        if self.mode != AccessMode::ReadWrite {
            return Err(LedgerError::StorageUnavailable(
                "write attempted in a read-only unit".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AtomicUnit for MemUnit {
    async fn insert_user(
        &mut self,
        user: &NewUser,
        number: &AccountNumber,
    ) -> Result<(UserId, AccountId)> {
        self.require_writable()?;

        let duplicate_phone = self
            .staged
            .users
            .values()
            .any(|u| u.phone_number == user.phone_number);
        if duplicate_phone || self.staged.accounts_by_number.contains_key(number) {
            return Err(LedgerError::UserAlreadyExists {
                phone_number: user.phone_number.clone(),
            });
        }

        let user_id = UserId::new();
        let account_id = AccountId::new();
        let created_at = now();

        self.staged.users.insert(
            user_id,
            StoredUser {
                id: user_id,
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                phone_number: user.phone_number.clone(),
                email: user.email.clone(),
                credential_hash: user.credential_hash.clone(),
                created_at,
            },
        );
        self.staged.accounts.insert(
            account_id,
            Account {
                id: account_id,
                user_id,
                number: number.clone(),
                balance: Amount::ZERO,
                created_at,
            },
        );
        self.staged
            .accounts_by_number
            .insert(number.clone(), account_id);

        Ok((user_id, account_id))
    }

    async fn find_account(
        &mut self,
        number: &AccountNumber,
        _lock: RowLock,
    ) -> Result<Option<Account>> {
        // Write units already hold the whole-state lock, which subsumes any
        // row lock the caller asked for.
        Ok(self
            .staged
            .accounts_by_number
            .get(number)
            .and_then(|id| self.staged.accounts.get(id))
            .cloned())
    }

    async fn write_balance(&mut self, id: AccountId, balance: Amount) -> Result<()> {
        self.require_writable()?;

        let account = self.staged.accounts.get_mut(&id).ok_or_else(|| {
            LedgerError::StorageUnavailable(format!("unknown account row {id}"))
        })?;
        account.balance = balance;
        Ok(())
    }

    async fn append_transaction(&mut self, record: &TransactionRecord) -> Result<()> {
        self.require_writable()?;
        self.staged.log.push(record.clone());
        Ok(())
    }

    async fn fetch_user(&mut self, id: UserId) -> Result<Option<User>> {
        Ok(self
            .staged
            .users
            .get(&id)
            .and_then(|stored| self.staged.user_view(stored)))
    }

    async fn fetch_users(&mut self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .staged
            .users
            .values()
            .filter_map(|stored| self.staged.user_view(stored))
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn fetch_history(
        &mut self,
        number: &AccountNumber,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>> {
        let records = self
            .staged
            .log
            .iter()
            .rev()
            .filter(|r| r.references(number))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(records)
    }

    async fn delete_user(&mut self, id: UserId) -> Result<bool> {
        self.require_writable()?;

        if self.staged.users.remove(&id).is_none() {
            return Ok(false);
        }

        // Cascade to the account; the transaction log is append-only and
        // survives the owner.
        if let Some(account_id) = self
            .staged
            .accounts
            .values()
            .find(|a| a.user_id == id)
            .map(|a| a.id)
        {
            if let Some(account) = self.staged.accounts.remove(&account_id) {
                self.staged.accounts_by_number.remove(&account.number);
            }
        }

        Ok(true)
    }

    async fn commit(mut self) -> Result<()> {
        if let Some(mut guard) = self.guard.take() {
            *guard = self.staged;
        }
        Ok(())
    }

    async fn abort(self) -> Result<()> {
        // Dropping the guard discards the staged copy.
        Ok(())
    }
}
