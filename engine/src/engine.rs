//! Core ledger engine implementation.

use std::future::Future;

use async_trait::async_trait;
use tracing::instrument;

use ledgercore_common::{
    AccountNumber, Amount, Deadline, LedgerError, Result, UserId,
};
use ledgercore_crypto::hash_password;

use crate::account::{
    generate_account_number, Account, NewUser, RegisterRequest, Registration, User,
};
use crate::config::LedgerConfig;
use crate::store::{AccessMode, AtomicUnit, RowLock, Store};
use crate::transaction::{TransactionKind, TransactionRecord};

/// The ledger engine's operation set.
///
/// Every operation is stateless from the caller's point of view: it either
/// commits fully or rejects with one error kind, and no intermediate state
/// is ever observable. Decorators (see [`crate::logging::Logged`]) compose
/// over this trait at construction time.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Register a user with a fresh zero-balance account.
    async fn register(&self, request: RegisterRequest) -> Result<Registration>;

    /// Credit an account with a deposit.
    async fn deposit(&self, to: &AccountNumber, amount: Amount) -> Result<TransactionRecord>;

    /// Credit an account with a charge.
    async fn charge(&self, to: &AccountNumber, amount: Amount) -> Result<TransactionRecord>;

    /// Move funds between two accounts as one atomic debit+credit.
    async fn transfer(
        &self,
        from: &AccountNumber,
        to: &AccountNumber,
        amount: Amount,
    ) -> Result<TransactionRecord>;

    /// Get an account's current balance and identity fields.
    async fn get_account(&self, number: &AccountNumber) -> Result<Account>;

    /// Get a user with their account.
    async fn get_user(&self, id: UserId) -> Result<User>;

    /// List all users with their accounts.
    async fn get_users(&self) -> Result<Vec<User>>;

    /// Get all records referencing the account, most recent first.
    async fn get_transaction_history(
        &self,
        number: &AccountNumber,
    ) -> Result<Vec<TransactionRecord>>;

    /// Delete a user; their account cascades, the transaction log stays.
    async fn delete_user(&self, id: UserId) -> Result<()>;
}

/// Ledger engine over a transactional store.
///
/// Holds no mutable state of its own; all shared state lives behind the
/// store's atomic-unit boundary.
pub struct LedgerEngine<S: Store> {
    store: S,
    config: LedgerConfig,
}

impl<S: Store> LedgerEngine<S> {
    /// Create a new engine.
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Run an operation's atomic unit under the configured deadline.
    ///
    /// On expiry the unit future is dropped, which aborts the unit; the
    /// caller sees `DeadlineExceeded` and no partial effect.
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        let deadline = Deadline::after(self.config.operation_deadline, operation);
        match tokio::time::timeout(deadline.remaining(), fut).await {
            Ok(result) => result,
            Err(_) => Err(LedgerError::DeadlineExceeded { operation }),
        }
    }

    /// Shared single-account credit path for deposits and charges.
    async fn credit(
        &self,
        kind: TransactionKind,
        to: &AccountNumber,
        amount: Amount,
    ) -> Result<TransactionRecord> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount { amount });
        }

        let mut unit = self.store.begin(AccessMode::ReadWrite).await?;

        let account = unit
            .find_account(to, RowLock::ForUpdate)
            .await?
            .ok_or_else(|| LedgerError::NoAccount(to.clone()))?;

        unit.write_balance(account.id, account.balance + amount).await?;

        let record = TransactionRecord::credit(kind, to.clone(), amount);
        unit.append_transaction(&record).await?;
        unit.commit().await?;

        Ok(record)
    }
}

#[async_trait]
impl<S: Store> Ledger for LedgerEngine<S> {
    #[instrument(skip(self, request))]
    async fn register(&self, request: RegisterRequest) -> Result<Registration> {
        // The raw credential is hashed before any persistence and never
        // enters the atomic unit.
        let credential_hash = hash_password(&request.password)
            .map_err(|e| LedgerError::CredentialHash(e.to_string()))?;

        let new_user = NewUser {
            first_name: request.first_name,
            last_name: request.last_name,
            phone_number: request.phone_number,
            email: request.email,
            credential_hash,
        };
        let number = generate_account_number();

        self.bounded("register", async {
            let mut unit = self.store.begin(AccessMode::ReadWrite).await?;
            let (user_id, account_id) = unit.insert_user(&new_user, &number).await?;
            unit.commit().await?;

            Ok(Registration {
                user_id,
                account_id,
                account_number: number.clone(),
                balance: Amount::ZERO,
            })
        })
        .await
    }

    #[instrument(skip(self))]
    async fn deposit(&self, to: &AccountNumber, amount: Amount) -> Result<TransactionRecord> {
        self.bounded("deposit", self.credit(TransactionKind::Deposit, to, amount))
            .await
    }

    #[instrument(skip(self))]
    async fn charge(&self, to: &AccountNumber, amount: Amount) -> Result<TransactionRecord> {
        self.bounded("charge", self.credit(TransactionKind::Charge, to, amount))
            .await
    }

    #[instrument(skip(self))]
    async fn transfer(
        &self,
        from: &AccountNumber,
        to: &AccountNumber,
        amount: Amount,
    ) -> Result<TransactionRecord> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount { amount });
        }

        self.bounded("transfer", async {
            let mut unit = self.store.begin(AccessMode::ReadWrite).await?;

            // Lock rows in account-number order so two opposing transfers
            // cannot form a lock cycle.
            let (source, destination) = if from == to {
                let row = unit.find_account(from, RowLock::ForUpdate).await?;
                (row.clone(), row)
            } else if from < to {
                let source = unit.find_account(from, RowLock::ForUpdate).await?;
                let destination = unit.find_account(to, RowLock::ForUpdate).await?;
                (source, destination)
            } else {
                let destination = unit.find_account(to, RowLock::ForUpdate).await?;
                let source = unit.find_account(from, RowLock::ForUpdate).await?;
                (source, destination)
            };

            // Both existences are verified before any balance evaluation;
            // a missing source is reported ahead of a missing destination.
            let source = source.ok_or_else(|| LedgerError::NoAccount(from.clone()))?;
            let destination = destination.ok_or_else(|| LedgerError::NoAccount(to.clone()))?;

            // The funds check and the debit share the unit and the row
            // lock, so a concurrent transfer from the same source account
            // re-evaluates against the committed balance.
            if source.balance < amount {
                return Err(LedgerError::InsufficientFunds {
                    balance: source.balance,
                    requested: amount,
                });
            }

            if source.id == destination.id {
                // Debit and credit cancel; the balance is untouched but the
                // event is still recorded.
            } else {
                unit.write_balance(source.id, source.balance - amount).await?;
                unit.write_balance(destination.id, destination.balance + amount)
                    .await?;
            }

            let record = TransactionRecord::transfer(from.clone(), to.clone(), amount);
            unit.append_transaction(&record).await?;
            unit.commit().await?;

            Ok(record)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn get_account(&self, number: &AccountNumber) -> Result<Account> {
        self.bounded("get_account", async {
            let mut unit = self.store.begin(AccessMode::ReadOnly).await?;
            let account = unit
                .find_account(number, RowLock::None)
                .await?
                .ok_or_else(|| LedgerError::NoAccount(number.clone()))?;
            unit.commit().await?;
            Ok(account)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn get_user(&self, id: UserId) -> Result<User> {
        self.bounded("get_user", async {
            let mut unit = self.store.begin(AccessMode::ReadOnly).await?;
            let user = unit
                .fetch_user(id)
                .await?
                .ok_or(LedgerError::NoUser(id))?;
            unit.commit().await?;
            Ok(user)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn get_users(&self) -> Result<Vec<User>> {
        self.bounded("get_users", async {
            let mut unit = self.store.begin(AccessMode::ReadOnly).await?;
            let users = unit.fetch_users().await?;
            unit.commit().await?;
            Ok(users)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn get_transaction_history(
        &self,
        number: &AccountNumber,
    ) -> Result<Vec<TransactionRecord>> {
        self.bounded("get_transaction_history", async {
            let mut unit = self.store.begin(AccessMode::ReadOnly).await?;
            let records = unit.fetch_history(number, self.config.history_limit).await?;
            unit.commit().await?;
            Ok(records)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, id: UserId) -> Result<()> {
        self.bounded("delete_user", async {
            let mut unit = self.store.begin(AccessMode::ReadWrite).await?;
            if !unit.delete_user(id).await? {
                return Err(LedgerError::NoUser(id));
            }
            unit.commit().await?;
            Ok(())
        })
        .await
    }
}
