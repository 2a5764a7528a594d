//! Logging decorator for the ledger operation set.
//!
//! Wraps any [`Ledger`] at construction time, so logging stays an explicit
//! layer around the engine rather than global middleware state:
//!
//! ```ignore
//! let ledger = Logged::new(LedgerEngine::new(store, config));
//! ```

use std::time::Instant;

use async_trait::async_trait;
use tracing::{error, info, warn};

use ledgercore_common::{AccountNumber, Amount, LedgerError, Result, UserId};

use crate::account::{Account, RegisterRequest, Registration, User};
use crate::engine::Ledger;
use crate::transaction::TransactionRecord;

/// A [`Ledger`] that logs every operation's outcome and latency.
pub struct Logged<L> {
    inner: L,
}

impl<L> Logged<L> {
    /// Wrap a ledger.
    pub fn new(inner: L) -> Self {
        Self { inner }
    }

    /// Unwrap the inner ledger.
    pub fn into_inner(self) -> L {
        self.inner
    }
}

fn log_failure(operation: &'static str, elapsed_us: u64, err: &LedgerError) {
    if err.is_rejection() {
        warn!(
            operation,
            elapsed_us,
            code = err.error_code(),
            error = %err,
            "operation rejected"
        );
    } else {
        error!(
            operation,
            elapsed_us,
            code = err.error_code(),
            error = %err,
            "operation failed"
        );
    }
}

#[async_trait]
impl<L: Ledger> Ledger for Logged<L> {
    async fn register(&self, request: RegisterRequest) -> Result<Registration> {
        let started = Instant::now();
        match self.inner.register(request).await {
            Ok(registration) => {
                info!(
                    user_id = %registration.user_id,
                    account = %registration.account_number,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "register user"
                );
                Ok(registration)
            }
            Err(err) => {
                log_failure("register", started.elapsed().as_micros() as u64, &err);
                Err(err)
            }
        }
    }

    async fn deposit(&self, to: &AccountNumber, amount: Amount) -> Result<TransactionRecord> {
        let started = Instant::now();
        match self.inner.deposit(to, amount).await {
            Ok(record) => {
                info!(
                    transaction_id = %record.id,
                    account = %to,
                    amount = %amount,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "deposit"
                );
                Ok(record)
            }
            Err(err) => {
                log_failure("deposit", started.elapsed().as_micros() as u64, &err);
                Err(err)
            }
        }
    }

    async fn charge(&self, to: &AccountNumber, amount: Amount) -> Result<TransactionRecord> {
        let started = Instant::now();
        match self.inner.charge(to, amount).await {
            Ok(record) => {
                info!(
                    transaction_id = %record.id,
                    account = %to,
                    amount = %amount,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "charge"
                );
                Ok(record)
            }
            Err(err) => {
                log_failure("charge", started.elapsed().as_micros() as u64, &err);
                Err(err)
            }
        }
    }

    async fn transfer(
        &self,
        from: &AccountNumber,
        to: &AccountNumber,
        amount: Amount,
    ) -> Result<TransactionRecord> {
        let started = Instant::now();
        match self.inner.transfer(from, to, amount).await {
            Ok(record) => {
                info!(
                    transaction_id = %record.id,
                    from = %from,
                    to = %to,
                    amount = %amount,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "transfer"
                );
                Ok(record)
            }
            Err(err) => {
                log_failure("transfer", started.elapsed().as_micros() as u64, &err);
                Err(err)
            }
        }
    }

    async fn get_account(&self, number: &AccountNumber) -> Result<Account> {
        let started = Instant::now();
        match self.inner.get_account(number).await {
            Ok(account) => {
                info!(
                    account = %number,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "get account"
                );
                Ok(account)
            }
            Err(err) => {
                log_failure("get_account", started.elapsed().as_micros() as u64, &err);
                Err(err)
            }
        }
    }

    async fn get_user(&self, id: UserId) -> Result<User> {
        let started = Instant::now();
        match self.inner.get_user(id).await {
            Ok(user) => {
                info!(
                    user_id = %id,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "get user"
                );
                Ok(user)
            }
            Err(err) => {
                log_failure("get_user", started.elapsed().as_micros() as u64, &err);
                Err(err)
            }
        }
    }

    async fn get_users(&self) -> Result<Vec<User>> {
        let started = Instant::now();
        match self.inner.get_users().await {
            Ok(users) => {
                info!(
                    count = users.len(),
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "get users"
                );
                Ok(users)
            }
            Err(err) => {
                log_failure("get_users", started.elapsed().as_micros() as u64, &err);
                Err(err)
            }
        }
    }

    async fn get_transaction_history(
        &self,
        number: &AccountNumber,
    ) -> Result<Vec<TransactionRecord>> {
        let started = Instant::now();
        match self.inner.get_transaction_history(number).await {
            Ok(records) => {
                info!(
                    account = %number,
                    count = records.len(),
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "get transaction history"
                );
                Ok(records)
            }
            Err(err) => {
                log_failure(
                    "get_transaction_history",
                    started.elapsed().as_micros() as u64,
                    &err,
                );
                Err(err)
            }
        }
    }

    async fn delete_user(&self, id: UserId) -> Result<()> {
        let started = Instant::now();
        match self.inner.delete_user(id).await {
            Ok(()) => {
                info!(
                    user_id = %id,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "delete user"
                );
                Ok(())
            }
            Err(err) => {
                log_failure("delete_user", started.elapsed().as_micros() as u64, &err);
                Err(err)
            }
        }
    }
}
