//! Postgres store implementation.
//!
//! One sqlx transaction per atomic unit. Balance reads that precede a debit
//! take `SELECT ... FOR UPDATE` row locks, so the funds check and the write
//! are isolated against concurrent units touching the same account.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use ledgercore_common::{
    AccountId, AccountNumber, Amount, LedgerError, Result, Timestamp, TransactionId, UserId,
};

use crate::account::{Account, NewUser, User};
use crate::config::DatabaseConfig;
use crate::store::{AccessMode, AtomicUnit, RowLock, Store};
use crate::transaction::{TransactionKind, TransactionRecord};

/// Embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Postgres-backed [`Store`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a pool according to the database configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.url)
            .await
            .map_err(storage)?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run pending schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))
    }
}

#[async_trait]
impl Store for PgStore {
    type Unit = PgUnit;

    async fn begin(&self, mode: AccessMode) -> Result<Self::Unit> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        if mode == AccessMode::ReadOnly {
            sqlx::query("SET TRANSACTION READ ONLY")
                .execute(&mut *tx)
                .await
                .map_err(storage)?;
        }

        Ok(PgUnit { tx })
    }
}

/// An atomic unit over one Postgres transaction.
///
/// Dropped units roll back; sqlx issues the rollback when the transaction
/// handle is dropped uncommitted.
pub struct PgUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AtomicUnit for PgUnit {
    async fn insert_user(
        &mut self,
        user: &NewUser,
        number: &AccountNumber,
    ) -> Result<(UserId, AccountId)> {
        let user_id = UserId::new();
        let account_id = AccountId::new();

        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, phone_number, email, password_hash) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user_id.as_uuid())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone_number)
        .bind(&user.email)
        .bind(user.credential_hash.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_or_storage(e, &user.phone_number))?;

        sqlx::query(
            "INSERT INTO accounts (id, user_id, account_number, balance) VALUES ($1, $2, $3, 0)",
        )
        .bind(account_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(number.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| unique_or_storage(e, &user.phone_number))?;

        Ok((user_id, account_id))
    }

    async fn find_account(
        &mut self,
        number: &AccountNumber,
        lock: RowLock,
    ) -> Result<Option<Account>> {
        let query = match lock {
            RowLock::None => {
                "SELECT id, user_id, account_number, balance, created_at \
                 FROM accounts WHERE account_number = $1"
            }
            RowLock::ForUpdate => {
                "SELECT id, user_id, account_number, balance, created_at \
                 FROM accounts WHERE account_number = $1 FOR UPDATE"
            }
        };

        let row = sqlx::query(query)
            .bind(number.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage)?;

        row.map(|r| account_from_row(&r)).transpose()
    }

    async fn write_balance(&mut self, id: AccountId, balance: Amount) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET balance = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(balance.value())
            .execute(&mut *self.tx)
            .await
            .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::StorageUnavailable(format!(
                "unknown account row {id}"
            )));
        }

        Ok(())
    }

    async fn append_transaction(&mut self, record: &TransactionRecord) -> Result<()> {
        // One log row per query path: a transfer is visible from both
        // accounts under the same transaction id and timestamp.
        let mut paths = vec![&record.to_account];
        if let Some(from) = &record.from_account {
            if from != &record.to_account {
                paths.push(from);
            }
        }

        for account_number in paths {
            sqlx::query(
                "INSERT INTO transactions \
                 (transaction_id, account_number, kind, amount, from_account, to_account, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(record.id.as_uuid())
            .bind(account_number.as_str())
            .bind(record.kind.as_str())
            .bind(record.amount.value())
            .bind(record.from_account.as_ref().map(|n| n.as_str()))
            .bind(record.to_account.as_str())
            .bind(record.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(storage)?;
        }

        Ok(())
    }

    async fn fetch_user(&mut self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(USER_QUERY)
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage)?;

        row.map(|r| user_from_row(&r)).transpose()
    }

    async fn fetch_users(&mut self) -> Result<Vec<User>> {
        let rows = sqlx::query(USERS_QUERY)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(storage)?;

        rows.iter().map(user_from_row).collect()
    }

    async fn fetch_history(
        &mut self,
        number: &AccountNumber,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query(
            "SELECT transaction_id, kind, amount, from_account, to_account, created_at \
             FROM transactions WHERE account_number = $1 \
             ORDER BY created_at DESC, entry_id DESC LIMIT $2",
        )
        .bind(number.as_str())
        .bind(limit.map(|l| l as i64).unwrap_or(i64::MAX))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(storage)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn delete_user(&mut self, id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(storage)?;

        Ok(result.rows_affected() > 0)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(storage)
    }

    async fn abort(self) -> Result<()> {
        self.tx.rollback().await.map_err(storage)
    }
}

const USER_QUERY: &str =
    "SELECT u.id, u.first_name, u.last_name, u.phone_number, u.email, u.created_at, \
            a.id AS account_id, a.account_number, a.balance, a.created_at AS account_created_at \
     FROM users u JOIN accounts a ON a.user_id = u.id \
     WHERE u.id = $1";

const USERS_QUERY: &str =
    "SELECT u.id, u.first_name, u.last_name, u.phone_number, u.email, u.created_at, \
            a.id AS account_id, a.account_number, a.balance, a.created_at AS account_created_at \
     FROM users u JOIN accounts a ON a.user_id = u.id \
     ORDER BY u.created_at";

fn storage(err: sqlx::Error) -> LedgerError {
    LedgerError::StorageUnavailable(err.to_string())
}

/// Map a uniqueness violation to `UserAlreadyExists`; anything else is an
/// infrastructure failure.
fn unique_or_storage(err: sqlx::Error, phone_number: &str) -> LedgerError {
    if let sqlx::Error::Database(db) = &err {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return LedgerError::UserAlreadyExists {
                phone_number: phone_number.to_string(),
            };
        }
    }
    storage(err)
}

fn account_from_row(row: &PgRow) -> Result<Account> {
    Ok(Account {
        id: AccountId::from_uuid(row.try_get::<Uuid, _>("id").map_err(storage)?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id").map_err(storage)?),
        number: AccountNumber::new(row.try_get::<String, _>("account_number").map_err(storage)?),
        balance: Amount::new(row.try_get::<Decimal, _>("balance").map_err(storage)?),
        created_at: row.try_get::<Timestamp, _>("created_at").map_err(storage)?,
    })
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let user_id = UserId::from_uuid(row.try_get::<Uuid, _>("id").map_err(storage)?);

    Ok(User {
        id: user_id,
        first_name: row.try_get("first_name").map_err(storage)?,
        last_name: row.try_get("last_name").map_err(storage)?,
        phone_number: row.try_get("phone_number").map_err(storage)?,
        email: row.try_get("email").map_err(storage)?,
        created_at: row.try_get::<Timestamp, _>("created_at").map_err(storage)?,
        account: Account {
            id: AccountId::from_uuid(row.try_get::<Uuid, _>("account_id").map_err(storage)?),
            user_id,
            number: AccountNumber::new(
                row.try_get::<String, _>("account_number").map_err(storage)?,
            ),
            balance: Amount::new(row.try_get::<Decimal, _>("balance").map_err(storage)?),
            created_at: row
                .try_get::<Timestamp, _>("account_created_at")
                .map_err(storage)?,
        },
    })
}

fn record_from_row(row: &PgRow) -> Result<TransactionRecord> {
    let kind_str: String = row.try_get("kind").map_err(storage)?;
    let kind = TransactionKind::parse(&kind_str).ok_or_else(|| {
        LedgerError::StorageUnavailable(format!("unknown transaction kind: {kind_str}"))
    })?;

    Ok(TransactionRecord {
        id: TransactionId::from_uuid(row.try_get::<Uuid, _>("transaction_id").map_err(storage)?),
        kind,
        amount: Amount::new(row.try_get::<Decimal, _>("amount").map_err(storage)?),
        from_account: row
            .try_get::<Option<String>, _>("from_account")
            .map_err(storage)?
            .map(AccountNumber::new),
        to_account: AccountNumber::new(row.try_get::<String, _>("to_account").map_err(storage)?),
        created_at: row.try_get::<Timestamp, _>("created_at").map_err(storage)?,
    })
}
