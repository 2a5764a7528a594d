//! Ledgercore Ledger Engine
//!
//! The component that owns balance and transaction-history invariants for
//! the account backend. Every mutation (registration, credit, transfer) runs
//! inside one atomic unit against the store, so money is never created,
//! destroyed, or double-spent, and a transfer is one logical event visible
//! from both account histories.

pub mod account;
pub mod config;
pub mod engine;
pub mod logging;
pub mod store;
pub mod transaction;

pub use account::{Account, NewUser, RegisterRequest, Registration, User};
pub use config::{DatabaseConfig, LedgerConfig};
pub use engine::{Ledger, LedgerEngine};
pub use logging::Logged;
pub use store::memory::MemStore;
pub use store::postgres::PgStore;
pub use store::{AccessMode, AtomicUnit, RowLock, Store};
pub use transaction::{TransactionKind, TransactionRecord};
