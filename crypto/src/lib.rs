//! Ledgercore Credential Hashing
//!
//! One-way, salted hashing for user credentials. Raw credentials are hashed
//! before any persistence and the hash is never returned to callers.

pub mod password;

pub use password::{hash_password, verify_password, CredentialHash};

/// Errors from credential hashing operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Hashing failed: {0}")]
    HashingFailed(String),

    #[error("Invalid hash encoding: {0}")]
    InvalidHash(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
