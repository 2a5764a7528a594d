//! Password hashing and verification.
//!
//! Uses Argon2id with a per-credential random salt, stored in PHC string
//! format so parameters travel with the hash.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CryptoError, Result};

/// A salted one-way credential hash in PHC string format.
///
/// `Debug` and `Display` are redacted so the hash cannot leak through logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialHash(String);

impl CredentialHash {
    /// Wrap an already-encoded PHC hash string (e.g. read back from storage).
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Get the encoded hash for persistence.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialHash(<redacted>)")
    }
}

impl fmt::Display for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Hash a raw credential with a fresh random salt.
pub fn hash_password(raw: &str) -> Result<CredentialHash> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map_err(|e| CryptoError::HashingFailed(e.to_string()))?;

    Ok(CredentialHash(hash.to_string()))
}

/// Verify a raw credential against a stored hash.
pub fn verify_password(raw: &str, hash: &CredentialHash) -> Result<bool> {
    let parsed =
        PasswordHash::new(hash.as_str()).map_err(|e| CryptoError::InvalidHash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(raw.as_bytes(), &parsed)
        .is_ok())
}
