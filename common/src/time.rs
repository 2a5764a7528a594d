//! Time utilities for ledgercore.

use chrono::{DateTime, Duration, Utc};

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Deadline bounding one ledger operation's atomic unit.
#[derive(Debug, Clone)]
pub struct Deadline {
    /// Instant after which the unit must abort.
    pub at: Timestamp,
    /// Operation the deadline applies to.
    pub operation: &'static str,
}

impl Deadline {
    /// Create a deadline expiring after `duration` from now.
    pub fn after(duration: std::time::Duration, operation: &'static str) -> Self {
        let duration = Duration::from_std(duration).unwrap_or_else(|_| Duration::days(365));
        Self {
            at: now() + duration,
            operation,
        }
    }

    /// Check if the deadline has passed.
    pub fn is_exceeded(&self) -> bool {
        now() > self.at
    }

    /// Get remaining time, zero once exceeded.
    pub fn remaining(&self) -> std::time::Duration {
        (self.at - now()).to_std().unwrap_or(std::time::Duration::ZERO)
    }
}
