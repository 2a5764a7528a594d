//! Ledger engine configuration.

use std::time::Duration;

/// Database connection configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection URL.
    pub url: String,
    /// Maximum pool size.
    pub max_connections: u32,
    /// Timeout for acquiring a connection.
    pub connect_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/ledgercore".to_string(),
            max_connections: 10,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Main ledger engine configuration.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Deadline bounding each operation's atomic unit. A unit that runs
    /// past it aborts cleanly with no partial effect.
    pub operation_deadline: Duration,
    /// Maximum history records returned per query, unbounded when `None`.
    pub history_limit: Option<usize>,
    /// Database configuration.
    pub database: DatabaseConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            operation_deadline: Duration::from_secs(3),
            history_limit: None,
            database: DatabaseConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }

        if let Ok(ms) = std::env::var("LEDGER_OPERATION_DEADLINE_MS") {
            if let Ok(ms) = ms.parse() {
                config.operation_deadline = Duration::from_millis(ms);
            }
        }

        if let Ok(limit) = std::env::var("LEDGER_HISTORY_LIMIT") {
            if let Ok(limit) = limit.parse() {
                config.history_limit = Some(limit);
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.operation_deadline.is_zero() {
            return Err("Operation deadline cannot be zero".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }

        if self.database.max_connections == 0 {
            return Err("Database pool cannot be empty".to_string());
        }

        if self.history_limit == Some(0) {
            return Err("History limit cannot be zero".to_string());
        }

        Ok(())
    }
}
