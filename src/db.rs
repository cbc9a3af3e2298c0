//! SQLite connection management.
//!
//! A store owns a pool capped at one connection, so every statement and
//! transaction goes through the same handle. The database file and its
//! parent directories are created on first connect.
//!
//! Connection pragmas:
//!
//! | Pragma | Value |
//! |--------|-------|
//! | `journal_mode` | `WAL` (file databases with `db.wal = true`) |
//! | `foreign_keys` | `ON` |
//! | `temp_store` | `MEMORY` |
//! | `busy_timeout` | `db.busy_timeout_ms` |

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::Result;

/// Open the single-connection pool for the configured database.
pub async fn connect(config: &StoreConfig) -> Result<SqlitePool> {
    let mut options = if config.is_in_memory() {
        SqliteConnectOptions::from_str("sqlite::memory:")?
    } else {
        let db_path = &config.db.path;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        if config.db.wal {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }
        options
    };

    options = options
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(config.db.busy_timeout_ms))
        .pragma("temp_store", "MEMORY");

    debug!(path = %config.db.path.display(), "Connecting to SQLite");

    // An in-memory database lives exactly as long as its connection, so the
    // pool must never recycle it.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    Ok(pool)
}
