//! `SQLite` connection pool setup and schema bootstrap.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::{AppError, Result};

use super::schema;

/// Alias for the shared `SQLite` pool.
pub type Database = SqlitePool;

/// Connect to the database file at `path`, creating it and its parent
/// directory if needed, and apply the schema.
///
/// # Errors
///
/// Returns `AppError::Db` if the connection or schema application fails.
pub async fn connect(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|err| AppError::Db(format!("failed to create db dir: {err}")))?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    schema::bootstrap_schema(&pool).await?;
    Ok(pool)
}

/// Connect to a private in-memory database (tests and dry runs).
///
/// A single connection is used so every query sees the same memory database.
///
/// # Errors
///
/// Returns `AppError::Db` if the connection or schema application fails.
pub async fn connect_memory() -> Result<Database> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    schema::bootstrap_schema(&pool).await?;
    Ok(pool)
}
