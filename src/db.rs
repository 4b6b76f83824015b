//! SQLite connection pool setup.
//!
//! The schema relies on `FOREIGN KEY` constraints between users, documents,
//! chunks, sessions, and messages; SQLite only enforces those when
//! `foreign_keys` is enabled per connection, so it is switched on here for
//! every pooled connection.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .foreign_keys(true);

    // One writer (the ingest worker) plus a handful of request handlers; a
    // small pool is plenty for SQLite's single-writer model.
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
