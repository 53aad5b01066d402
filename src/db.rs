//! SQLite connection pool for the network store.
//!
//! WAL journaling lets readers resolve topologies while a writer replaces an
//! aggregation set. Writers that collide wait up to [`BUSY_TIMEOUT`] for the
//! lock instead of failing with `SQLITE_BUSY`; the revision and version
//! checks in the store then decide which of them wins.
//!
//! Foreign keys are enforced on every connection, so an aggregation row can
//! never point at a missing path, topology or kind.

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::time::Duration;

use crate::config::Config;

pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a pool on `[db].path`, creating the file and its parent directories.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "database pool opened");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use tempfile::TempDir;

    fn config_at(path: &std::path::Path) -> Config {
        let content = format!(
            "[db]\npath = \"{}\"\n\n[scope]\nstructure = \"north\"\n",
            path.display()
        );
        parse_config(&content).unwrap()
    }

    #[tokio::test]
    async fn test_connect_creates_nested_directories() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("a").join("b").join("net.sqlite");
        let pool = connect(&config_at(&db_path)).await.unwrap();
        assert!(db_path.exists());
        pool.close().await;
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let dir = TempDir::new().unwrap();
        let pool = connect(&config_at(&dir.path().join("net.sqlite")))
            .await
            .unwrap();
        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(enabled, 1);
        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode, "wal");
        pool.close().await;
    }
}
