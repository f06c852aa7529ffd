//! SQLite connection pool with WAL mode.
//!
//! The pool is the only shared mutable resource of the service. Every
//! in-flight operation borrows a connection from it; when all connections
//! are busy, callers wait up to the acquire timeout and then fail with
//! `StoreUnavailable`.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Type alias for the SQLite connection pool.
pub type DbPool = Pool<Sqlite>;

/// Sizing and wait limits for the connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Upper bound on open connections.
    pub max_connections: u32,
    /// How long a caller may wait for a free connection.
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked database before giving up.
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
            busy_timeout: Duration::from_secs(30),
        }
    }
}

/// Create a new connection pool with WAL mode enabled.
///
/// WAL mode lets statistics reads proceed while a writer holds the
/// database; writers are serialized by SQLite itself.
///
/// # Arguments
/// * `db_path` - Path to the SQLite database file
/// * `settings` - Pool sizing and timeouts
///
/// # Returns
/// A connection pool ready for use
pub async fn create_pool(db_path: &Path, settings: PoolSettings) -> Result<DbPool, sqlx::Error> {
    let db_url = format!("sqlite:{}", db_path.display());

    let connect_options = SqliteConnectOptions::from_str(&db_url)?
        // Create the database file if it doesn't exist
        .create_if_missing(true)
        // Enable WAL mode for concurrent access
        .journal_mode(SqliteJournalMode::Wal)
        // NORMAL synchronous mode balances safety and performance
        .synchronous(SqliteSynchronous::Normal)
        // Reviewer rows must point at real users and pull requests
        .foreign_keys(true)
        // Concurrent writers queue on the database lock instead of failing
        .busy_timeout(settings.busy_timeout)
        .pragma("wal_autocheckpoint", "1000");

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.max_connections.max(1))
        // Keep one connection warm
        .min_connections(1)
        .acquire_timeout(settings.acquire_timeout)
        .connect_with(connect_options)
        .await?;

    // Verify WAL mode is enabled
    let mode: (String,) = sqlx::query_as("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await?;

    debug_assert!(
        mode.0.to_lowercase() == "wal",
        "WAL mode should be enabled, got: {}",
        mode.0
    );

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_create_pool_with_wal() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let pool = create_pool(&db_path, PoolSettings::default()).await.unwrap();

        let mode: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.0.to_lowercase(), "wal");

        let fk: (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(fk.0, 1);
    }

    #[tokio::test]
    async fn test_exhausted_pool_times_out() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let settings = PoolSettings {
            max_connections: 1,
            acquire_timeout: Duration::from_millis(100),
            ..PoolSettings::default()
        };
        let pool = create_pool(&db_path, settings).await.unwrap();

        // Hold the only connection
        let _held = pool.acquire().await.unwrap();

        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, sqlx::Error::PoolTimedOut));

        let app_err = crate::error::AppError::from(err);
        assert!(matches!(
            app_err,
            crate::error::AppError::StoreUnavailable { .. }
        ));
    }
}
