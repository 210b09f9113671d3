//! SQLite storage backend for tollgate.
//!
//! ```rust,no_run
//! use tollgate_storage_sqlite::SqliteStorage;
//!
//! # async fn run() -> Result<(), tollgate_core::Error> {
//! let storage = SqliteStorage::connect("sqlite://tollgate.db").await?;
//! storage.migrate().await?;
//! let repository = storage.attempts();
//! # Ok(())
//! # }
//! ```
pub mod migrations;
pub mod repositories;

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tollgate_core::{Error, error::StorageError};
use tollgate_migration::MigrationManager;

pub use migrations::SqliteMigrationManager;
pub use repositories::SqliteAttemptRepository;

/// How long a query waits for a free connection before the store is
/// considered unavailable.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Owner of the SQLite connection pool.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `url`, creating the database file if needed.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StorageError::Unavailable(format!("Invalid database url: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to connect to database");
                StorageError::Unavailable("Failed to connect to database".to_string())
            })?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply any pending schema migrations.
    pub async fn migrate(&self) -> Result<(), Error> {
        let manager = SqliteMigrationManager::new(self.pool.clone());
        manager.initialize().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to initialize migrations");
            StorageError::Migration("Failed to initialize migrations".to_string())
        })?;

        manager.up(&migrations::all()).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            StorageError::Migration("Failed to run migrations".to_string())
        })?;

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(repositories::attempt::storage_error("Health check failed"))?;
        Ok(())
    }

    /// Repository for the failed-attempt log, sharing this pool.
    pub fn attempts(&self) -> SqliteAttemptRepository {
        SqliteAttemptRepository::new(self.pool.clone())
    }
}
