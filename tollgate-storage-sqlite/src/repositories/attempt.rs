//! SQLite implementation of the failed-attempt repository.
//!
//! Timestamps are stored as unix milliseconds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tollgate_core::{
    Error, error::StorageError, repositories::AttemptRepository, storage::FailedAttempt,
};

/// SQLite repository for the failed-attempt log.
#[derive(Debug, Clone)]
pub struct SqliteAttemptRepository {
    pool: SqlitePool,
}

impl SqliteAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteFailedAttempt {
    id: i64,
    address: String,
    username: String,
    occurred_at: i64,
    blocked_until: Option<i64>,
}

impl TryFrom<SqliteFailedAttempt> for FailedAttempt {
    type Error = Error;

    fn try_from(row: SqliteFailedAttempt) -> Result<Self, Self::Error> {
        Ok(FailedAttempt {
            id: row.id,
            address: row.address,
            username: row.username,
            occurred_at: from_timestamp(row.occurred_at)?,
            blocked_until: row.blocked_until.map(from_timestamp).transpose()?,
        })
    }
}

fn from_timestamp(ts: i64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp_millis(ts).ok_or_else(|| {
        StorageError::Database(format!("Timestamp out of range: {ts}")).into()
    })
}

/// Log the driver error and map it to a storage error.
///
/// Pool exhaustion and I/O failures mean the store could not be reached at
/// all; everything else is reported as a database error.
pub(crate) fn storage_error(message: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| {
        tracing::error!(error = %e, "{message}");
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageError::Unavailable(message.to_string()).into()
            }
            _ => StorageError::Database(message.to_string()).into(),
        }
    }
}

#[async_trait]
impl AttemptRepository for SqliteAttemptRepository {
    async fn insert(
        &self,
        address: &str,
        username: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<FailedAttempt, Error> {
        let row = sqlx::query_as::<_, SqliteFailedAttempt>(
            r#"
            INSERT INTO failed_login_attempts (address, username, occurred_at)
            VALUES (?, ?, ?)
            RETURNING id, address, username, occurred_at, blocked_until
            "#,
        )
        .bind(address)
        .bind(username)
        .bind(occurred_at.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error("Failed to record failed login attempt"))?;

        row.try_into()
    }

    async fn count_unresolved_since(
        &self,
        address: &str,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u32, Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM failed_login_attempts
            WHERE address = ?
              AND occurred_at > ?
              AND (blocked_until IS NULL OR blocked_until < ?)
            "#,
        )
        .bind(address)
        .bind(since.timestamp_millis())
        .bind(now.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error("Failed to count failed login attempts"))?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn active_block_expiry(
        &self,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        let expiry: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(blocked_until)
            FROM failed_login_attempts
            WHERE address = ? AND blocked_until > ?
            "#,
        )
        .bind(address)
        .bind(now.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error("Failed to look up block state"))?;

        expiry.map(from_timestamp).transpose()
    }

    async fn block_unresolved(
        &self,
        address: &str,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
        blocked_until: DateTime<Utc>,
    ) -> Result<u64, Error> {
        // Single statement so that concurrent evaluations cannot both win.
        // Nothing is stamped while any row for the address holds an active block.
        let result = sqlx::query(
            r#"
            UPDATE failed_login_attempts
            SET blocked_until = ?
            WHERE address = ?
              AND occurred_at > ?
              AND (blocked_until IS NULL OR blocked_until < ?)
              AND NOT EXISTS (
                  SELECT 1 FROM failed_login_attempts
                  WHERE address = ? AND blocked_until > ?
              )
            "#,
        )
        .bind(blocked_until.timestamp_millis())
        .bind(address)
        .bind(since.timestamp_millis())
        .bind(now.timestamp_millis())
        .bind(address)
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to block address"))?;

        Ok(result.rows_affected())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<FailedAttempt>, Error> {
        let rows = sqlx::query_as::<_, SqliteFailedAttempt>(
            r#"
            SELECT id, address, username, occurred_at, blocked_until
            FROM failed_login_attempts
            ORDER BY occurred_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("Failed to list failed login attempts"))?;

        rows.into_iter().map(FailedAttempt::try_from).collect()
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM failed_login_attempts WHERE occurred_at < ?")
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(storage_error("Failed to prune failed login attempts"))?;

        Ok(result.rows_affected())
    }

    async fn delete_all(&self) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM failed_login_attempts")
            .execute(&self.pool)
            .await
            .map_err(storage_error("Failed to clear failed login attempts"))?;

        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(storage_error("Health check failed"))?;
        Ok(())
    }
}
