use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Database, Sqlite, SqlitePool};
use tollgate_migration::{
    Migration, MigrationError, MigrationManager, MigrationRecord, ordered_versions,
};

/// Every migration for the SQLite schema.
pub fn all() -> Vec<Box<dyn Migration<Sqlite>>> {
    vec![
        Box::new(CreateFailedAttemptsTable),
        Box::new(CreateFailedAttemptsIndexes),
    ]
}

pub struct SqliteMigrationManager {
    pool: SqlitePool,
}

impl SqliteMigrationManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// `migrations` sorted by version, newest last.
fn in_version_order(
    migrations: &[Box<dyn Migration<Sqlite>>],
) -> Result<Vec<&dyn Migration<Sqlite>>, MigrationError> {
    let versions = ordered_versions(migrations)?;
    Ok(versions
        .into_iter()
        .filter_map(|version| {
            migrations
                .iter()
                .find(|m| m.version() == version)
                .map(|m| m.as_ref())
        })
        .collect())
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Up,
    Down,
}

impl SqliteMigrationManager {
    /// Apply or roll back one migration together with its bookkeeping row.
    async fn run(
        &self,
        migration: &dyn Migration<Sqlite>,
        direction: Direction,
    ) -> Result<(), MigrationError> {
        let table = self.get_migration_table_name();
        let mut tx = self.pool.begin().await?;

        tracing::info!(
            version = migration.version(),
            name = migration.name(),
            ?direction,
            "Running migration"
        );

        match direction {
            Direction::Up => {
                migration
                    .up(&mut *tx as &mut <Sqlite as Database>::Connection)
                    .await?;
                sqlx::query(&format!(
                    "INSERT INTO {table} (version, name, applied_at) VALUES (?, ?, ?)"
                ))
                .bind(migration.version())
                .bind(migration.name())
                .bind(Utc::now().timestamp())
                .execute(&mut *tx)
                .await?;
            }
            Direction::Down => {
                migration
                    .down(&mut *tx as &mut <Sqlite as Database>::Connection)
                    .await?;
                sqlx::query(&format!("DELETE FROM {table} WHERE version = ?"))
                    .bind(migration.version())
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl MigrationManager<Sqlite> for SqliteMigrationManager {
    async fn initialize(&self) -> Result<(), MigrationError> {
        sqlx::query(
            format!(
                r#"
            CREATE TABLE IF NOT EXISTS {} (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at INTEGER NOT NULL DEFAULT (unixepoch())
            );"#,
                self.get_migration_table_name()
            )
            .as_str(),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn up(&self, migrations: &[Box<dyn Migration<Sqlite>>]) -> Result<(), MigrationError> {
        for migration in in_version_order(migrations)? {
            if !self.is_applied(migration.version()).await? {
                self.run(migration, Direction::Up).await?;
            }
        }
        Ok(())
    }

    async fn down(&self, migrations: &[Box<dyn Migration<Sqlite>>]) -> Result<(), MigrationError> {
        for migration in in_version_order(migrations)?.into_iter().rev() {
            if self.is_applied(migration.version()).await? {
                self.run(migration, Direction::Down).await?;
            }
        }
        Ok(())
    }

    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>, MigrationError> {
        let records = sqlx::query_as::<_, MigrationRecord>(
            format!(
                "SELECT version, name, applied_at FROM {} ORDER BY version",
                self.get_migration_table_name()
            )
            .as_str(),
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn is_applied(&self, version: i64) -> Result<bool, MigrationError> {
        let result: bool = sqlx::query_scalar(
            format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE version = ?)",
                self.get_migration_table_name()
            )
            .as_str(),
        )
        .bind(version)
        .fetch_one(&self.pool)
        .await?;
        Ok(result)
    }
}

pub struct CreateFailedAttemptsTable;

#[async_trait]
impl Migration<Sqlite> for CreateFailedAttemptsTable {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &str {
        "CreateFailedAttemptsTable"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS failed_login_attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                address TEXT NOT NULL,
                username TEXT NOT NULL,
                occurred_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('subsec') * 1000 AS INTEGER)),
                blocked_until INTEGER NULL
            );"#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query("DROP TABLE IF EXISTS failed_login_attempts")
            .execute(conn)
            .await?;
        Ok(())
    }
}

pub struct CreateFailedAttemptsIndexes;

#[async_trait]
impl Migration<Sqlite> for CreateFailedAttemptsIndexes {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &str {
        "CreateFailedAttemptsIndexes"
    }

    async fn up<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_failed_login_attempts_address ON failed_login_attempts(address, occurred_at)",
        )
        .execute(&mut *conn)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_failed_login_attempts_occurred_at ON failed_login_attempts(occurred_at)",
        )
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn down<'a>(
        &'a self,
        conn: &'a mut <Sqlite as Database>::Connection,
    ) -> Result<(), MigrationError> {
        sqlx::query("DROP INDEX IF EXISTS idx_failed_login_attempts_address")
            .execute(&mut *conn)
            .await?;
        sqlx::query("DROP INDEX IF EXISTS idx_failed_login_attempts_occurred_at")
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}
