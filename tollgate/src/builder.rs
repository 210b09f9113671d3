//! Builder pattern for constructing Tollgate instances
//!
//! This module provides a type-safe builder for creating [`Tollgate`] instances
//! with compile-time validation of storage configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use tollgate::{PolicyConfig, TollgateBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tollgate = TollgateBuilder::new()
//!         .with_sqlite("sqlite://tollgate.db")
//!         .await?
//!         .with_policy(PolicyConfig::default().with_max_attempts(5))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tollgate_core::{Notifier, PolicyConfig, SharedPolicy, ThrottleService, TracingNotifier};
use tollgate_storage_sqlite::SqliteStorage;

use crate::{StoreFailurePolicy, Tollgate};

#[cfg(feature = "mailer")]
use tollgate_mailer::MailerConfig;

/// Errors that can occur when building a Tollgate instance.
#[derive(Debug, thiserror::Error)]
pub enum TollgateBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Failed to configure mailer
    #[cfg(feature = "mailer")]
    #[error("Mailer configuration failed: {0}")]
    MailerConfiguration(String),
}

/// Marker type indicating no storage has been configured yet.
///
/// This is the initial state of [`TollgateBuilder`].
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage {
    storage: SqliteStorage,
}

/// A type-safe builder for constructing [`Tollgate`] instances.
///
/// # Type States
///
/// - [`NoStorage`]: Initial state, storage must be configured
/// - [`WithStorage`]: Storage configured, ready to build
pub struct TollgateBuilder<Storage> {
    storage: Storage,
    policy: PolicyConfig,
    notifier: Option<Box<dyn Notifier>>,
    store_failure_policy: StoreFailurePolicy,
    apply_migrations: bool,
    #[cfg(feature = "mailer")]
    mailer_config: Option<MailerConfig>,
}

impl Default for TollgateBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl TollgateBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Policy: 3 attempts, 15 minute lockout, no whitelist
    /// - Notifier: logs notifications through `tracing`
    /// - Store failures: fail open
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            policy: PolicyConfig::default(),
            notifier: None,
            store_failure_policy: StoreFailurePolicy::default(),
            apply_migrations: false,
            #[cfg(feature = "mailer")]
            mailer_config: None,
        }
    }

    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<TollgateBuilder<WithStorage>, TollgateBuilderError> {
        let storage = SqliteStorage::connect(url)
            .await
            .map_err(|e| TollgateBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_storage(storage))
    }

    /// Configure SQLite storage with an existing connection pool.
    pub fn with_sqlite_pool(self, pool: sqlx::SqlitePool) -> TollgateBuilder<WithStorage> {
        self.with_storage(SqliteStorage::new(pool))
    }

    fn with_storage(self, storage: SqliteStorage) -> TollgateBuilder<WithStorage> {
        TollgateBuilder {
            storage: WithStorage { storage },
            policy: self.policy,
            notifier: self.notifier,
            store_failure_policy: self.store_failure_policy,
            apply_migrations: self.apply_migrations,
            #[cfg(feature = "mailer")]
            mailer_config: self.mailer_config,
        }
    }
}

impl<Storage> TollgateBuilder<Storage> {
    /// Set the throttling policy. It is validated in [`build`](TollgateBuilder::build).
    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Deliver block notifications through `notifier`.
    ///
    /// Takes precedence over a mailer configuration.
    pub fn with_notifier<N: Notifier>(mut self, notifier: N) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn with_store_failure_policy(mut self, policy: StoreFailurePolicy) -> Self {
        self.store_failure_policy = policy;
        self
    }

    /// Configure whether to automatically apply migrations during build.
    ///
    /// Default is `false`; call [`Tollgate::migrate`] yourself in that case.
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }

    /// Send block notifications by email.
    #[cfg(feature = "mailer")]
    pub fn with_mailer(mut self, config: MailerConfig) -> Self {
        self.mailer_config = Some(config);
        self
    }

    /// Configure the mailer from `MAILER_*` environment variables.
    #[cfg(feature = "mailer")]
    pub fn with_mailer_from_env(mut self) -> Result<Self, TollgateBuilderError> {
        let config = MailerConfig::from_env()
            .map_err(|e| TollgateBuilderError::MailerConfiguration(e.to_string()))?;
        self.mailer_config = Some(config);
        Ok(self)
    }
}

impl TollgateBuilder<WithStorage> {
    /// Build the Tollgate instance.
    ///
    /// Validates the policy and, if `apply_migrations(true)` was called,
    /// applies migrations before returning.
    pub async fn build(self) -> Result<Tollgate, TollgateBuilderError> {
        self.policy
            .validate()
            .map_err(|e| TollgateBuilderError::InvalidConfiguration(e.to_string()))?;

        let storage = self.storage.storage;

        if self.apply_migrations {
            storage
                .migrate()
                .await
                .map_err(|e| TollgateBuilderError::Migration(e.to_string()))?;
        }

        #[cfg(feature = "mailer")]
        let notifier = resolve_notifier(self.notifier, self.mailer_config)?;
        #[cfg(not(feature = "mailer"))]
        let notifier = self.notifier.unwrap_or_else(|| Box::new(TracingNotifier));

        let policy = SharedPolicy::new(self.policy);
        let throttle = Arc::new(ThrottleService::new(
            Arc::new(storage.attempts()),
            Arc::new(policy.clone()),
            Arc::new(notifier),
        ));

        Ok(Tollgate::from_parts(
            storage,
            policy,
            throttle,
            self.store_failure_policy,
        ))
    }
}

/// An explicit notifier wins over a mailer configuration.
#[cfg(feature = "mailer")]
fn resolve_notifier(
    notifier: Option<Box<dyn Notifier>>,
    mailer_config: Option<MailerConfig>,
) -> Result<Box<dyn Notifier>, TollgateBuilderError> {
    if let Some(notifier) = notifier {
        return Ok(notifier);
    }

    match mailer_config {
        Some(config) => {
            let notifier = tollgate_core::MailerNotifier::new(config)
                .map_err(|e| TollgateBuilderError::MailerConfiguration(e.to_string()))?;
            Ok(Box::new(notifier))
        }
        None => Ok(Box::new(TracingNotifier)),
    }
}
