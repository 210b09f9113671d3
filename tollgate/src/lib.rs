//! # Tollgate
//!
//! Tollgate throttles logins by source address. Every failed login is written
//! to an attempt log; once an address collects too many failures inside the
//! lockout window it is blocked until the window has passed. Blocks lift on
//! their own, and the site administrator can be told when one starts.
//!
//! The pieces:
//! - [`TollgateBuilder`] wires storage, policy and notifications together
//! - [`Tollgate::guard`] hands out a [`LoginGuard`] to put in front of a credential check
//! - [`Tollgate::throttle`] exposes the underlying [`ThrottleService`] for
//!   listing, pruning and clearing the log
//!
//! ## Storage Support
//!
//! The attempt log is kept in SQLite. Other backends can implement
//! [`AttemptRepository`] and use [`ThrottleService`] directly.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tollgate::{PolicyConfig, TollgateBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tollgate = TollgateBuilder::new()
//!         .with_sqlite("sqlite://tollgate.db")
//!         .await?
//!         .with_policy(PolicyConfig::default().with_notify_address("admin@example.com"))
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let guard = tollgate.guard();
//!     guard
//!         .authenticate("203.0.113.7", "admin", async { Ok::<_, std::io::Error>(false) })
//!         .await
//!         .unwrap_err();
//!
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

mod builder;
mod guard;

pub use builder::{NoStorage, TollgateBuilder, TollgateBuilderError, WithStorage};
pub use guard::{GuardError, LoginGuard, StoreFailurePolicy};

/// Re-export core types from tollgate_core
pub use tollgate_core::{
    AttemptRepository, AttemptSummary, BlockNotice, ConfigurationError, Decision, DenyReason,
    Error, FailedAttempt, NotificationError, Notifier, PolicyConfig, PolicyProvider, SharedPolicy,
    StorageError, ThrottleService, TracingNotifier, Whitelist, client_address,
};

/// Re-export the storage backend
pub use tollgate_storage_sqlite::{SqliteAttemptRepository, SqliteStorage};

#[cfg(feature = "mailer")]
pub use tollgate_core::MailerNotifier;
#[cfg(feature = "mailer")]
pub use tollgate_mailer::MailerConfig;

/// The throttle service as assembled by [`TollgateBuilder`].
pub type SqliteThrottle = ThrottleService<SqliteAttemptRepository, SharedPolicy, Box<dyn Notifier>>;

/// The guard handed out by [`Tollgate::guard`].
pub type SqliteLoginGuard = LoginGuard<SqliteAttemptRepository, SharedPolicy, Box<dyn Notifier>>;

/// A configured login throttle backed by SQLite.
///
/// Build one with [`TollgateBuilder`]. Cloning is cheap; clones share the
/// pool, the policy and the service.
#[derive(Clone)]
pub struct Tollgate {
    storage: SqliteStorage,
    policy: SharedPolicy,
    throttle: Arc<SqliteThrottle>,
    store_failure_policy: StoreFailurePolicy,
}

impl Tollgate {
    pub(crate) fn from_parts(
        storage: SqliteStorage,
        policy: SharedPolicy,
        throttle: Arc<SqliteThrottle>,
        store_failure_policy: StoreFailurePolicy,
    ) -> Self {
        Self {
            storage,
            policy,
            throttle,
            store_failure_policy,
        }
    }

    pub fn throttle(&self) -> &Arc<SqliteThrottle> {
        &self.throttle
    }

    /// A guard for the authentication pipeline, using the configured
    /// [`StoreFailurePolicy`].
    pub fn guard(&self) -> SqliteLoginGuard {
        LoginGuard::new(Arc::clone(&self.throttle))
            .with_store_failure_policy(self.store_failure_policy)
    }

    /// The live policy. Changes made through [`SharedPolicy::replace`] apply
    /// to the next evaluation.
    pub fn policy(&self) -> &SharedPolicy {
        &self.policy
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Apply any pending schema migrations.
    pub async fn migrate(&self) -> Result<(), Error> {
        self.storage.migrate().await
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.storage.health_check().await
    }

    /// Start pruning the attempt log once a day in the background.
    ///
    /// Send `true` on the watch channel to stop the task.
    pub fn start_cleanup_task(
        &self,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        self.throttle.start_cleanup_task(shutdown)
    }
}
