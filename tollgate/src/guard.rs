//! Adapter between an authentication pipeline and the throttle service.
//!
//! ```rust,ignore
//! let guard = tollgate.guard();
//! guard
//!     .authenticate(&address, &username, verify_password(&username, &password))
//!     .await?;
//! ```
//!
//! The credential future is only polled once the throttle has allowed the
//! attempt, so a blocked address never reaches the password check.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use tollgate_core::{AttemptRepository, Notifier, PolicyProvider, ThrottleService};

/// What to do when the attempt store cannot be queried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreFailurePolicy {
    /// Let the attempt through. Keeps logins working during a storage outage.
    #[default]
    FailOpen,
    /// Refuse the attempt.
    FailClosed,
}

/// Reasons a login is refused.
///
/// The messages are safe to show to the person logging in. None of them
/// reveals whether the username exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("{message}")]
    Denied {
        message: String,
        /// Seconds until the block lifts, for a `Retry-After` header
        retry_after: u64,
    },
    #[error("Invalid username or password.")]
    InvalidCredentials,
    #[error("Login is temporarily unavailable. Please try again later.")]
    Unavailable,
}

pub struct LoginGuard<R: AttemptRepository, P: PolicyProvider, N: Notifier> {
    throttle: Arc<ThrottleService<R, P, N>>,
    on_store_failure: StoreFailurePolicy,
}

impl<R: AttemptRepository, P: PolicyProvider, N: Notifier> Clone for LoginGuard<R, P, N> {
    fn clone(&self) -> Self {
        Self {
            throttle: Arc::clone(&self.throttle),
            on_store_failure: self.on_store_failure,
        }
    }
}

impl<R: AttemptRepository, P: PolicyProvider, N: Notifier> LoginGuard<R, P, N> {
    pub fn new(throttle: Arc<ThrottleService<R, P, N>>) -> Self {
        Self {
            throttle,
            on_store_failure: StoreFailurePolicy::default(),
        }
    }

    pub fn with_store_failure_policy(mut self, policy: StoreFailurePolicy) -> Self {
        self.on_store_failure = policy;
        self
    }

    pub fn store_failure_policy(&self) -> StoreFailurePolicy {
        self.on_store_failure
    }

    /// Run the throttle check that precedes credential verification.
    pub async fn check(&self, address: &str, username: &str) -> Result<(), GuardError> {
        match self.throttle.evaluate(address, username).await {
            Ok(decision) if decision.is_allowed() => Ok(()),
            Ok(decision) => Err(GuardError::Denied {
                message: decision.message().unwrap_or_default(),
                retry_after: decision.retry_after_seconds().unwrap_or_default(),
            }),
            Err(e) => match self.on_store_failure {
                StoreFailurePolicy::FailOpen => {
                    tracing::warn!(error = %e, address, "Throttle check failed, allowing login");
                    Ok(())
                }
                StoreFailurePolicy::FailClosed => {
                    tracing::error!(error = %e, address, "Throttle check failed, refusing login");
                    Err(GuardError::Unavailable)
                }
            },
        }
    }

    /// Check the throttle, then verify credentials, recording the failure if
    /// they turn out to be wrong.
    ///
    /// # Arguments
    ///
    /// * `address` - Source address of the request
    /// * `username` - The credential being attempted
    /// * `verify` - Resolves to `Ok(true)` when the credentials are valid
    pub async fn authenticate<F, E>(
        &self,
        address: &str,
        username: &str,
        verify: F,
    ) -> Result<(), GuardError>
    where
        F: Future<Output = Result<bool, E>>,
        E: Display,
    {
        self.check(address, username).await?;

        match verify.await {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.record_failure(address, username).await;
                Err(GuardError::InvalidCredentials)
            }
            Err(e) => {
                tracing::warn!(error = %e, address, "Credential verification failed");
                self.record_failure(address, username).await;
                Err(GuardError::InvalidCredentials)
            }
        }
    }

    async fn record_failure(&self, address: &str, username: &str) {
        if let Err(e) = self.throttle.record_failure(address, username).await {
            tracing::warn!(error = %e, address, "Failed to record failed login");
        }
    }
}
