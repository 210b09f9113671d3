//! Login throttling service for address-based lockout.
//!
//! This module decides whether a login attempt from a given source address may
//! proceed, keeps the failed-attempt log, and expires blocks.
//!
//! # Features
//!
//! - Per-address failed attempt tracking inside a sliding window
//! - Automatic block after a configurable number of failures
//! - Blocks expire on their own; no unlock step is needed
//! - One notification per block episode, even under concurrent evaluations
//! - Whitelisted addresses bypass throttling entirely
//! - Background pruning of old records
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tollgate_core::{PolicyConfig, ThrottleService, TracingNotifier};
//!
//! let service = ThrottleService::new(
//!     repository,
//!     Arc::new(PolicyConfig::default()),
//!     Arc::new(TracingNotifier),
//! );
//!
//! // Before checking credentials
//! let decision = service.evaluate("203.0.113.7", "admin").await?;
//! if decision.is_denied() {
//!     // Refuse the request without checking the password
//! }
//!
//! // After the credentials turn out to be wrong
//! service.record_failure("203.0.113.7", "admin").await?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    Error,
    decision::{Decision, DenyReason},
    policy::PolicyProvider,
    repositories::AttemptRepository,
    services::notifier::{BlockNotice, Notifier},
    storage::{AttemptSummary, FailedAttempt},
};

/// How often the cleanup task prunes the log.
pub const DEFAULT_CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(86_400);

/// Service for throttling logins by source address.
///
/// The service keeps no state of its own: every decision is derived from the
/// attempt log at the time it is made, so several instances (or processes)
/// may share one store.
///
/// # Thread Safety
///
/// This service is thread-safe and can be shared across multiple tasks.
/// The block transition is guarded by a conditional update in the repository,
/// so concurrent evaluations never notify twice for the same episode.
pub struct ThrottleService<R: AttemptRepository, P: PolicyProvider, N: Notifier> {
    repository: Arc<R>,
    policy: Arc<P>,
    notifier: Arc<N>,
}

impl<R: AttemptRepository, P: PolicyProvider, N: Notifier> ThrottleService<R, P, N> {
    /// Create a new ThrottleService.
    ///
    /// # Arguments
    ///
    /// * `repository` - Storage for the failed-attempt log
    /// * `policy` - Throttling settings, read on every call
    /// * `notifier` - Sink for block notifications
    pub fn new(repository: Arc<R>, policy: Arc<P>, notifier: Arc<N>) -> Self {
        Self {
            repository,
            policy,
            notifier,
        }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Decide whether a login attempt may proceed to credential checking.
    ///
    /// If the address has reached the attempt threshold inside the window, the
    /// unresolved attempts are stamped with a block expiry and a notification
    /// is sent. Only the evaluation whose update actually stamped rows sends
    /// it; any other concurrent evaluation still gets a denial.
    ///
    /// # Arguments
    ///
    /// * `address` - Source address of the request
    /// * `username` - The credential being attempted; empty values are allowed through
    ///
    /// # Returns
    ///
    /// The [`Decision`] for this attempt. Storage errors are returned as-is;
    /// whether to fail open is up to the caller.
    pub async fn evaluate(&self, address: &str, username: &str) -> Result<Decision, Error> {
        if !self.policy.enabled() || username.is_empty() {
            return Ok(Decision::Allow);
        }

        if self.policy.is_whitelisted(address) {
            tracing::debug!(address, "Whitelisted address, skipping throttle");
            return Ok(Decision::Allow);
        }

        let now = Utc::now();

        if let Some(blocked_until) = self.repository.active_block_expiry(address, now).await? {
            tracing::debug!(address, %blocked_until, "Address is blocked");
            return Ok(Decision::Deny {
                reason: DenyReason::AlreadyBlocked,
                retry_after: blocked_until - now,
            });
        }

        let lockout = self.policy.lockout_duration();
        let since = now - lockout;
        let count = self
            .repository
            .count_unresolved_since(address, since, now)
            .await?;

        if count < self.policy.max_attempts() {
            tracing::debug!(address, count, "Login attempt allowed");
            return Ok(Decision::Allow);
        }

        let blocked_until = now + lockout;
        let affected = self
            .repository
            .block_unresolved(address, since, now, blocked_until)
            .await?;

        if affected > 0 {
            tracing::info!(
                address,
                username,
                count,
                %blocked_until,
                "Blocking address after repeated failed logins"
            );
            self.send_block_notice(address, username, now, blocked_until)
                .await;
        } else {
            tracing::debug!(address, "Block already applied by a concurrent evaluation");
        }

        Ok(Decision::Deny {
            reason: DenyReason::ThresholdExceeded,
            retry_after: lockout,
        })
    }

    /// Record a failed login attempt.
    ///
    /// Call this after the credential check fails, regardless of what
    /// [`evaluate`](Self::evaluate) returned. Nothing is recorded for
    /// whitelisted addresses or when throttling is disabled.
    ///
    /// # Returns
    ///
    /// The stored record, or `None` when nothing was recorded.
    pub async fn record_failure(
        &self,
        address: &str,
        username: &str,
    ) -> Result<Option<FailedAttempt>, Error> {
        if !self.policy.enabled() || self.policy.is_whitelisted(address) {
            return Ok(None);
        }

        let attempt = self.repository.insert(address, username, Utc::now()).await?;
        tracing::debug!(address, username, id = attempt.id, "Recorded failed login");

        Ok(Some(attempt))
    }

    /// Delete attempts older than `retention_days` days, blocked or not.
    ///
    /// # Returns
    ///
    /// The number of records deleted.
    pub async fn prune(&self, retention_days: u32) -> Result<u64, Error> {
        self.prune_before(cutoff(Utc::now(), Duration::days(i64::from(retention_days))))
            .await
    }

    /// Delete attempts older than the policy's retention period.
    pub async fn prune_default(&self) -> Result<u64, Error> {
        self.prune_before(cutoff(Utc::now(), self.policy.retention_period()))
            .await
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let count = self.repository.delete_older_than(cutoff).await?;
        if count > 0 {
            tracing::info!(count, %cutoff, "Pruned failed login records");
        }
        Ok(count)
    }

    /// The most recent attempts across all addresses, newest first.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<AttemptSummary>, Error> {
        let now = Utc::now();
        let attempts = self.repository.recent(limit).await?;

        Ok(attempts
            .into_iter()
            .map(|attempt| AttemptSummary::new(attempt, now))
            .collect())
    }

    /// Delete the whole log, lifting every active block.
    pub async fn clear_all(&self) -> Result<u64, Error> {
        let count = self.repository.delete_all().await?;
        tracing::info!(count, "Cleared failed login log");
        Ok(count)
    }

    /// Start the background cleanup task with the default daily interval.
    ///
    /// See [`start_cleanup_task_with_interval`](Self::start_cleanup_task_with_interval).
    pub fn start_cleanup_task(
        &self,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        self.start_cleanup_task_with_interval(shutdown, DEFAULT_CLEANUP_INTERVAL)
    }

    /// Start the background cleanup task.
    ///
    /// This spawns a task that periodically deletes records older than the
    /// policy's retention period. The retention period is re-read on every
    /// run, so policy changes take effect without restarting the task.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - A watch receiver that signals when to stop the task
    /// * `every` - Time between runs; the first run happens immediately
    ///
    /// # Returns
    ///
    /// A `JoinHandle` for the spawned task.
    pub fn start_cleanup_task_with_interval(
        &self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
        every: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let repository = Arc::clone(&self.repository);
        let policy = Arc::clone(&self.policy);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(every);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let cutoff = cutoff(Utc::now(), policy.retention_period());
                        match repository.delete_older_than(cutoff).await {
                            Ok(count) if count > 0 => {
                                tracing::info!(
                                    count = count,
                                    "Pruned old failed login records"
                                );
                            }
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    "Failed to prune failed login records"
                                );
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down login throttle cleanup task");
                        break;
                    }
                }
            }
        })
    }

    async fn send_block_notice(
        &self,
        address: &str,
        username: &str,
        occurred_at: DateTime<Utc>,
        blocked_until: DateTime<Utc>,
    ) {
        let Some(destination) = self.policy.notify_address() else {
            tracing::debug!(address, "No notification address configured");
            return;
        };

        let notice = BlockNotice {
            address: address.to_string(),
            username: username.to_string(),
            occurred_at,
            blocked_until,
        };

        if let Err(e) = self
            .notifier
            .notify(&destination, &notice.subject(), &notice.body())
            .await
        {
            tracing::warn!(
                error = %e,
                address,
                destination = %destination,
                "Failed to send block notification"
            );
        }
    }
}

/// The instant `age` before `now`, saturating at the earliest representable time.
fn cutoff(now: DateTime<Utc>, age: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(age).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NotificationError, StorageError};
    use crate::policy::{PolicyConfig, Whitelist};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Mock repository for testing
    #[derive(Default)]
    struct MockAttemptRepository {
        attempts: Mutex<Vec<FailedAttempt>>,
        unavailable: AtomicBool,
        count_barrier: Option<tokio::sync::Barrier>,
    }

    impl MockAttemptRepository {
        fn new() -> Self {
            Self::default()
        }

        fn with_count_barrier(parties: usize) -> Self {
            Self {
                count_barrier: Some(tokio::sync::Barrier::new(parties)),
                ..Self::default()
            }
        }

        fn push(&self, address: &str, occurred_at: DateTime<Utc>) {
            let mut attempts = self.attempts.lock().unwrap();
            let id = attempts.len() as i64 + 1;
            attempts.push(FailedAttempt {
                id,
                address: address.to_string(),
                username: "admin".to_string(),
                occurred_at,
                blocked_until: None,
            });
        }

        /// Move every stored timestamp into the past, as if `by` had elapsed.
        fn rewind(&self, by: Duration) {
            for attempt in self.attempts.lock().unwrap().iter_mut() {
                attempt.occurred_at -= by;
                attempt.blocked_until = attempt.blocked_until.map(|t| t - by);
            }
        }

        fn len(&self) -> usize {
            self.attempts.lock().unwrap().len()
        }

        fn check_available(&self) -> Result<(), Error> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("store is down".to_string()).into());
            }
            Ok(())
        }

        fn is_unresolved(
            attempt: &FailedAttempt,
            address: &str,
            since: DateTime<Utc>,
            now: DateTime<Utc>,
        ) -> bool {
            attempt.address == address
                && attempt.occurred_at > since
                && attempt.blocked_until.is_none_or(|until| until < now)
        }
    }

    #[async_trait]
    impl AttemptRepository for MockAttemptRepository {
        async fn insert(
            &self,
            address: &str,
            username: &str,
            occurred_at: DateTime<Utc>,
        ) -> Result<FailedAttempt, Error> {
            self.check_available()?;
            let mut attempts = self.attempts.lock().unwrap();
            let attempt = FailedAttempt {
                id: attempts.len() as i64 + 1,
                address: address.to_string(),
                username: username.to_string(),
                occurred_at,
                blocked_until: None,
            };
            attempts.push(attempt.clone());
            Ok(attempt)
        }

        async fn count_unresolved_since(
            &self,
            address: &str,
            since: DateTime<Utc>,
            now: DateTime<Utc>,
        ) -> Result<u32, Error> {
            self.check_available()?;
            let count = self
                .attempts
                .lock()
                .unwrap()
                .iter()
                .filter(|a| Self::is_unresolved(a, address, since, now))
                .count() as u32;

            if let Some(barrier) = &self.count_barrier {
                barrier.wait().await;
            }

            Ok(count)
        }

        async fn active_block_expiry(
            &self,
            address: &str,
            now: DateTime<Utc>,
        ) -> Result<Option<DateTime<Utc>>, Error> {
            self.check_available()?;
            Ok(self
                .attempts
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.address == address)
                .filter_map(|a| a.blocked_until)
                .filter(|until| *until > now)
                .max())
        }

        async fn block_unresolved(
            &self,
            address: &str,
            since: DateTime<Utc>,
            now: DateTime<Utc>,
            blocked_until: DateTime<Utc>,
        ) -> Result<u64, Error> {
            self.check_available()?;
            let mut attempts = self.attempts.lock().unwrap();
            let already_blocked = attempts
                .iter()
                .any(|a| a.address == address && a.blocked_until.is_some_and(|until| until > now));
            if already_blocked {
                return Ok(0);
            }

            let mut affected = 0;
            for attempt in attempts.iter_mut() {
                if Self::is_unresolved(attempt, address, since, now) {
                    attempt.blocked_until = Some(blocked_until);
                    affected += 1;
                }
            }
            Ok(affected)
        }

        async fn recent(&self, limit: u32) -> Result<Vec<FailedAttempt>, Error> {
            self.check_available()?;
            let mut attempts = self.attempts.lock().unwrap().clone();
            attempts.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(b.id.cmp(&a.id)));
            attempts.truncate(limit as usize);
            Ok(attempts)
        }

        async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
            self.check_available()?;
            let mut attempts = self.attempts.lock().unwrap();
            let before_len = attempts.len();
            attempts.retain(|a| a.occurred_at >= cutoff);
            Ok((before_len - attempts.len()) as u64)
        }

        async fn delete_all(&self) -> Result<u64, Error> {
            self.check_available()?;
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.len() as u64;
            attempts.clear();
            Ok(count)
        }

        async fn health_check(&self) -> Result<(), Error> {
            self.check_available()
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String, String)>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<(String, String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(
            &self,
            destination: &str,
            subject: &str,
            body: &str,
        ) -> Result<(), NotificationError> {
            self.sent.lock().unwrap().push((
                destination.to_string(),
                subject.to_string(),
                body.to_string(),
            ));
            if self.fail {
                return Err(NotificationError::Delivery("smtp refused".to_string()));
            }
            Ok(())
        }
    }

    type TestService = ThrottleService<MockAttemptRepository, PolicyConfig, RecordingNotifier>;

    fn policy() -> PolicyConfig {
        PolicyConfig::default()
            .with_max_attempts(3)
            .with_lockout_minutes(15)
            .with_notify_address("admin@example.com")
    }

    fn service_with(
        repo: MockAttemptRepository,
        policy: PolicyConfig,
        notifier: RecordingNotifier,
    ) -> (Arc<MockAttemptRepository>, Arc<RecordingNotifier>, TestService) {
        let repo = Arc::new(repo);
        let notifier = Arc::new(notifier);
        let service = ThrottleService::new(repo.clone(), Arc::new(policy), notifier.clone());
        (repo, notifier, service)
    }

    fn service() -> (Arc<MockAttemptRepository>, Arc<RecordingNotifier>, TestService) {
        service_with(
            MockAttemptRepository::new(),
            policy(),
            RecordingNotifier::default(),
        )
    }

    #[tokio::test]
    async fn test_first_attempt_is_allowed() {
        let (_, _, service) = service();

        let decision = service.evaluate("10.0.0.5", "admin").await.unwrap();
        assert_eq!(decision, Decision::Allow);
    }

    #[tokio::test]
    async fn test_below_threshold_is_allowed() {
        let (_, _, service) = service();

        for _ in 0..2 {
            service.record_failure("10.0.0.5", "admin").await.unwrap();
        }

        let decision = service.evaluate("10.0.0.5", "admin").await.unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_threshold_blocks_and_notifies() {
        let (repo, notifier, service) = service();

        for _ in 0..3 {
            service.record_failure("10.0.0.5", "admin").await.unwrap();
        }

        let decision = service.evaluate("10.0.0.5", "admin").await.unwrap();
        assert_eq!(
            decision,
            Decision::Deny {
                reason: DenyReason::ThresholdExceeded,
                retry_after: Duration::minutes(15),
            }
        );

        let attempts = repo.attempts.lock().unwrap().clone();
        assert!(attempts.iter().all(|a| a.blocked_until.is_some()));

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "admin@example.com");
        assert_eq!(sent[0].1, "Address blocked after repeated failed logins");
        assert!(sent[0].2.contains("Address: 10.0.0.5"));
        assert!(sent[0].2.contains("Username attempted: admin"));
    }

    #[tokio::test]
    async fn test_block_persists_for_every_username() {
        let (_, notifier, service) = service();

        for _ in 0..3 {
            service.record_failure("10.0.0.5", "admin").await.unwrap();
        }
        service.evaluate("10.0.0.5", "admin").await.unwrap();

        for username in ["admin", "editor", "root"] {
            let decision = service.evaluate("10.0.0.5", username).await.unwrap();
            assert_eq!(decision.reason(), Some(DenyReason::AlreadyBlocked));
            let retry_after = decision.retry_after().unwrap();
            assert!(retry_after > Duration::zero());
            assert!(retry_after <= Duration::minutes(15));
        }

        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_other_addresses_unaffected() {
        let (_, _, service) = service();

        for _ in 0..3 {
            service.record_failure("10.0.0.5", "admin").await.unwrap();
        }
        service.evaluate("10.0.0.5", "admin").await.unwrap();

        let decision = service.evaluate("10.0.0.6", "admin").await.unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_whitelisted_address_always_allowed() {
        let (repo, notifier, service) = service_with(
            MockAttemptRepository::new(),
            policy().with_whitelist(Whitelist::parse("10.0.0.9\n10.0.0.5\n")),
            RecordingNotifier::default(),
        );

        let now = Utc::now();
        for i in 0..10 {
            repo.push("10.0.0.5", now - Duration::seconds(i));
        }

        for _ in 0..3 {
            let decision = service.evaluate("10.0.0.5", "admin").await.unwrap();
            assert!(decision.is_allowed());
        }
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_whitelisted_address_not_recorded() {
        let (repo, _, service) = service_with(
            MockAttemptRepository::new(),
            policy().with_whitelist(Whitelist::parse("10.0.0.5")),
            RecordingNotifier::default(),
        );

        let recorded = service.record_failure("10.0.0.5", "admin").await.unwrap();
        assert!(recorded.is_none());
        assert_eq!(repo.len(), 0);
    }

    #[tokio::test]
    async fn test_disabled_policy_allows_and_does_not_record() {
        let (repo, _, service) = service_with(
            MockAttemptRepository::new(),
            PolicyConfig::disabled(),
            RecordingNotifier::default(),
        );

        let now = Utc::now();
        for i in 0..5 {
            repo.push("10.0.0.5", now - Duration::seconds(i));
        }

        assert!(service.evaluate("10.0.0.5", "admin").await.unwrap().is_allowed());
        assert!(service.record_failure("10.0.0.5", "admin").await.unwrap().is_none());
        assert_eq!(repo.len(), 5);
    }

    #[tokio::test]
    async fn test_empty_username_is_allowed() {
        let (repo, _, service) = service();

        let now = Utc::now();
        for i in 0..5 {
            repo.push("10.0.0.5", now - Duration::seconds(i));
        }

        let decision = service.evaluate("10.0.0.5", "").await.unwrap();
        assert!(decision.is_allowed());
        assert!(repo.attempts.lock().unwrap().iter().all(|a| a.blocked_until.is_none()));
    }

    #[tokio::test]
    async fn test_record_failure_returns_record() {
        let (_, _, service) = service();

        let attempt = service
            .record_failure("10.0.0.5", "editor")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(attempt.address, "10.0.0.5");
        assert_eq!(attempt.username, "editor");
        assert!(attempt.blocked_until.is_none());
    }

    #[tokio::test]
    async fn test_block_expires() {
        let (repo, notifier, service) = service();

        // Failures at t=0, t=1 and t=2 minutes, evaluated at t=2.5
        let now = Utc::now();
        repo.push("10.0.0.5", now - Duration::seconds(150));
        repo.push("10.0.0.5", now - Duration::seconds(90));
        repo.push("10.0.0.5", now - Duration::seconds(30));

        let decision = service.evaluate("10.0.0.5", "admin").await.unwrap();
        assert_eq!(decision.reason(), Some(DenyReason::ThresholdExceeded));

        // Jump to t=18
        repo.rewind(Duration::seconds(930));

        let decision = service.evaluate("10.0.0.5", "admin").await.unwrap();
        assert!(decision.is_allowed());
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_window_slides() {
        let (repo, _, service) = service();

        let now = Utc::now();
        repo.push("10.0.0.5", now - Duration::minutes(20));
        repo.push("10.0.0.5", now - Duration::minutes(16));
        repo.push("10.0.0.5", now - Duration::minutes(1));
        repo.push("10.0.0.5", now - Duration::seconds(10));

        let decision = service.evaluate("10.0.0.5", "admin").await.unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_window_boundary_is_excluded() {
        let (repo, _, service) = service();

        // The window is (now - lockout, now]; the oldest record sits on its start
        let now = Utc::now();
        repo.push("10.0.0.5", now - Duration::minutes(15));
        repo.push("10.0.0.5", now - Duration::minutes(1));
        repo.push("10.0.0.5", now - Duration::seconds(10));

        let decision = service.evaluate("10.0.0.5", "admin").await.unwrap();
        assert!(decision.is_allowed());
    }

    #[tokio::test]
    async fn test_expired_block_does_not_count_once_out_of_window() {
        let (repo, notifier, service) = service();

        for _ in 0..3 {
            service.record_failure("10.0.0.5", "admin").await.unwrap();
        }
        service.evaluate("10.0.0.5", "admin").await.unwrap();
        repo.rewind(Duration::minutes(16));

        // Two fresh failures after expiry stay below the threshold
        for _ in 0..2 {
            service.record_failure("10.0.0.5", "admin").await.unwrap();
        }
        assert!(service.evaluate("10.0.0.5", "admin").await.unwrap().is_allowed());

        // The third starts a new episode with a new notification
        service.record_failure("10.0.0.5", "admin").await.unwrap();
        let decision = service.evaluate("10.0.0.5", "admin").await.unwrap();
        assert_eq!(decision.reason(), Some(DenyReason::ThresholdExceeded));
        assert_eq!(notifier.sent().len(), 2);

        let attempts = repo.attempts.lock().unwrap().clone();
        let fresh_blocks = attempts
            .iter()
            .filter(|a| a.is_blocked_at(Utc::now()))
            .count();
        assert_eq!(fresh_blocks, 3);
    }

    #[tokio::test]
    async fn test_concurrent_evaluations_notify_once() {
        let (repo, notifier, service) = service_with(
            MockAttemptRepository::with_count_barrier(2),
            policy(),
            RecordingNotifier::default(),
        );

        let now = Utc::now();
        for i in 0..3 {
            repo.push("10.0.0.5", now - Duration::seconds(i + 1));
        }

        // Both evaluations count before either stamps the block
        let (first, second) = tokio::join!(
            service.evaluate("10.0.0.5", "admin"),
            service.evaluate("10.0.0.5", "admin"),
        );

        assert_eq!(first.unwrap().reason(), Some(DenyReason::ThresholdExceeded));
        assert_eq!(second.unwrap().reason(), Some(DenyReason::ThresholdExceeded));
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_recorded_during_block_does_not_notify_again() {
        let (repo, notifier, service) = service();

        for _ in 0..3 {
            service.record_failure("10.0.0.5", "admin").await.unwrap();
        }
        let decision = service.evaluate("10.0.0.5", "admin").await.unwrap();
        assert_eq!(decision.reason(), Some(DenyReason::ThresholdExceeded));

        // A late failure followed by an evaluation that counted before the
        // block was stamped and only now reaches the update
        service.record_failure("10.0.0.5", "admin").await.unwrap();
        let now = Utc::now();
        let lockout = Duration::minutes(15);
        let affected = repo
            .block_unresolved("10.0.0.5", now - lockout, now, now + lockout)
            .await
            .unwrap();
        assert_eq!(affected, 0);

        let attempts = repo.attempts.lock().unwrap().clone();
        let expiries: std::collections::BTreeSet<_> =
            attempts.iter().filter_map(|a| a.blocked_until).collect();
        assert_eq!(expiries.len(), 1);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_prune_with_huge_retention_deletes_nothing() {
        let (repo, _, service) = service();

        let now = Utc::now();
        repo.push("10.0.0.5", now - Duration::days(400));

        assert_eq!(service.prune(u32::MAX).await.unwrap(), 0);
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_cutoff_saturates() {
        let now = Utc::now();
        assert_eq!(cutoff(now, Duration::days(1)), now - Duration::days(1));
        assert_eq!(
            cutoff(now, Duration::days(i64::from(u32::MAX))),
            DateTime::<Utc>::MIN_UTC
        );
    }

    #[tokio::test]
    async fn test_notification_failure_is_swallowed() {
        let (_, notifier, service) = service_with(
            MockAttemptRepository::new(),
            policy(),
            RecordingNotifier::failing(),
        );

        for _ in 0..3 {
            service.record_failure("10.0.0.5", "admin").await.unwrap();
        }

        let decision = service.evaluate("10.0.0.5", "admin").await.unwrap();
        assert_eq!(decision.reason(), Some(DenyReason::ThresholdExceeded));
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_no_notify_address_skips_notification() {
        let (_, notifier, service) = service_with(
            MockAttemptRepository::new(),
            PolicyConfig::default(),
            RecordingNotifier::default(),
        );

        for _ in 0..3 {
            service.record_failure("10.0.0.5", "admin").await.unwrap();
        }

        let decision = service.evaluate("10.0.0.5", "admin").await.unwrap();
        assert!(decision.is_denied());
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_storage_errors_propagate() {
        let (repo, _, service) = service();
        repo.unavailable.store(true, Ordering::SeqCst);

        let err = service.evaluate("10.0.0.5", "admin").await.unwrap_err();
        assert!(err.is_store_unavailable());

        let err = service.record_failure("10.0.0.5", "admin").await.unwrap_err();
        assert!(err.is_store_unavailable());
    }

    #[tokio::test]
    async fn test_prune_is_idempotent_and_ignores_blocks() {
        let (repo, _, service) = service();

        let now = Utc::now();
        repo.push("10.0.0.5", now - Duration::days(45));
        repo.push("10.0.0.6", now - Duration::days(31));
        repo.push("10.0.0.7", now - Duration::days(2));
        repo.attempts.lock().unwrap()[0].blocked_until = Some(now + Duration::hours(1));

        assert_eq!(service.prune(30).await.unwrap(), 2);
        assert_eq!(service.prune(30).await.unwrap(), 0);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_prune_default_uses_policy_retention() {
        let (repo, _, service) = service_with(
            MockAttemptRepository::new(),
            policy().with_retention_days(7),
            RecordingNotifier::default(),
        );

        let now = Utc::now();
        repo.push("10.0.0.5", now - Duration::days(8));
        repo.push("10.0.0.5", now - Duration::days(6));

        assert_eq!(service.prune_default().await.unwrap(), 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_list_recent_orders_and_annotates() {
        let (repo, _, service) = service();

        let now = Utc::now();
        repo.push("10.0.0.5", now - Duration::minutes(3));
        repo.push("10.0.0.6", now - Duration::minutes(1));
        repo.push("10.0.0.7", now - Duration::minutes(2));
        repo.attempts.lock().unwrap()[1].blocked_until = Some(now + Duration::minutes(10));

        let recent = service.list_recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].attempt.address, "10.0.0.6");
        assert!(recent[0].currently_blocked);
        assert_eq!(recent[1].attempt.address, "10.0.0.7");
        assert!(!recent[1].currently_blocked);
    }

    #[tokio::test]
    async fn test_clear_all_lifts_blocks() {
        let (_, _, service) = service();

        for _ in 0..3 {
            service.record_failure("10.0.0.5", "admin").await.unwrap();
        }
        service.evaluate("10.0.0.5", "admin").await.unwrap();

        assert_eq!(service.clear_all().await.unwrap(), 3);
        assert!(service.list_recent(100).await.unwrap().is_empty());
        assert!(service.evaluate("10.0.0.5", "admin").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_cleanup_task_prunes_and_stops() {
        let (repo, _, service) = service();

        let now = Utc::now();
        repo.push("10.0.0.5", now - Duration::days(40));
        repo.push("10.0.0.6", now);

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let handle = service
            .start_cleanup_task_with_interval(shutdown_rx, std::time::Duration::from_millis(10));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(repo.len(), 1);
    }
}
