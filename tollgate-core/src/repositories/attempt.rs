//! Repository trait for the failed-attempt log.
//!
//! This module defines the storage interface the throttle service depends on.
//! Lockout state is never stored separately: it is derived from the log and the
//! `blocked_until` column stamped onto the rows that triggered a block.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Error, storage::FailedAttempt};

/// Repository for the failed-attempt log.
///
/// All time-dependent queries take `now` from the caller so that every
/// statement issued during one evaluation agrees on the same instant.
///
/// # Concurrency
///
/// Implementations are shared between many concurrent evaluations and may be
/// shared between processes. [`block_unresolved`](Self::block_unresolved) must
/// be a single atomic conditional update; the service relies on its affected
/// row count to decide whether it won the block transition.
#[async_trait]
pub trait AttemptRepository: Send + Sync + 'static {
    /// Append a failed attempt to the log.
    ///
    /// # Arguments
    ///
    /// * `address` - Source address of the request
    /// * `username` - The credential that was attempted
    /// * `occurred_at` - Insertion time
    ///
    /// # Returns
    ///
    /// The stored record with its assigned ID and `blocked_until` unset.
    async fn insert(
        &self,
        address: &str,
        username: &str,
        occurred_at: DateTime<Utc>,
    ) -> Result<FailedAttempt, Error>;

    /// Count unresolved attempts for an address inside the lookback window.
    ///
    /// Counts rows with `occurred_at > since` (strictly) whose `blocked_until`
    /// is unset or earlier than `now`.
    async fn count_unresolved_since(
        &self,
        address: &str,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u32, Error>;

    /// Latest `blocked_until` for the address that is still in the future.
    ///
    /// Returns `None` when the address is not currently blocked.
    async fn active_block_expiry(
        &self,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, Error>;

    /// Stamp `blocked_until` onto every unresolved attempt in the window.
    ///
    /// Uses the same filter as [`count_unresolved_since`](Self::count_unresolved_since).
    /// Nothing is updated while any row for the address carries a block that
    /// is still active at `now`, so a concurrent evaluation that lost the race
    /// sees zero affected rows even if a failure was recorded in between.
    ///
    /// # Returns
    ///
    /// The number of rows updated.
    async fn block_unresolved(
        &self,
        address: &str,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
        blocked_until: DateTime<Utc>,
    ) -> Result<u64, Error>;

    /// Most recent attempts across all addresses, newest first.
    async fn recent(&self, limit: u32) -> Result<Vec<FailedAttempt>, Error>;

    /// Delete attempts recorded before `cutoff`, regardless of block state.
    ///
    /// # Returns
    ///
    /// The number of records deleted.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, Error>;

    /// Delete every attempt.
    async fn delete_all(&self) -> Result<u64, Error>;

    /// Verify the store is reachable.
    async fn health_check(&self) -> Result<(), Error>;
}
