//! Records kept in the failed-attempt log.
//!
//! | Field           | Type               | Description                                              |
//! | --------------- | ------------------ | -------------------------------------------------------- |
//! | `id`            | `i64`              | Store-assigned, increasing in insertion order.           |
//! | `address`       | `String`           | Source network address of the request.                   |
//! | `username`      | `String`           | The credential that was attempted.                       |
//! | `occurred_at`   | `DateTime`         | When the store recorded the attempt.                     |
//! | `blocked_until` | `Option<DateTime>` | Expiry of the block episode this attempt was folded into. |
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedAttempt {
    pub id: i64,
    pub address: String,
    pub username: String,
    pub occurred_at: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl FailedAttempt {
    /// Whether this record belongs to a block episode that has not yet elapsed.
    pub fn is_blocked_at(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }
}

/// A log entry annotated for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptSummary {
    #[serde(flatten)]
    pub attempt: FailedAttempt,
    pub currently_blocked: bool,
}

impl AttemptSummary {
    pub fn new(attempt: FailedAttempt, now: DateTime<Utc>) -> Self {
        let currently_blocked = attempt.is_blocked_at(now);
        Self {
            attempt,
            currently_blocked,
        }
    }
}
