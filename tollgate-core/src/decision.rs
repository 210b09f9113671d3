//! Outcome of evaluating a login attempt.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Why an attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The address was already inside a block episode.
    AlreadyBlocked,
    /// This evaluation saw the address cross the attempt threshold.
    ThresholdExceeded,
}

/// Whether the authentication pipeline may go on to check credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny {
        reason: DenyReason,
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Decision::Allow => None,
            Decision::Deny { reason, .. } => Some(*reason),
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Decision::Allow => None,
            Decision::Deny { retry_after, .. } => Some(*retry_after),
        }
    }

    /// Seconds until the block lifts, rounded up, for `Retry-After` headers.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        self.retry_after().map(|d| {
            let millis = d.num_milliseconds().max(0) as u64;
            millis.div_ceil(1000)
        })
    }

    /// Message suitable for showing to the person trying to log in.
    pub fn message(&self) -> Option<String> {
        match self {
            Decision::Allow => None,
            Decision::Deny {
                reason: DenyReason::AlreadyBlocked,
                retry_after,
            } => Some(format!(
                "Your address has been temporarily blocked after too many failed login attempts. Try again in {}.",
                humanize(*retry_after)
            )),
            Decision::Deny {
                reason: DenyReason::ThresholdExceeded,
                ..
            } => Some(
                "Too many failed login attempts. Your address has been temporarily blocked."
                    .to_string(),
            ),
        }
    }
}

/// Render a duration the way people say it: "45 seconds", "14 minutes", "2 hours".
///
/// Values are rounded up to the unit shown so a user is never told to retry
/// before the block has actually lifted.
pub fn humanize(duration: Duration) -> String {
    let seconds = duration.num_seconds().max(1);

    let (value, unit) = if seconds < 60 {
        (seconds, "second")
    } else if seconds < 3600 {
        (div_ceil(seconds, 60), "minute")
    } else if seconds < 86_400 {
        (div_ceil(seconds, 3600), "hour")
    } else {
        (div_ceil(seconds, 86_400), "day")
    };

    if value == 1 {
        format!("1 {unit}")
    } else {
        format!("{value} {unit}s")
    }
}

fn div_ceil(value: i64, divisor: i64) -> i64 {
    (value + divisor - 1) / divisor
}
