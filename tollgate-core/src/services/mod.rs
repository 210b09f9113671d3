//! Service layer for throttling logic
//!
//! [`ThrottleService`] holds the decision algorithm; [`Notifier`]
//! implementations deliver the notices it sends on block transitions.

pub mod notifier;
pub mod throttle;

pub use notifier::{BlockNotice, Notifier, TracingNotifier};
pub use throttle::{DEFAULT_CLEANUP_INTERVAL, ThrottleService};

#[cfg(feature = "mailer")]
pub use notifier::MailerNotifier;
