//! Core functionality for tollgate
//!
//! Tollgate throttles logins by source address: it keeps a log of failed
//! attempts, blocks an address once it crosses a threshold inside a sliding
//! window, and lets the block expire on its own.
//!
//! The crate contains the data model ([`FailedAttempt`]), the policy
//! ([`PolicyConfig`] behind the [`PolicyProvider`] trait), the storage seam
//! ([`AttemptRepository`]) and the [`ThrottleService`] that ties them together.
//! Storage backends live in their own crates; see `tollgate-storage-sqlite`.
//!
pub mod address;
pub mod decision;
pub mod error;
pub mod policy;
pub mod repositories;
pub mod services;
pub mod storage;

pub use address::client_address;
pub use decision::{Decision, DenyReason};
pub use error::{ConfigurationError, Error, NotificationError, StorageError};
pub use policy::{PolicyConfig, PolicyProvider, SharedPolicy, Whitelist};
pub use repositories::AttemptRepository;
pub use services::{BlockNotice, Notifier, ThrottleService, TracingNotifier};
pub use storage::{AttemptSummary, FailedAttempt};

#[cfg(feature = "mailer")]
pub use services::MailerNotifier;
