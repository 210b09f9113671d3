//! lettre-backed [`Mailer`](crate::Mailer) implementations.
mod local;
mod smtp;

pub use local::{BlockingTransport, FileTransport, SendmailTransport};
pub use smtp::{DEFAULT_SMTP_TIMEOUT, SmtpTransport};
