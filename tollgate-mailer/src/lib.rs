//! Email delivery for tollgate.
//!
//! Provides the [`Mailer`] transport trait with SMTP, file and sendmail
//! implementations, plus the block notification template used when an address
//! gets locked out.
pub mod config;
pub mod email;
pub mod email_types;
pub mod error;
pub mod mailer;
pub mod templates;
pub mod transports;

pub use config::{MailerConfig, SmtpSettings, TlsMode, TransportConfig};
pub use email::Email;
pub use email_types::BlockNotificationEmail;
pub use error::MailerError;
pub use mailer::Mailer;
pub use templates::{AskamaTemplateEngine, TemplateContext, TemplateEngine};
pub use transports::{BlockingTransport, FileTransport, SendmailTransport, SmtpTransport};

pub mod prelude {
    pub use crate::{
        AskamaTemplateEngine, BlockNotificationEmail, Email, FileTransport, Mailer, MailerConfig,
        MailerError, SendmailTransport, SmtpTransport, TemplateContext, TemplateEngine,
        TransportConfig,
    };
}
