use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{SmtpSettings, TlsMode};
use crate::{Email, Mailer, MailerError};

/// How long a single SMTP exchange may take when the settings do not say.
pub const DEFAULT_SMTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers notices through an SMTP relay.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    /// Set up a relay from `settings`. No connection is made until the first
    /// notice is sent.
    pub fn connect(settings: &SmtpSettings) -> Result<Self, MailerError> {
        let host = settings.host.as_str();
        let mut builder = match settings.tls.unwrap_or(TlsMode::StartTls) {
            TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
            TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?,
            TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)?,
        };

        if let Some(port) = settings.port {
            builder = builder.port(port);
        }

        match (&settings.username, &settings.password) {
            (Some(username), Some(password)) => {
                builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
            }
            (None, None) => {}
            _ => {
                return Err(MailerError::Config(
                    "SMTP username and password must be set together".to_string(),
                ));
            }
        }

        let timeout = settings
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SMTP_TIMEOUT);

        Ok(Self {
            transport: builder.timeout(Some(timeout)).build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpTransport {
    async fn send_email(&self, email: Email) -> Result<(), MailerError> {
        let message = Message::try_from(email)?;
        self.transport.send(message).await?;
        Ok(())
    }
}
