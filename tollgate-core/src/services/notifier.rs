//! Delivery of block notifications.
//!
//! The throttle service hands a finished subject and body to a [`Notifier`]
//! and never waits on the outcome beyond logging it. [`TracingNotifier`] is the
//! default; enable the `mailer` feature for [`MailerNotifier`], which sends the
//! notice through a `tollgate-mailer` transport.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::NotificationError;

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(
        &self,
        destination: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError>;
}

#[async_trait]
impl Notifier for Box<dyn Notifier> {
    async fn notify(
        &self,
        destination: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        (**self).notify(destination, subject, body).await
    }
}

/// Details of a block transition, rendered into the notification text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNotice {
    pub address: String,
    pub username: String,
    pub occurred_at: DateTime<Utc>,
    pub blocked_until: DateTime<Utc>,
}

impl BlockNotice {
    pub fn subject(&self) -> String {
        "Address blocked after repeated failed logins".to_string()
    }

    pub fn body(&self) -> String {
        format!(
            "An address has been blocked after repeated failed login attempts.\n\n\
             Details:\n\
             Address: {}\n\
             Username attempted: {}\n\
             Date: {}\n\
             Blocked until: {}",
            self.address,
            self.username,
            self.occurred_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.blocked_until.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(
        &self,
        destination: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), NotificationError> {
        tracing::info!(destination, subject, body, "Block notification");
        Ok(())
    }
}

#[cfg(feature = "mailer")]
pub use self::mailer_impl::*;

#[cfg(feature = "mailer")]
mod mailer_impl {
    use super::Notifier;
    use crate::error::NotificationError;
    use async_trait::async_trait;
    use tollgate_mailer::prelude::*;

    /// Sends block notifications by email.
    pub struct MailerNotifier {
        transport: Box<dyn Mailer>,
        engine: AskamaTemplateEngine,
        config: MailerConfig,
    }

    impl MailerNotifier {
        pub fn new(config: MailerConfig) -> Result<Self, NotificationError> {
            let transport = config
                .build_transport()
                .map_err(|e| NotificationError::Delivery(e.to_string()))?;

            Ok(Self {
                transport,
                engine: AskamaTemplateEngine::new(),
                config,
            })
        }

        pub fn from_env() -> Result<Self, NotificationError> {
            let config =
                MailerConfig::from_env().map_err(|e| NotificationError::Delivery(e.to_string()))?;
            Self::new(config)
        }

        pub fn with_transport(transport: Box<dyn Mailer>, config: MailerConfig) -> Self {
            Self {
                transport,
                engine: AskamaTemplateEngine::new(),
                config,
            }
        }

        fn create_context(&self, destination: &str) -> TemplateContext {
            TemplateContext {
                site_name: self.config.site_name.clone(),
                site_url: self.config.site_url.clone(),
                recipient: Some(destination.to_string()),
            }
        }
    }

    #[async_trait]
    impl Notifier for MailerNotifier {
        async fn notify(
            &self,
            destination: &str,
            subject: &str,
            body: &str,
        ) -> Result<(), NotificationError> {
            let email = BlockNotificationEmail::build(
                &self.engine,
                &self.config.get_from_address(),
                destination,
                subject,
                body,
                self.create_context(destination),
            )
            .await
            .map_err(|e| NotificationError::Message(e.to_string()))?;

            self.transport
                .send_email(email)
                .await
                .map_err(|e| NotificationError::Delivery(e.to_string()))
        }
    }

}
