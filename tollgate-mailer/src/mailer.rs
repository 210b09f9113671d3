use crate::{Email, MailerError};
use async_trait::async_trait;

/// A way of getting a rendered notice to its recipient.
///
/// Implementations must not retry on their own; a failed notice is logged by
/// the caller and dropped.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(&self, email: Email) -> Result<(), MailerError>;
}
