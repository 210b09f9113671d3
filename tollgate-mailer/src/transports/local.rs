//! Transports that deliver on the local machine: an outbox directory or the
//! system `sendmail` binary.

use std::path::Path;

use async_trait::async_trait;
use lettre::{Message, Transport};

use crate::{Email, Mailer, MailerError};

/// Runs one of lettre's synchronous transports on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct BlockingTransport<T> {
    inner: T,
}

/// Writes each notice as an `.eml` file. Useful in development.
pub type FileTransport = BlockingTransport<lettre::FileTransport>;

/// Pipes each notice to `sendmail`.
pub type SendmailTransport = BlockingTransport<lettre::SendmailTransport>;

impl BlockingTransport<lettre::FileTransport> {
    /// Creates `output_dir` if it does not exist yet.
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self, MailerError> {
        let output_dir = output_dir.as_ref();
        std::fs::create_dir_all(output_dir)?;

        Ok(Self {
            inner: lettre::FileTransport::new(output_dir),
        })
    }
}

impl BlockingTransport<lettre::SendmailTransport> {
    /// Uses `command` instead of the `sendmail` found on `PATH`.
    pub fn new(command: Option<&str>) -> Self {
        let inner = match command {
            Some(command) => lettre::SendmailTransport::new_with_command(command),
            None => lettre::SendmailTransport::new(),
        };
        Self { inner }
    }
}

#[async_trait]
impl<T> Mailer for BlockingTransport<T>
where
    T: Transport + Clone + Send + Sync + 'static,
    T::Error: Into<MailerError>,
{
    async fn send_email(&self, email: Email) -> Result<(), MailerError> {
        let message = Message::try_from(email)?;
        let transport = self.inner.clone();

        tokio::task::spawn_blocking(move || {
            transport
                .send(&message)
                .map(|_| ())
                .map_err(Into::into)
        })
        .await?
    }
}
