use crate::MailerError;
use lettre::Message;
use lettre::message::{MultiPart, SinglePart};
use serde::{Deserialize, Serialize};

/// A rendered notification, ready for a transport.
///
/// Notices always go to a single administrator address and always carry both
/// an HTML and a plain-text part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

impl Email {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        html_body: impl Into<String>,
        text_body: impl Into<String>,
    ) -> Result<Self, MailerError> {
        let email = Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            html_body: html_body.into(),
            text_body: text_body.into(),
        };
        email.validate()?;
        Ok(email)
    }

    pub fn validate(&self) -> Result<(), MailerError> {
        let missing = if self.to.trim().is_empty() {
            "recipient"
        } else if self.from.trim().is_empty() {
            "sender"
        } else if self.subject.trim().is_empty() {
            "subject"
        } else if self.text_body.trim().is_empty() {
            "body"
        } else {
            return Ok(());
        };

        Err(MailerError::InvalidEmail(format!("Missing {missing}")))
    }
}

/// Conversion used by every lettre-backed transport.
///
/// The message is `multipart/alternative` with the plain-text part first.
impl TryFrom<Email> for Message {
    type Error = MailerError;

    fn try_from(email: Email) -> Result<Self, Self::Error> {
        let message = Message::builder()
            .from(email.from.parse()?)
            .to(email.to.parse()?)
            .subject(email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::plain(email.text_body))
                    .singlepart(SinglePart::html(email.html_body)),
            )?;

        Ok(message)
    }
}
