use thiserror::Error;

/// Everything that can go wrong between rendering a notice and handing it to
/// a transport.
#[derive(Error, Debug)]
pub enum MailerError {
    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("Failed to render template: {0}")]
    Template(#[from] askama::Error),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Missing template value: {0}")]
    MissingValue(String),

    #[error("Failed to serialize template data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("File delivery failed: {0}")]
    File(#[from] lettre::transport::file::Error),

    #[error("Sendmail delivery failed: {0}")]
    Sendmail(#[from] lettre::transport::sendmail::Error),

    #[error("Delivery task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Invalid mailer configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MailerError>;
