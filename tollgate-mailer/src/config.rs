use crate::{FileTransport, Mailer, MailerError, SendmailTransport, SmtpTransport};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Mail settings for block notifications.
///
/// `site_name` and `site_url` identify the protected site in the subject line
/// and the message footer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailerConfig {
    pub transport: TransportConfig,
    pub from_address: String,
    pub from_name: Option<String>,
    pub site_name: String,
    pub site_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    Smtp(SmtpSettings),
    File { output_dir: PathBuf },
    Sendmail { command: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// STARTTLS when unset
    pub tls: Option<TlsMode>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    None,
    StartTls,
    Tls,
}

impl TlsMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "none" => Some(TlsMode::None),
            "starttls" | "start_tls" => Some(TlsMode::StartTls),
            "tls" => Some(TlsMode::Tls),
            _ => None,
        }
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, MailerError> {
    env(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| MailerError::Config(format!("Invalid {key}: {value}")))
        })
        .transpose()
}

impl MailerConfig {
    /// Read `MAILER_*` environment variables.
    ///
    /// The transport is chosen by which variables are present: `MAILER_SMTP_HOST`,
    /// then `MAILER_FILE_OUTPUT_DIR`, then `MAILER_SENDMAIL`. With none of them
    /// set, messages are written to `./emails`.
    pub fn from_env() -> Result<Self, MailerError> {
        let transport = if let Some(host) = env("MAILER_SMTP_HOST") {
            let tls = match env("MAILER_SMTP_TLS") {
                Some(value) => Some(TlsMode::parse(&value).ok_or_else(|| {
                    MailerError::Config(format!("Invalid MAILER_SMTP_TLS: {value}"))
                })?),
                None => None,
            };

            TransportConfig::Smtp(SmtpSettings {
                host,
                port: env_parsed("MAILER_SMTP_PORT")?,
                username: env("MAILER_SMTP_USERNAME"),
                password: env("MAILER_SMTP_PASSWORD"),
                tls,
                timeout_secs: env_parsed("MAILER_SMTP_TIMEOUT")?,
            })
        } else if let Some(output_dir) = env("MAILER_FILE_OUTPUT_DIR") {
            TransportConfig::File {
                output_dir: PathBuf::from(output_dir),
            }
        } else if env("MAILER_SENDMAIL").is_some() {
            TransportConfig::Sendmail {
                command: env("MAILER_SENDMAIL_COMMAND"),
            }
        } else {
            Self::default().transport
        };

        let defaults = Self::default();
        Ok(Self {
            transport,
            from_address: env("MAILER_FROM_ADDRESS").unwrap_or(defaults.from_address),
            from_name: env("MAILER_FROM_NAME"),
            site_name: env("MAILER_SITE_NAME").unwrap_or(defaults.site_name),
            site_url: env("MAILER_SITE_URL").unwrap_or(defaults.site_url),
        })
    }

    pub fn build_transport(&self) -> Result<Box<dyn Mailer>, MailerError> {
        Ok(match &self.transport {
            TransportConfig::Smtp(settings) => Box::new(SmtpTransport::connect(settings)?),
            TransportConfig::File { output_dir } => Box::new(FileTransport::new(output_dir)?),
            TransportConfig::Sendmail { command } => {
                Box::new(SendmailTransport::new(command.as_deref()))
            }
        })
    }

    /// The `From` header, with the display name when one is configured.
    pub fn get_from_address(&self) -> String {
        match &self.from_name {
            Some(name) => format!("{} <{}>", name, self.from_address),
            None => self.from_address.clone(),
        }
    }
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::File {
                output_dir: PathBuf::from("./emails"),
            },
            from_address: "noreply@example.com".to_string(),
            from_name: None,
            site_name: "My Site".to_string(),
            site_url: "https://example.com".to_string(),
        }
    }
}
