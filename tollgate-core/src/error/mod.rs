
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Maximum attempts must be greater than zero")]
    ZeroMaxAttempts,

    #[error("Lockout duration must be greater than zero")]
    ZeroLockoutDuration,

    #[error("Retention period must be greater than zero")]
    ZeroRetention,

    #[error("Retention period of {days} days exceeds the maximum of {max}")]
    RetentionTooLong { days: u32, max: u32 },

    #[error("Invalid notification address: {0}")]
    InvalidNotifyAddress(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Failed to build message: {0}")]
    Message(String),
}

impl Error {
    /// True when the persistence layer could not be reached at all.
    ///
    /// Callers use this to decide between failing open and failing closed.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Error::Storage(StorageError::Unavailable(_)))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
}
