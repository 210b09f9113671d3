mod block_notification;
mod engine;

pub use block_notification::{BlockNotificationTemplate, TemplateContext};
pub use engine::{AskamaTemplateEngine, TemplateEngine};

use crate::MailerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Named values handed to a template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateData {
    pub data: HashMap<String, serde_json::Value>,
}

impl TemplateData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Serialize>(mut self, key: &str, value: T) -> Result<Self, MailerError> {
        self.data
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Deserialize a required value.
    pub fn require<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T, MailerError> {
        let value = self
            .get(key)
            .ok_or_else(|| MailerError::MissingValue(key.to_string()))?;
        Ok(serde_json::from_value(value.clone())?)
    }
}
