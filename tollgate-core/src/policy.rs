//! Throttling policy.
//!
//! [`PolicyConfig`] holds the administrator's settings. The throttle service
//! reads them through the [`PolicyProvider`] trait so that a running service can
//! be pointed at settings that change underneath it (see [`SharedPolicy`]).
//!
//! Zero values are rejected by [`PolicyConfig::validate`] at configuration
//! time. The provider methods never fail: they fall back to the documented
//! defaults instead, so a bad setting cannot break evaluation.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_LOCKOUT_MINUTES: u32 = 15;
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
/// Longest retention period a policy may ask for (one hundred years).
pub const MAX_RETENTION_DAYS: u32 = 36_500;

/// Read-only view of the policy used by the throttle service.
pub trait PolicyProvider: Send + Sync + 'static {
    /// Whether throttling is switched on at all.
    fn enabled(&self) -> bool;

    /// Unresolved attempts that trigger a block.
    fn max_attempts(&self) -> u32;

    /// Length of both the lookback window and a block episode.
    fn lockout_duration(&self) -> Duration;

    /// Exact match against the trimmed whitelist entries.
    fn is_whitelisted(&self, address: &str) -> bool;

    /// Where block notifications go, if anywhere.
    fn notify_address(&self) -> Option<String>;

    /// Age after which log entries are pruned.
    fn retention_period(&self) -> Duration;
}

/// Addresses exempt from throttling.
///
/// Stored and serialized as newline-delimited text, the way administrators
/// enter it. Each line is trimmed; blank lines are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Whitelist(BTreeSet<String>);

impl Whitelist {
    pub fn parse(text: &str) -> Self {
        Self(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn contains(&self, address: &str) -> bool {
        self.0.contains(address.trim())
    }

    pub fn insert(&mut self, address: &str) {
        let address = address.trim();
        if !address.is_empty() {
            self.0.insert(address.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<String> for Whitelist {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

impl From<Whitelist> for String {
    fn from(whitelist: Whitelist) -> Self {
        whitelist.0.into_iter().collect::<Vec<_>>().join("\n")
    }
}

impl<'a> FromIterator<&'a str> for Whitelist {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut whitelist = Whitelist::default();
        for address in iter {
            whitelist.insert(address);
        }
        whitelist
    }
}

/// Settings for login throttling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub lockout_duration_minutes: u32,
    pub whitelist: Whitelist,
    pub notify_address: Option<String>,
    pub retention_days: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_duration_minutes: DEFAULT_LOCKOUT_MINUTES,
            whitelist: Whitelist::default(),
            notify_address: None,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl PolicyConfig {
    /// A policy that never throttles or records anything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_lockout_minutes(mut self, minutes: u32) -> Self {
        self.lockout_duration_minutes = minutes;
        self
    }

    pub fn with_whitelist(mut self, whitelist: Whitelist) -> Self {
        self.whitelist = whitelist;
        self
    }

    pub fn with_notify_address(mut self, address: impl Into<String>) -> Self {
        self.notify_address = Some(address.into());
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Load settings from `TOLLGATE_*` environment variables.
    ///
    /// Unset variables keep their defaults. `TOLLGATE_WHITELIST` accepts
    /// newlines or commas between addresses.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let mut config = Self::default();

        if let Some(enabled) = env_var("TOLLGATE_ENABLED") {
            config.enabled = parse_bool("TOLLGATE_ENABLED", &enabled)?;
        }
        if let Some(value) = env_var("TOLLGATE_MAX_ATTEMPTS") {
            config.max_attempts = parse_number("TOLLGATE_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = env_var("TOLLGATE_LOCKOUT_MINUTES") {
            config.lockout_duration_minutes = parse_number("TOLLGATE_LOCKOUT_MINUTES", &value)?;
        }
        if let Some(value) = env_var("TOLLGATE_RETENTION_DAYS") {
            config.retention_days = parse_number("TOLLGATE_RETENTION_DAYS", &value)?;
        }
        if let Some(value) = env_var("TOLLGATE_WHITELIST") {
            config.whitelist = Whitelist::parse(&value.replace(',', "\n"));
        }
        config.notify_address = env_var("TOLLGATE_NOTIFY_ADDRESS");

        Ok(config)
    }

    /// Parse settings from JSON. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|e| ConfigurationError::Parse(e.to_string()))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigurationError::Parse(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::from_json_str(&contents)
    }

    /// Reject settings an administrator should not be able to save.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_attempts == 0 {
            return Err(ConfigurationError::ZeroMaxAttempts);
        }
        if self.lockout_duration_minutes == 0 {
            return Err(ConfigurationError::ZeroLockoutDuration);
        }
        if self.retention_days == 0 {
            return Err(ConfigurationError::ZeroRetention);
        }
        if self.retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigurationError::RetentionTooLong {
                days: self.retention_days,
                max: MAX_RETENTION_DAYS,
            });
        }
        if let Some(address) = &self.notify_address {
            if !is_plausible_mailbox(address) {
                return Err(ConfigurationError::InvalidNotifyAddress(address.clone()));
            }
        }
        Ok(())
    }
}

impl PolicyProvider for PolicyConfig {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn max_attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            DEFAULT_MAX_ATTEMPTS
        } else {
            self.max_attempts
        }
    }

    fn lockout_duration(&self) -> Duration {
        let minutes = if self.lockout_duration_minutes == 0 {
            DEFAULT_LOCKOUT_MINUTES
        } else {
            self.lockout_duration_minutes
        };
        Duration::minutes(i64::from(minutes))
    }

    fn is_whitelisted(&self, address: &str) -> bool {
        self.whitelist.contains(address)
    }

    fn notify_address(&self) -> Option<String> {
        self.notify_address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .map(str::to_string)
    }

    fn retention_period(&self) -> Duration {
        let days = if self.retention_days == 0 {
            DEFAULT_RETENTION_DAYS
        } else {
            self.retention_days.min(MAX_RETENTION_DAYS)
        };
        Duration::days(i64::from(days))
    }
}

/// A policy that can be replaced while services are running.
///
/// Cloning shares the underlying settings.
#[derive(Debug, Clone, Default)]
pub struct SharedPolicy {
    inner: Arc<RwLock<PolicyConfig>>,
}

impl SharedPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Swap in new settings after validating them.
    pub fn replace(&self, config: PolicyConfig) -> Result<(), ConfigurationError> {
        config.validate()?;
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = config;
        Ok(())
    }

    pub fn snapshot(&self) -> PolicyConfig {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn with<T>(&self, f: impl FnOnce(&PolicyConfig) -> T) -> T {
        f(&self.inner.read().unwrap_or_else(|e| e.into_inner()))
    }
}

impl PolicyProvider for SharedPolicy {
    fn enabled(&self) -> bool {
        self.with(|config| config.enabled())
    }

    fn max_attempts(&self) -> u32 {
        self.with(|config| config.max_attempts())
    }

    fn lockout_duration(&self) -> Duration {
        self.with(|config| config.lockout_duration())
    }

    fn is_whitelisted(&self, address: &str) -> bool {
        self.with(|config| config.is_whitelisted(address))
    }

    fn notify_address(&self) -> Option<String> {
        self.with(|config| config.notify_address())
    }

    fn retention_period(&self) -> Duration {
        self.with(|config| config.retention_period())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_number(key: &str, value: &str) -> Result<u32, ConfigurationError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigurationError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigurationError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigurationError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn is_plausible_mailbox(address: &str) -> bool {
    let address = address.trim();
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !address.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let config = PolicyConfig::default();
        assert!(config.enabled());
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.lockout_duration(), Duration::minutes(15));
        assert_eq!(config.retention_period(), Duration::days(30));
        assert!(config.notify_address().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_whitelist_parse_trims_and_skips_blank_lines() {
        let whitelist = Whitelist::parse("  10.0.0.5 \n\n192.168.1.1\r\n   \n::1");
        assert_eq!(whitelist.len(), 3);
        assert!(whitelist.contains("10.0.0.5"));
        assert!(whitelist.contains("192.168.1.1"));
        assert!(whitelist.contains("::1"));
        assert!(!whitelist.contains("10.0.0.6"));
    }

    #[test]
    fn test_whitelist_is_exact_match() {
        let whitelist = Whitelist::parse("10.0.0.5");
        assert!(!whitelist.contains("10.0.0.50"));
        assert!(!whitelist.contains("10.0.0"));
        assert!(whitelist.contains(" 10.0.0.5 "));
    }

    #[test]
    fn test_zero_values_fall_back_to_defaults() {
        let config = PolicyConfig {
            max_attempts: 0,
            lockout_duration_minutes: 0,
            retention_days: 0,
            ..Default::default()
        };
        assert_eq!(config.max_attempts(), DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.lockout_duration(), Duration::minutes(15));
        assert_eq!(config.retention_period(), Duration::days(30));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(matches!(
            PolicyConfig::default().with_max_attempts(0).validate(),
            Err(ConfigurationError::ZeroMaxAttempts)
        ));
        assert!(matches!(
            PolicyConfig::default().with_lockout_minutes(0).validate(),
            Err(ConfigurationError::ZeroLockoutDuration)
        ));
        assert!(matches!(
            PolicyConfig::default().with_retention_days(0).validate(),
            Err(ConfigurationError::ZeroRetention)
        ));
        assert!(matches!(
            PolicyConfig::default()
                .with_notify_address("admin at example")
                .validate(),
            Err(ConfigurationError::InvalidNotifyAddress(_))
        ));
        assert!(
            PolicyConfig::default()
                .with_notify_address("admin@example.com")
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_retention_is_bounded() {
        let config = PolicyConfig::default().with_retention_days(200_000_000);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::RetentionTooLong {
                days: 200_000_000,
                max: MAX_RETENTION_DAYS,
            })
        ));
        assert_eq!(
            config.retention_period(),
            Duration::days(i64::from(MAX_RETENTION_DAYS))
        );

        let longest = PolicyConfig::default().with_retention_days(MAX_RETENTION_DAYS);
        assert!(longest.validate().is_ok());
    }

    #[test]
    fn test_blank_notify_address_is_none() {
        let config = PolicyConfig::default().with_notify_address("   ");
        assert!(config.notify_address().is_none());
    }

    #[test]
    fn test_from_json_str() {
        let config = PolicyConfig::from_json_str(
            r#"{"max_attempts": 5, "whitelist": "10.0.0.1\n10.0.0.2", "notify_address": "ops@example.com"}"#,
        )
        .unwrap();

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.lockout_duration_minutes, DEFAULT_LOCKOUT_MINUTES);
        assert!(config.is_whitelisted("10.0.0.2"));
        assert_eq!(config.notify_address().as_deref(), Some("ops@example.com"));
    }

    #[test]
    fn test_from_json_str_rejects_garbage() {
        let result = PolicyConfig::from_json_str("{ not json");
        assert!(matches!(result, Err(ConfigurationError::Parse(_))));
    }

    #[test]
    fn test_whitelist_serializes_as_text() {
        let config = PolicyConfig::default().with_whitelist(["10.0.0.2", "10.0.0.1"].into_iter().collect());
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["whitelist"], "10.0.0.1\n10.0.0.2");
    }

    #[test]
    fn test_shared_policy_replace() {
        let shared = SharedPolicy::new(PolicyConfig::default());
        let clone = shared.clone();
        assert!(!clone.is_whitelisted("10.0.0.5"));

        shared
            .replace(PolicyConfig::default().with_whitelist(Whitelist::parse("10.0.0.5")))
            .unwrap();
        assert!(clone.is_whitelisted("10.0.0.5"));

        let rejected = shared.replace(PolicyConfig::default().with_max_attempts(0));
        assert!(rejected.is_err());
        assert_eq!(clone.snapshot().max_attempts, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn test_parse_helpers() {
        assert!(parse_bool("K", "TRUE").unwrap());
        assert!(!parse_bool("K", "off").unwrap());
        assert!(parse_bool("K", "maybe").is_err());
        assert_eq!(parse_number("K", " 7 ").unwrap(), 7);
        assert!(parse_number("K", "-1").is_err());
    }
}
