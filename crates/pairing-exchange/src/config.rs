//! # Exchange Configuration
//!
//! Defaults, overridable from a TOML file and `PX_*` environment variables.
//!
//! ```toml
//! [exchange]
//! poll_interval_secs = 3
//! handshake_max_attempts = 10
//! max_pages_per_fetch = 8
//! seen_cache_capacity = 1024
//! pending_request_ttl_secs = 3600
//! ```

use serde::Deserialize;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Tunables for polling, handshakes and request bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExchangeConfig {
    /// Seconds between inbox polls, for both the handshake and steady state.
    pub poll_interval_secs: u64,

    /// Handshake poll ticks before giving up.
    pub handshake_max_attempts: u32,

    /// Pages fetched per steady-state cycle.
    pub max_pages_per_fetch: usize,

    /// Envelope ids remembered to absorb redelivery.
    pub seen_cache_capacity: usize,

    /// Seconds a payment or call request may wait for the host.
    pub pending_request_ttl_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            handshake_max_attempts: 10,
            max_pages_per_fetch: 8,
            seen_cache_capacity: 1024,
            pending_request_ttl_secs: 3600,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    exchange: ExchangeConfig,
}

/// Errors that can occur during config loading.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// File I/O error.
    #[error("Failed to read {path}: {error}")]
    Io {
        /// Path of the file that failed to load
        path: String,
        /// Error message from the I/O operation
        error: String,
    },

    /// TOML parsing error.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// An environment override is not a valid number.
    #[error("Invalid value for {var}: {value}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Rejected value
        value: String,
    },

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ExchangeConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string. Missing keys keep their defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(file.exchange)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply `PX_*` environment overrides.
    ///
    /// # Environment Variables
    ///
    /// - `PX_POLL_INTERVAL_SECS`
    /// - `PX_HANDSHAKE_MAX_ATTEMPTS`
    /// - `PX_MAX_PAGES_PER_FETCH`
    /// - `PX_SEEN_CACHE_CAPACITY`
    /// - `PX_PENDING_REQUEST_TTL_SECS`
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        override_from_env("PX_POLL_INTERVAL_SECS", &mut self.poll_interval_secs)?;
        override_from_env("PX_HANDSHAKE_MAX_ATTEMPTS", &mut self.handshake_max_attempts)?;
        override_from_env("PX_MAX_PAGES_PER_FETCH", &mut self.max_pages_per_fetch)?;
        override_from_env("PX_SEEN_CACHE_CAPACITY", &mut self.seen_cache_capacity)?;
        override_from_env("PX_PENDING_REQUEST_TTL_SECS", &mut self.pending_request_ttl_secs)?;
        Ok(self)
    }

    /// Reject zero intervals and budgets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be > 0".into()));
        }
        if self.handshake_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "handshake_max_attempts must be > 0".into(),
            ));
        }
        if self.max_pages_per_fetch == 0 {
            return Err(ConfigError::Invalid("max_pages_per_fetch must be > 0".into()));
        }
        if self.seen_cache_capacity == 0 {
            return Err(ConfigError::Invalid("seen_cache_capacity must be > 0".into()));
        }
        if self.pending_request_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "pending_request_ttl_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Poll period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// How long a pending request is kept.
    pub fn pending_request_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_request_ttl_secs)
    }
}

fn override_from_env<T: FromStr>(var: &'static str, target: &mut T) -> Result<(), ConfigError> {
    if let Ok(value) = env::var(var) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { var, value })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExchangeConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.handshake_max_attempts, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = ExchangeConfig::parse(
            r#"
            [exchange]
            poll_interval_secs = 5
            max_pages_per_fetch = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.max_pages_per_fetch, 2);
        assert_eq!(config.handshake_max_attempts, 10);
    }

    #[test]
    fn test_parse_empty_is_default() {
        assert_eq!(ExchangeConfig::parse("").unwrap(), ExchangeConfig::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = ExchangeConfig::parse("[exchange]\npoll_interval = 5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange.toml");
        std::fs::write(&path, "[exchange]\nhandshake_max_attempts = 4\n").unwrap();

        let config = ExchangeConfig::load(&path).unwrap();
        assert_eq!(config.handshake_max_attempts, 4);

        assert!(matches!(
            ExchangeConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = ExchangeConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_env_override() {
        // Only this test touches this variable.
        env::set_var("PX_SEEN_CACHE_CAPACITY", "64");
        let config = ExchangeConfig::from_env().unwrap();
        env::remove_var("PX_SEEN_CACHE_CAPACITY");

        assert_eq!(config.seen_cache_capacity, 64);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        env::set_var("PX_PENDING_REQUEST_TTL_SECS", "soon");
        let result = ExchangeConfig::default().with_env_overrides();
        env::remove_var("PX_PENDING_REQUEST_TTL_SECS");

        assert_eq!(
            result,
            Err(ConfigError::InvalidEnv {
                var: "PX_PENDING_REQUEST_TTL_SECS",
                value: "soon".into()
            })
        );
    }
}
