//! Configuration validation rules.
//!
//! This module provides validation logic for `FetcherConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::FetcherConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl FetcherConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `user_agent` is empty
    /// - either viewport dimension is 0 or exceeds 10000px
    /// - `navigation_retries` is 0
    /// - `cache_time_secs` is 0 or exceeds 24 hours
    /// - `navigation_timeout_ms` is below 100ms or exceeds 5 minutes
    /// - a proxy is configured without an address, or with only one half
    ///   of a credential pair
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(ConfigError::Invalid { field: "viewport".into(), reason: "dimensions must be nonzero".into() });
        }
        if self.viewport_width > 10_000 || self.viewport_height > 10_000 {
            return Err(ConfigError::Invalid { field: "viewport".into(), reason: "dimensions must not exceed 10000px".into() });
        }

        if self.navigation_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "navigation_retries".into(),
                reason: "at least one navigation attempt is required".into(),
            });
        }

        if self.cache_time_secs == 0 {
            return Err(ConfigError::Invalid { field: "cache_time_secs".into(), reason: "must be greater than 0".into() });
        }
        if self.cache_time_secs > 86_400 {
            return Err(ConfigError::Invalid {
                field: "cache_time_secs".into(),
                reason: "must not exceed 24 hours (86400s)".into(),
            });
        }

        if self.navigation_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "navigation_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.navigation_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "navigation_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if let Some(proxy) = &self.proxy {
            if proxy.address.is_empty() {
                return Err(ConfigError::Invalid { field: "proxy.address".into(), reason: "must not be empty".into() });
            }
            if proxy.username.is_some() != proxy.password.is_some() {
                return Err(ConfigError::Invalid {
                    field: "proxy".into(),
                    reason: "username and password must be set together".into(),
                });
            }
        }

        Ok(())
    }
}
