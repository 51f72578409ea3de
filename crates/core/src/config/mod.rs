//! Fetcher configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (WICKET_*)
//! 2. TOML config file (if WICKET_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Sub-resource URL fragments blocked by default.
///
/// Known ad/tracker/audio endpoints embedded in target pages. Matched as
/// plain substrings against every outgoing sub-resource request URL.
pub const DEFAULT_BLOCKED_FRAGMENTS: &[&str] = &[
    "players.radioonlinehd.com/ads",
    "events.newsroom.bi",
    "radioonlinehd",
    "stream.zeno.fm",
    "hosted.muses.org",
    "disquscdn.com",
];

/// Upstream proxy settings.
///
/// Set via WICKET_PROXY__ADDRESS, WICKET_PROXY__USERNAME and
/// WICKET_PROXY__PASSWORD environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy address passed to the browser (host:port, no credentials).
    pub address: String,

    /// Username answered to proxy auth challenges.
    #[serde(default)]
    pub username: Option<String>,

    /// Password answered to proxy auth challenges.
    #[serde(default)]
    pub password: Option<String>,
}

/// Fetcher configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (WICKET_*)
/// 2. TOML config file (if WICKET_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Run the browser headless.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Keep the Chromium sandbox enabled. Off by default because the
    /// target deployment runs in a container where the sandbox cannot
    /// start.
    #[serde(default)]
    pub sandbox: bool,

    /// Persistent browser profile directory, so cookies and local state
    /// survive across launches.
    #[serde(default = "default_user_data_dir")]
    pub user_data_dir: PathBuf,

    /// User-Agent presented by every tab.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Accept-Language header presented by every tab.
    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Default tab viewport width in pixels.
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    /// Default tab viewport height in pixels.
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Default response cache TTL in seconds. Per-instance and per-call
    /// overrides win over this value.
    #[serde(default = "default_cache_time_secs")]
    pub cache_time_secs: u64,

    /// How long to wait for the stage-one interstitial to auto-resolve.
    #[serde(default = "default_challenge_wait_secs")]
    pub challenge_wait_secs: u64,

    /// Total navigation attempts for page-level faults.
    #[serde(default = "default_navigation_retries")]
    pub navigation_retries: u32,

    /// Whole-operation retries after a browser connection fault.
    #[serde(default = "default_connection_retries")]
    pub connection_retries: u32,

    /// Base backoff in seconds between connection-fault retries; doubles
    /// on each attempt.
    #[serde(default = "default_connection_backoff_secs")]
    pub connection_backoff_secs: u64,

    /// CDP request timeout in milliseconds; navigation exceeding it is
    /// reported as a timeout fault.
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Path to the SQLite cookie store.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Substring blocklist applied to outgoing sub-resource requests.
    #[serde(default = "default_blocked_fragments")]
    pub blocked_url_fragments: Vec<String>,

    /// Site hosts that are never seeded from nor persisted to the cookie
    /// store. Some sites reject sessions presenting stale cookies.
    #[serde(default)]
    pub cookie_exempt_sites: Vec<String>,

    /// Upstream proxy, if any.
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

fn default_true() -> bool {
    true
}

fn default_user_data_dir() -> PathBuf {
    PathBuf::from("./browser-data")
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/114.0.0.0 Safari/537.36 Edg/114.0.1823.43"
        .into()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9".into()
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    800
}

fn default_cache_time_secs() -> u64 {
    5
}

fn default_challenge_wait_secs() -> u64 {
    10
}

fn default_navigation_retries() -> u32 {
    3
}

fn default_connection_retries() -> u32 {
    3
}

fn default_connection_backoff_secs() -> u64 {
    10
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./wicket-store.sqlite")
}

fn default_blocked_fragments() -> Vec<String> {
    DEFAULT_BLOCKED_FRAGMENTS.iter().map(|s| s.to_string()).collect()
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: false,
            user_data_dir: default_user_data_dir(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            cache_time_secs: default_cache_time_secs(),
            challenge_wait_secs: default_challenge_wait_secs(),
            navigation_retries: default_navigation_retries(),
            connection_retries: default_connection_retries(),
            connection_backoff_secs: default_connection_backoff_secs(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            store_path: default_store_path(),
            blocked_url_fragments: default_blocked_fragments(),
            cookie_exempt_sites: Vec::new(),
            proxy: None,
        }
    }
}

impl FetcherConfig {
    /// Default cache TTL as a Duration.
    pub fn cache_time(&self) -> Duration {
        Duration::from_secs(self.cache_time_secs)
    }

    /// Stage-one challenge wait as a Duration.
    pub fn challenge_wait(&self) -> Duration {
        Duration::from_secs(self.challenge_wait_secs)
    }

    /// Base connection-fault backoff as a Duration.
    pub fn connection_backoff(&self) -> Duration {
        Duration::from_secs(self.connection_backoff_secs)
    }

    /// Navigation timeout as a Duration.
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `WICKET_`
    /// 2. TOML file from `WICKET_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("WICKET_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("WICKET_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetcherConfig::default();
        assert!(config.headless);
        assert!(!config.sandbox);
        assert_eq!(config.viewport_width, 1280);
        assert_eq!(config.viewport_height, 800);
        assert_eq!(config.cache_time_secs, 5);
        assert_eq!(config.challenge_wait_secs, 10);
        assert_eq!(config.navigation_retries, 3);
        assert!(config.proxy.is_none());
        assert!(config.cookie_exempt_sites.is_empty());
        assert!(config.blocked_url_fragments.contains(&"disquscdn.com".to_string()));
    }

    #[test]
    fn test_durations() {
        let config = FetcherConfig::default();
        assert_eq!(config.cache_time(), Duration::from_secs(5));
        assert_eq!(config.challenge_wait(), Duration::from_secs(10));
        assert_eq!(config.connection_backoff(), Duration::from_secs(10));
        assert_eq!(config.navigation_timeout(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_default_user_agent_looks_real() {
        let config = FetcherConfig::default();
        assert!(config.user_agent.starts_with("Mozilla/5.0"));
        assert!(config.user_agent.contains("Chrome/"));
    }
}
