//! Configuration for the resolution engine.
//!
//! Loaded from TOML. The configuration collaborator owns the file; this
//! module only parses and validates it. Rebuilding a
//! [`ProviderRegistry`](crate::registry::ProviderRegistry) from an updated
//! `Config` and swapping it into the shared handle applies a settings change
//! without a process restart.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::{RetryPolicy, DEFAULT_RETRY_STATUSES};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    /// Upper bound on concurrently in-flight provider calls per lookup.
    #[serde(default = "default_fanout_concurrency")]
    pub fanout_concurrency: usize,

    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            fanout_concurrency: default_fanout_concurrency(),
            providers: Vec::new(),
        }
    }
}

/// Snapshot-cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Default time-to-live for cached lookup results, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Per-provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Stable provider name; must match a known provider implementation.
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Higher priorities resolve first on merge tie-breaks.
    #[serde(default)]
    pub priority: i32,

    /// Override of the provider's API base URL. Mainly for tests.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Per-provider cache TTL; merged results use the minimum TTL across the
    /// providers that contributed.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
}

impl ProviderConfig {
    /// A provider config with everything defaulted except the name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            priority: 0,
            base_url: None,
            credentials: CredentialsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            cache_ttl_secs: None,
        }
    }
}

/// Credentials for providers that need them.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    /// Bearer token for providers with token auth.
    #[serde(default)]
    pub token: Option<String>,
}

/// Request budget: `requests` per `window_ms` milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_requests")]
    pub requests: u32,

    #[serde(default = "default_rate_window_ms")]
    pub window_ms: u64,

    /// Maximum time a call may wait for a token before surfacing
    /// `RateLimitExceeded`. Unset means wait indefinitely.
    #[serde(default)]
    pub max_wait_ms: Option<u64>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: default_rate_requests(),
            window_ms: default_rate_window_ms(),
            max_wait_ms: None,
        }
    }
}

/// Backoff settings for the retry executor.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_min_timeout_ms")]
    pub min_timeout_ms: u64,

    #[serde(default = "default_retry_max_timeout_ms")]
    pub max_timeout_ms: u64,

    #[serde(default = "default_retry_factor")]
    pub factor: f64,

    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            min_timeout_ms: default_retry_min_timeout_ms(),
            max_timeout_ms: default_retry_max_timeout_ms(),
            factor: default_retry_factor(),
            retry_statuses: default_retry_statuses(),
        }
    }
}

impl RetryConfig {
    /// Build the executor policy for this config.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            min_timeout: Duration::from_millis(self.min_timeout_ms),
            max_timeout: Duration::from_millis(self.max_timeout_ms),
            factor: self.factor,
            retry_statuses: self.retry_statuses.clone(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_fanout_concurrency() -> usize {
    4
}
fn default_cache_ttl_secs() -> u64 {
    86_400
}
fn default_rate_requests() -> u32 {
    5
}
fn default_rate_window_ms() -> u64 {
    1_000
}
fn default_retries() -> u32 {
    3
}
fn default_retry_min_timeout_ms() -> u64 {
    250
}
fn default_retry_max_timeout_ms() -> u64 {
    10_000
}
fn default_retry_factor() -> f64 {
    2.0
}
fn default_retry_statuses() -> Vec<u16> {
    DEFAULT_RETRY_STATUSES.to_vec()
}

/// Parse configuration from a TOML string.
pub fn from_toml_str(content: &str) -> Result<Config> {
    let config: Config =
        toml::from_str(content).map_err(|e| Error::config(format!("invalid TOML: {e}")))?;
    validate(&config)?;
    Ok(config)
}

/// Load configuration from a TOML file.
pub fn load(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
    from_toml_str(&content)
}

/// Reject inconsistent settings before anything is built from them.
fn validate(config: &Config) -> Result<()> {
    if config.fanout_concurrency == 0 {
        return Err(Error::config("fanout_concurrency cannot be 0"));
    }
    if config.cache.ttl_secs == 0 {
        return Err(Error::config("cache.ttl_secs cannot be 0"));
    }

    let mut seen = std::collections::HashSet::new();
    for provider in &config.providers {
        if provider.name.is_empty() {
            return Err(Error::config("provider name cannot be empty"));
        }
        if !seen.insert(provider.name.as_str()) {
            return Err(Error::config(format!(
                "duplicate provider '{}'",
                provider.name
            )));
        }
        if provider.rate_limit.requests == 0 {
            return Err(Error::config(format!(
                "provider '{}': rate_limit.requests cannot be 0",
                provider.name
            )));
        }
        if provider.rate_limit.window_ms == 0 {
            return Err(Error::config(format!(
                "provider '{}': rate_limit.window_ms cannot be 0",
                provider.name
            )));
        }
        if provider.retry.factor < 1.0 {
            return Err(Error::config(format!(
                "provider '{}': retry.factor must be >= 1.0",
                provider.name
            )));
        }
    }

    Ok(())
}
