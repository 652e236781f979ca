//! Client configuration.
//!
//! [`ClientConfig`] holds every serializable option. It can be assembled with
//! [`ClientConfig::builder`] or decoded from a JSON document whose keys use camelCase
//! (`baseUrl`, `maxRetries`, ...). Durations are given in milliseconds.
//!
//! ```rust
//! use lexifetch::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::from_json(r#"{
//!     "baseUrl": "https://cdn.example.com/i18n",
//!     "timeout": 2000,
//!     "allowSaving": true
//! }"#).unwrap();
//! assert_eq!(config.timeout, Duration::from_millis(2000));
//! assert_eq!(config.max_retries, 3);
//! ```

use crate::jitter::Jitter;
use crate::resource::DEFAULT_PATH_TEMPLATE;
use crate::retry::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
use crate::timeout::DEFAULT_TIMEOUT;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::time::Duration;

/// Errors produced while validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("baseUrl is required")]
    MissingBaseUrl,
    #[error("baseUrl `{url}` is not a valid URL: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("baseUrl scheme must be http or https (got `{0}`)")]
    UnsupportedScheme(String),
    #[error("timeout must be > 0")]
    ZeroTimeout,
    #[error("maxRetryDelay ({max:?}) must be >= retryDelay ({base:?})")]
    MaxRetryDelayBelowBase { base: Duration, max: Duration },
    #[error("invalid configuration document: {0}")]
    Document(String),
}

/// Options recognised by the resource client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Root of the upstream API. Required.
    pub base_url: String,
    /// Resource path relative to `base_url`, with `{{lang}}` / `{{ns}}` placeholders.
    pub resource_path_template: String,
    /// Path of the language list endpoint.
    pub languages_path: String,
    /// Path of the namespace list endpoint.
    pub namespaces_path: String,
    /// Per-attempt deadline.
    #[serde(deserialize_with = "millis")]
    pub timeout: Duration,
    /// Retries after the initial attempt.
    pub max_retries: usize,
    /// Delay before the first retry.
    #[serde(deserialize_with = "millis")]
    pub retry_delay: Duration,
    /// Double the delay after every retry instead of keeping it fixed.
    pub use_exponential_backoff: bool,
    /// Upper bound on the retry delay. Only meaningful with exponential backoff.
    #[serde(deserialize_with = "optional_millis")]
    pub max_retry_delay: Option<Duration>,
    pub jitter: Jitter,
    /// Classify non-2xx responses as failures.
    pub auto_handle_status: bool,
    /// Permit `save_resource`.
    pub allow_saving: bool,
    pub cache_enabled: bool,
    /// Lifetime of cached entries. Zero keeps them until invalidated.
    #[serde(deserialize_with = "millis")]
    pub cache_ttl: Duration,
    /// Share one upstream fetch between concurrent reads of the same resource.
    pub dedupe_requests: bool,
    /// Headers merged into every request.
    pub headers: BTreeMap<String, String>,
    /// Query parameters appended to every request URL.
    pub query_params: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            resource_path_template: DEFAULT_PATH_TEMPLATE.to_string(),
            languages_path: "languages".to_string(),
            namespaces_path: "namespaces".to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            use_exponential_backoff: true,
            max_retry_delay: None,
            jitter: Jitter::None,
            auto_handle_status: true,
            allow_saving: false,
            cache_enabled: true,
            cache_ttl: Duration::ZERO,
            dedupe_requests: false,
            headers: BTreeMap::new(),
            query_params: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    /// Defaults with the given base URL. Not validated until used.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder { config: Self::new(base_url) }
    }

    /// Decode and validate a JSON configuration document.
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(document).map_err(|e| ConfigError::Document(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        let parsed = url::Url::parse(base).map_err(|e| ConfigError::InvalidBaseUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(parsed.scheme().to_string()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if let Some(max) = self.max_retry_delay {
            if max < self.retry_delay || max.is_zero() {
                return Err(ConfigError::MaxRetryDelayBelowBase { base: self.retry_delay, max });
            }
        }
        Ok(())
    }
}

/// Fluent builder for [`ClientConfig`]; `build` validates.
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn resource_path_template(mut self, template: impl Into<String>) -> Self {
        self.config.resource_path_template = template.into();
        self
    }

    pub fn languages_path(mut self, path: impl Into<String>) -> Self {
        self.config.languages_path = path.into();
        self
    }

    pub fn namespaces_path(mut self, path: impl Into<String>) -> Self {
        self.config.namespaces_path = path.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: usize) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn use_exponential_backoff(mut self, enabled: bool) -> Self {
        self.config.use_exponential_backoff = enabled;
        self
    }

    pub fn max_retry_delay(mut self, max: Duration) -> Self {
        self.config.max_retry_delay = Some(max);
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn auto_handle_status(mut self, enabled: bool) -> Self {
        self.config.auto_handle_status = enabled;
        self
    }

    pub fn allow_saving(mut self, enabled: bool) -> Self {
        self.config.allow_saving = enabled;
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.config.cache_enabled = enabled;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    pub fn dedupe_requests(mut self, enabled: bool) -> Self {
        self.config.dedupe_requests = enabled;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(key.into(), value.into());
        self
    }

    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.query_params.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

fn optional_millis<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}
