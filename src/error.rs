//! Error types for resource fetching
//!
//! [`FetchError`] is a value, not a panic: the retry loop inspects its `retryable` flag, the
//! client hands it to an error handler or swallows it on read paths, and save paths return it.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Underlying cause carried by a [`FetchError`]. Shared so the error stays `Clone`.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport-level connection failure.
    Network,
    /// Per-attempt deadline exceeded.
    Timeout,
    /// HTTP status >= 500.
    Server,
    /// HTTP status 429.
    TooManyRequests,
    /// HTTP status 404.
    NotFound,
    /// HTTP status 401 or 403.
    Auth,
    /// Response body failed structural decoding.
    Parse,
    /// Operation refused by client configuration (e.g. saving disabled).
    Config,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Whether a failure of this kind is worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::Server | ErrorKind::TooManyRequests
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Server => "server",
            ErrorKind::TooManyRequests => "too_many_requests",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Auth => "auth",
            ErrorKind::Parse => "parse",
            ErrorKind::Config => "config",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured description of a failed fetch or save.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} error ({url}): {message}")]
pub struct FetchError {
    kind: ErrorKind,
    message: String,
    url: String,
    status: Option<u16>,
    retryable: bool,
    attempts: usize,
    #[source]
    cause: Option<Cause>,
}

impl FetchError {
    /// Build an error whose retryability follows from `kind`.
    pub fn new(kind: ErrorKind, message: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            url: url.into(),
            status: None,
            retryable: kind.is_retryable(),
            attempts: 1,
            cause: None,
        }
    }

    /// Configuration refusal. Never retryable and never touches the network.
    pub fn config(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message, url)
    }

    /// Per-attempt deadline exceeded.
    pub fn timeout(limit: Option<Duration>, url: impl Into<String>) -> Self {
        let message = match limit {
            Some(limit) => format!("request timed out after {}ms", limit.as_millis()),
            None => "request timed out".to_string(),
        };
        Self::new(ErrorKind::Timeout, message, url)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.cause = Some(cause);
        self
    }

    pub(crate) fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Attempts made before this error was surfaced.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

/// Errors produced while building policies or clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// The per-attempt deadline must be > 0.
    #[error("timeout must be > 0 (got {0:?})")]
    InvalidTimeout(Duration),
    /// Backoff configuration was rejected.
    #[error("invalid backoff: {0}")]
    Backoff(#[from] crate::backoff::BackoffError),
    /// Client configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
    /// The HTTP client could not be constructed.
    #[error("http client: {0}")]
    HttpClient(String),
}
