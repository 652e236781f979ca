//! Failure classification.
//!
//! Turns a raw failure signal into a [`FetchError`]. The mapping is fixed:
//!
//! | signal | kind | retryable |
//! |---|---|---|
//! | connection failure | `network` | yes |
//! | deadline exceeded | `timeout` | yes |
//! | status >= 500 | `server` | yes |
//! | status 429 | `too_many_requests` | yes |
//! | status 404 | `not_found` | no |
//! | status 401 / 403 | `auth` | no |
//! | undecodable body | `parse` | no |
//! | anything else | `unknown` | no |

use crate::error::{Cause, ErrorKind, FetchError};
use std::sync::Arc;
use std::time::Duration;

/// Longest slice of a response body quoted in an error message.
const BODY_EXCERPT_LIMIT: usize = 200;

/// Raw failure observed while talking to the upstream service.
#[derive(Debug, Clone)]
pub enum Failure {
    /// The connection could not be made or broke mid-flight.
    Network(Cause),
    /// The attempt was aborted at its deadline.
    Timeout { limit: Option<Duration> },
    /// A response arrived with a non-success status.
    Status { status: u16, body: String },
    /// The body could not be decoded.
    Parse(Cause),
    /// Anything not covered above.
    Other(Cause),
}

impl Failure {
    pub fn network<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Failure::Network(Arc::new(err))
    }

    pub fn parse<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Failure::Parse(Arc::new(err))
    }

    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Failure::Other(Arc::new(err))
    }
}

impl From<reqwest::Error> for Failure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Failure::Timeout { limit: None }
        } else if err.is_decode() {
            Failure::parse(err)
        } else if err.is_connect() || err.is_request() || err.is_body() {
            Failure::network(err)
        } else {
            Failure::other(err)
        }
    }
}

impl From<serde_json::Error> for Failure {
    fn from(err: serde_json::Error) -> Self {
        Failure::parse(err)
    }
}

/// Classify a failure observed while requesting `url`.
pub fn classify(failure: Failure, url: &str) -> FetchError {
    match failure {
        Failure::Network(cause) => {
            FetchError::new(ErrorKind::Network, format!("network error: {}", cause), url)
                .with_cause(cause)
        }
        Failure::Timeout { limit } => FetchError::timeout(limit, url),
        Failure::Status { status, body } => classify_status(status, url, &body),
        Failure::Parse(cause) => {
            FetchError::new(ErrorKind::Parse, format!("invalid response body: {}", cause), url)
                .with_cause(cause)
        }
        Failure::Other(cause) => {
            FetchError::new(ErrorKind::Unknown, cause.to_string(), url).with_cause(cause)
        }
    }
}

/// Map an HTTP status to its error kind.
pub fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        429 => ErrorKind::TooManyRequests,
        404 => ErrorKind::NotFound,
        401 | 403 => ErrorKind::Auth,
        s if s >= 500 => ErrorKind::Server,
        _ => ErrorKind::Unknown,
    }
}

/// Classify a received response with a non-success `status`.
pub fn classify_status(status: u16, url: &str, body: &str) -> FetchError {
    let kind = kind_for_status(status);
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unexpected status");
    let excerpt = excerpt(body);
    let message = if excerpt.is_empty() {
        format!("HTTP {} {}", status, reason)
    } else {
        format!("HTTP {} {}: {}", status, reason, excerpt)
    };
    FetchError::new(kind, message, url).with_status(status)
}

fn excerpt(body: &str) -> &str {
    let body = body.trim();
    if body.len() <= BODY_EXCERPT_LIMIT {
        return body;
    }
    let mut end = BODY_EXCERPT_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
