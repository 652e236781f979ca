use crate::error::ErrorKind;
use crate::resource::ResourceId;
use std::fmt;
use std::time::Duration;

/// Events emitted while serving resource requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// Cache store activity.
    Cache(CacheEvent),
    /// Retry loop activity.
    Retry(RetryEvent),
    /// Outcome of a single upstream attempt.
    Request(RequestOutcome),
    /// A read path gave up and served an empty result.
    Degraded {
        /// URL of the failed request.
        url: String,
        /// Classification of the final failure.
        kind: ErrorKind,
    },
    /// A payload was written upstream and mirrored into the cache.
    Saved {
        language: String,
        namespace: String,
    },
}

/// Events emitted by the resource cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Hit { language: String, namespace: String },
    Miss { language: String, namespace: String },
    Stored { language: String, namespace: String },
}

/// Events emitted by the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryEvent {
    /// A failed attempt will be retried after `delay`.
    Scheduled {
        /// The attempt that just failed (1-indexed).
        attempt: usize,
        /// Pause before the next attempt.
        delay: Duration,
        /// Why the attempt failed.
        kind: ErrorKind,
    },
    /// The retry budget ran out.
    Exhausted {
        /// Total number of attempts made
        total_attempts: usize,
        /// Classification of the last failure.
        kind: ErrorKind,
    },
}

/// Outcome of one upstream attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Success { duration: Duration, status: u16 },
    Failure { duration: Duration, kind: ErrorKind },
}

impl CacheEvent {
    pub fn hit(id: &ResourceId) -> Self {
        CacheEvent::Hit { language: id.language().to_string(), namespace: id.namespace().to_string() }
    }

    pub fn miss(id: &ResourceId) -> Self {
        CacheEvent::Miss { language: id.language().to_string(), namespace: id.namespace().to_string() }
    }

    pub fn stored(id: &ResourceId) -> Self {
        CacheEvent::Stored { language: id.language().to_string(), namespace: id.namespace().to_string() }
    }
}

impl fmt::Display for FetchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchEvent::Cache(event) => write!(f, "Cache::{}", event),
            FetchEvent::Retry(event) => write!(f, "Retry::{}", event),
            FetchEvent::Request(event) => write!(f, "Request::{}", event),
            FetchEvent::Degraded { url, kind } => write!(f, "Degraded(url={}, kind={})", url, kind),
            FetchEvent::Saved { language, namespace } => {
                write!(f, "Saved({}/{})", language, namespace)
            }
        }
    }
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheEvent::Hit { language, namespace } => write!(f, "Hit({}/{})", language, namespace),
            CacheEvent::Miss { language, namespace } => {
                write!(f, "Miss({}/{})", language, namespace)
            }
            CacheEvent::Stored { language, namespace } => {
                write!(f, "Stored({}/{})", language, namespace)
            }
        }
    }
}

impl fmt::Display for RetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryEvent::Scheduled { attempt, delay, kind } => {
                write!(f, "Scheduled(#{}, delay={:?}, kind={})", attempt, delay, kind)
            }
            RetryEvent::Exhausted { total_attempts, kind } => {
                write!(f, "Exhausted(attempts={}, kind={})", total_attempts, kind)
            }
        }
    }
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestOutcome::Success { duration, status } => {
                write!(f, "Success(status={}, duration={:?})", status, duration)
            }
            RequestOutcome::Failure { duration, kind } => {
                write!(f, "Failure(kind={}, duration={:?})", kind, duration)
            }
        }
    }
}
