//! Per-attempt deadline
//!
//! The future passed to [`TimeoutPolicy::execute`] is dropped when the deadline fires, which
//! aborts the in-flight request. Only that attempt is cancelled; the retry loop around it
//! decides whether another attempt follows.

use crate::classify::Failure;
use crate::error::BuildError;
use std::future::Future;
use std::time::Duration;

/// Default per-attempt deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    duration: Duration,
}

impl TimeoutPolicy {
    /// Create a timeout policy. The duration must be non-zero.
    pub fn new(duration: Duration) -> Result<Self, BuildError> {
        if duration.is_zero() {
            return Err(BuildError::InvalidTimeout(duration));
        }
        Ok(Self { duration })
    }

    /// Inspect the configured timeout duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Run `attempt`, failing with [`Failure::Timeout`] if it outlives the deadline.
    pub async fn execute<T, Fut>(&self, attempt: Fut) -> Result<T, Failure>
    where
        Fut: Future<Output = Result<T, Failure>>,
    {
        match tokio::time::timeout(self.duration, attempt).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(timeout_ms = self.duration.as_millis() as u64, "attempt timed out");
                Err(Failure::Timeout { limit: Some(self.duration) })
            }
        }
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self { duration: DEFAULT_TIMEOUT }
    }
}
