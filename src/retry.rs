//! Retry policy implementation
//!
//! Bounded retry loop for fallible async operations whose failures are [`FetchError`]s.
//!
//! Semantics:
//! - `max_retries` counts retries after the initial attempt, so at most `max_retries + 1`
//!   attempts run.
//! - A failure is retried only when its `retryable` flag is set; anything else is returned
//!   after that single attempt.
//! - Between attempts the loop sleeps for the current delay (optionally jittered), then
//!   advances the delay through the [`Backoff`].
//! - Sleeper controls how delays are applied (production uses `TokioSleeper`; tests can inject
//!   `InstantSleeper`/`TrackingSleeper`).
//!
//! The loop state is a [`RetryState`]: `attempts_remaining` starts at `max_retries` and
//! counts down to zero, `current_delay` starts at the backoff's initial delay.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use lexifetch::{Backoff, ErrorKind, FetchError, InstantSleeper, RetryPolicy};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let policy = RetryPolicy::builder()
//!     .max_retries(3)
//!     .backoff(Backoff::exponential(Duration::from_millis(300)))
//!     .with_sleeper(InstantSleeper)
//!     .build();
//! let result: Result<(), FetchError> = policy
//!     .run(|| async { Err(FetchError::new(ErrorKind::Server, "HTTP 503", "http://x")) })
//!     .await;
//! assert_eq!(result.unwrap_err().attempts(), 4);
//! # });
//! ```

use crate::error::FetchError;
use crate::telemetry::{emit_best_effort, shared, FetchEvent, NullSink, RetryEvent, SharedSink};
use crate::{Backoff, Jitter, Sleeper, TokioSleeper};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: usize = 3;
/// Default delay before the first retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(300);

/// Mutable state of one retry loop invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    pub attempts_remaining: usize,
    pub current_delay: Duration,
}

impl RetryState {
    fn new(max_retries: usize, backoff: &Backoff) -> Self {
        Self { attempts_remaining: max_retries, current_delay: backoff.initial() }
    }

    fn is_exhausted(&self) -> bool {
        self.attempts_remaining == 0
    }

    fn advance(&mut self, backoff: &Backoff) {
        self.attempts_remaining -= 1;
        self.current_delay = backoff.advance(self.current_delay);
    }
}

/// Retry policy combining backoff, jitter, sleeper, and an event sink.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    backoff: Backoff,
    jitter: Jitter,
    sleeper: Arc<dyn Sleeper>,
    sink: SharedSink,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("jitter", &self.jitter)
            .field("sleeper", &self.sleeper)
            .field("sink", &"<sink>")
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicyBuilder::new().build()
    }
}

impl RetryPolicy {
    /// Construct a new builder with defaults.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub(crate) fn sink(&self) -> &SharedSink {
        &self.sink
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or the retry
    /// budget is spent. The returned error records how many attempts were made.
    pub async fn run<T, Fut, Op>(&self, mut operation: Op) -> Result<T, FetchError>
    where
        Fut: Future<Output = Result<T, FetchError>>,
        Op: FnMut() -> Fut,
    {
        let mut state = RetryState::new(self.max_retries, &self.backoff);
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err.with_attempts(attempt),
            };

            if !err.is_retryable() {
                return Err(err);
            }

            if state.is_exhausted() {
                tracing::warn!(
                    attempts = attempt,
                    kind = %err.kind(),
                    url = err.url(),
                    "retry budget exhausted"
                );
                self.emit(FetchEvent::Retry(RetryEvent::Exhausted {
                    total_attempts: attempt,
                    kind: err.kind(),
                }))
                .await;
                return Err(err);
            }

            let pause = self.jitter.apply(state.current_delay);
            tracing::debug!(
                attempt,
                delay_ms = pause.as_millis() as u64,
                kind = %err.kind(),
                "retrying after failure"
            );
            self.emit(FetchEvent::Retry(RetryEvent::Scheduled {
                attempt,
                delay: pause,
                kind: err.kind(),
            }))
            .await;

            self.sleeper.sleep(pause).await;
            state.advance(&self.backoff);
        }
    }

    async fn emit(&self, event: FetchEvent) {
        emit_best_effort(self.sink.clone(), event).await;
    }
}

/// Builder for `RetryPolicy`.
pub struct RetryPolicyBuilder {
    max_retries: usize,
    backoff: Backoff,
    jitter: Jitter,
    sleeper: Arc<dyn Sleeper>,
    sink: SharedSink,
}

impl RetryPolicyBuilder {
    /// Defaults: 3 retries, exponential backoff from 300ms, no jitter.
    pub fn new() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::exponential(DEFAULT_RETRY_DELAY),
            jitter: Jitter::None,
            sleeper: Arc::new(TokioSleeper),
            sink: shared(NullSink),
        }
    }

    /// Retries after the initial attempt. Zero disables retrying.
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Provide a custom sleeper implementation.
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub(crate) fn with_shared_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: self.backoff,
            jitter: self.jitter,
            sleeper: self.sleeper,
            sink: self.sink,
        }
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::telemetry::MemorySink;
    use crate::{InstantSleeper, TrackingSleeper};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn failing(kind: ErrorKind) -> FetchError {
        FetchError::new(kind, "boom", "http://upstream/resources/en/common")
    }

    fn policy(max_retries: usize, sleeper: TrackingSleeper) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(max_retries)
            .backoff(Backoff::exponential(Duration::from_millis(300)))
            .with_sleeper(sleeper)
            .build()
    }

    #[tokio::test]
    async fn success_first_attempt() {
        let sleeper = TrackingSleeper::new();
        let counter = AtomicUsize::new(0);

        let result = policy(3, sleeper.clone())
            .run(|| async {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, FetchError>(42)
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn retryable_failure_exhausts_after_max_retries_plus_one() {
        let sleeper = TrackingSleeper::new();
        let counter = AtomicUsize::new(0);

        let result = policy(3, sleeper.clone())
            .run(|| async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(failing(ErrorKind::Server))
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(err.attempts(), 4);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(300), Duration::from_millis(600), Duration::from_millis(1200)]
        );
    }

    #[tokio::test]
    async fn non_retryable_short_circuits() {
        let sleeper = TrackingSleeper::new();
        let counter = AtomicUsize::new(0);

        let result = policy(3, sleeper.clone())
            .run(|| async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(failing(ErrorKind::NotFound))
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.attempts(), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn success_after_transient_failures() {
        let counter = AtomicUsize::new(0);

        let result = policy(3, TrackingSleeper::new())
            .run(|| async {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(failing(ErrorKind::Timeout))
                } else {
                    Ok("payload")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "payload");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn constant_backoff_keeps_delay() {
        let sleeper = TrackingSleeper::new();
        let policy = RetryPolicy::builder()
            .max_retries(3)
            .backoff(Backoff::constant(Duration::from_millis(300)))
            .with_sleeper(sleeper.clone())
            .build();

        let _ = policy.run(|| async { Err::<(), _>(failing(ErrorKind::Network)) }).await;

        assert_eq!(sleeper.delays(), vec![Duration::from_millis(300); 3]);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let counter = AtomicUsize::new(0);
        let policy =
            RetryPolicy::builder().max_retries(0).with_sleeper(InstantSleeper).build();

        let err = policy
            .run(|| async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(failing(ErrorKind::TooManyRequests))
            })
            .await
            .unwrap_err();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn jitter_never_exceeds_backoff_delay() {
        let sleeper = TrackingSleeper::new();
        let policy = RetryPolicy::builder()
            .max_retries(3)
            .backoff(Backoff::exponential(Duration::from_millis(300)))
            .with_jitter(Jitter::Full)
            .with_sleeper(sleeper.clone())
            .build();

        let _ = policy.run(|| async { Err::<(), _>(failing(ErrorKind::Server)) }).await;

        let expected_caps = [300, 600, 1200];
        for (delay, cap) in sleeper.delays().iter().zip(expected_caps) {
            assert!(*delay <= Duration::from_millis(cap));
        }
    }

    #[tokio::test]
    async fn emits_scheduled_and_exhausted_events() {
        let sink = MemorySink::new();
        let policy = RetryPolicy::builder()
            .max_retries(1)
            .backoff(Backoff::constant(Duration::from_millis(10)))
            .with_sleeper(InstantSleeper)
            .with_sink(shared(sink.clone()))
            .build();

        let _ = policy.run(|| async { Err::<(), _>(failing(ErrorKind::Server)) }).await;

        assert_eq!(
            sink.events(),
            vec![
                FetchEvent::Retry(RetryEvent::Scheduled {
                    attempt: 1,
                    delay: Duration::from_millis(10),
                    kind: ErrorKind::Server,
                }),
                FetchEvent::Retry(RetryEvent::Exhausted {
                    total_attempts: 2,
                    kind: ErrorKind::Server,
                }),
            ]
        );
    }
}
