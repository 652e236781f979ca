//! Deadline + retry wrapper around a [`Transport`].

use super::{HttpRequest, HttpResponse, Transport};
use crate::classify::{classify, classify_status};
use crate::error::FetchError;
use crate::retry::RetryPolicy;
use crate::telemetry::{emit_best_effort, FetchEvent, RequestOutcome};
use crate::timeout::TimeoutPolicy;
use std::sync::Arc;
use std::time::Instant;

/// Executes requests with a hard per-attempt deadline and bounded retries.
///
/// Each attempt runs under the [`TimeoutPolicy`]. Failures are classified; retryable ones go
/// back through the [`RetryPolicy`] loop. With automatic status handling enabled (the default),
/// a non-2xx response counts as a failure of the kind its status maps to, so a 503 is retried
/// and a 404 is returned after one attempt.
#[derive(Debug, Clone)]
pub struct RetryingTransport {
    transport: Arc<dyn Transport>,
    timeout: TimeoutPolicy,
    retry: RetryPolicy,
    auto_handle_status: bool,
}

impl RetryingTransport {
    pub fn new(transport: Arc<dyn Transport>, timeout: TimeoutPolicy, retry: RetryPolicy) -> Self {
        Self { transport, timeout, retry, auto_handle_status: true }
    }

    /// When disabled, every received response is returned as-is, whatever its status.
    pub fn auto_handle_status(mut self, enabled: bool) -> Self {
        self.auto_handle_status = enabled;
        self
    }

    pub fn timeout(&self) -> &TimeoutPolicy {
        &self.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        let this = self;
        self.retry.run(move || async move { this.attempt(request).await }).await
    }

    async fn attempt(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        let started = Instant::now();
        let outcome = match self.timeout.execute(self.transport.send(request)).await {
            Ok(response) if self.auto_handle_status && !response.is_success() => {
                Err(classify_status(response.status, &request.url, &response.text()))
            }
            Ok(response) => Ok(response),
            Err(failure) => Err(classify(failure, &request.url)),
        };

        let duration = started.elapsed();
        let event = match &outcome {
            Ok(response) => RequestOutcome::Success { duration, status: response.status },
            Err(err) => {
                tracing::debug!(
                    method = %request.method,
                    url = %request.url,
                    kind = %err.kind(),
                    status = err.status(),
                    "attempt failed"
                );
                RequestOutcome::Failure { duration, kind: err.kind() }
            }
        };
        emit_best_effort(self.retry.sink().clone(), FetchEvent::Request(event)).await;
        outcome
    }
}
