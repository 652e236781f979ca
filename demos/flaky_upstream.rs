//! Retry, backoff, and graceful degradation against a simulated flaky upstream.

use async_trait::async_trait;
use lexifetch::prelude::*;
use lexifetch::telemetry::{shared, RetryEvent};
use lexifetch::{Failure, HttpRequest, HttpResponse, Transport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fails the first `failures` requests with a 503, then serves a small bundle.
#[derive(Debug)]
struct Flaky {
    failures: usize,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for Flaky {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, Failure> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        println!("   -> {} {} (call {call})", request.method, request.url);
        if call <= self.failures {
            return Ok(HttpResponse::new(503, "service unavailable"));
        }
        Ok(HttpResponse::new(200, r#"{"hello":"Hello","bye":"Goodbye"}"#))
    }
}

async fn run(title: &str, failures: usize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{title}");
    let calls = Arc::new(AtomicUsize::new(0));
    let sink = MemorySink::new();
    let config = ClientConfig::builder("http://flaky.local/api")
        .retry_delay(Duration::from_millis(50))
        .max_retries(3)
        .build()?;
    let client = ResourceClient::builder(config)
        .transport(Flaky { failures, calls: calls.clone() })
        .sink(shared(sink.clone()))
        .build()?;

    let bundle = client.get_resource("en", "common").await;
    println!("   result: {} keys after {} calls", bundle.len(), calls.load(Ordering::SeqCst));
    for event in sink.events() {
        if let FetchEvent::Retry(RetryEvent::Scheduled { .. } | RetryEvent::Exhausted { .. }) = event {
            println!("   event: {event}");
        }
    }
    println!();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== lexifetch: flaky upstream ===\n");
    run("1. Recovers after two 503s", 2).await?;
    run("2. Gives up after four 503s and serves an empty bundle", usize::MAX).await?;
    Ok(())
}
