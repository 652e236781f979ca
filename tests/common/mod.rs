//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use lexifetch::{Failure, HttpRequest, HttpResponse, Resource, Transport};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Turn a `json!` object literal into a resource payload.
pub fn resource(value: Value) -> Resource {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Transport that replays a script of outcomes and records every request.
///
/// Once the script runs dry it keeps answering with `fallback`.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Result<HttpResponse, Failure>>>>,
    fallback: HttpResponse,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::with_fallback(HttpResponse::new(200, b"{}".to_vec()))
    }

    pub fn with_fallback(fallback: HttpResponse) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback,
            requests: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn push_json(&self, status: u16, body: Value) -> &Self {
        self.push(Ok(HttpResponse::new(status, body.to_string().into_bytes())))
    }

    pub fn push(&self, outcome: Result<HttpResponse, Failure>) -> &Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, Failure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}
