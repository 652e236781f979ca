#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # lexifetch
//!
//! Resilient fetch-with-cache client for namespaced translation bundles.
//!
//! ## Features
//!
//! - **Resource cache** keyed by `(language, namespace)` with optional expiry and three
//!   invalidation granularities
//! - **Failure classification** into a structured, typed [`FetchError`]
//! - **Retrying transport** with a hard per-attempt deadline and exponential or fixed backoff
//! - **Graceful degradation**: reads return empty results instead of failing, writes fail loudly
//! - **Injectable strategies** for URL construction, response parsing, and error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lexifetch::{ClientConfig, ResourceClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder("https://cdn.example.com/i18n")
//!         .timeout(Duration::from_secs(2))
//!         .max_retries(3)
//!         .build()?;
//!     let client = ResourceClient::new(config)?;
//!
//!     let common = client.get_resource("en", "common").await;
//!     println!("{} keys", common.len());
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod cache;
pub mod classify;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod jitter;
pub mod prelude;
pub mod resource;
pub mod retry;
pub mod sleeper;
pub mod strategy;
pub mod telemetry;
pub mod timeout;
pub mod transport;

// Re-exports
pub use backoff::{Backoff, BackoffError};
pub use cache::CacheStore;
pub use classify::{classify, classify_status, Failure};
pub use client::{ResourceClient, ResourceClientBuilder};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError};
pub use error::{BuildError, ErrorKind, FetchError};
pub use jitter::Jitter;
pub use resource::{PathTemplate, Resource, ResourceId, UrlBuilder};
pub use retry::{RetryPolicy, RetryPolicyBuilder, RetryState};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use strategy::{ErrorHandler, JsonParser, ResponseParser};
pub use timeout::TimeoutPolicy;
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, RetryingTransport, Transport};
