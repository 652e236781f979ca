//! Convenient re-exports for common lexifetch types.
pub use crate::{
    backoff::{Backoff, BackoffError, MAX_BACKOFF},
    client::{ResourceClient, ResourceClientBuilder},
    config::{ClientConfig, ConfigError},
    error::{BuildError, ErrorKind, FetchError},
    jitter::Jitter,
    resource::{Resource, ResourceId, UrlBuilder},
    strategy::{ErrorHandler, ResponseParser},
    telemetry::{FetchEvent, LogSink, MemorySink},
};
