//! Telemetry for resource fetching.
//!
//! Every notable step of a fetch (cache hit or miss, retry scheduling, timeouts, degraded
//! reads, saves) is described by a [`FetchEvent`]. Events flow into a sink, which is any
//! `tower::Service<FetchEvent>`; emission is best-effort and never fails the operation
//! that produced the event.
//!
//! # Sinks
//!
//! - [`NullSink`]: discards everything (default).
//! - [`LogSink`]: forwards to `tracing` at a level chosen per event.
//! - [`MemorySink`]: bounded in-memory buffer, handy for inspection and tests.

pub mod events;
pub mod sinks;

pub use events::{CacheEvent, FetchEvent, RequestOutcome, RetryEvent};
pub use sinks::{emit_best_effort, shared, LogSink, MemorySink, NullSink, SharedSink};
