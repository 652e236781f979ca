//! Injectable behaviour for the resource client.
//!
//! A client carries one [`UrlBuilder`](crate::UrlBuilder), one [`ResponseParser`], and an
//! optional [`ErrorHandler`]. Each has a default and can be replaced per instance; plain
//! closures with the right signature work for all three.

use crate::classify::Failure;
use crate::error::FetchError;
use crate::resource::{Resource, ResourceId};

/// Decodes a response body into a resource payload.
pub trait ResponseParser: Send + Sync {
    fn parse(&self, body: &[u8]) -> Result<Resource, Failure>;
}

impl<F> ResponseParser for F
where
    F: Fn(&[u8]) -> Result<Resource, Failure> + Send + Sync,
{
    fn parse(&self, body: &[u8]) -> Result<Resource, Failure> {
        self(body)
    }
}

/// Default parser: the body must be a JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl ResponseParser for JsonParser {
    fn parse(&self, body: &[u8]) -> Result<Resource, Failure> {
        Ok(serde_json::from_slice::<Resource>(body)?)
    }
}

/// Receives every unrecoverable read failure before the client degrades.
///
/// For resource reads, returning `Some(payload)` serves that payload to the caller instead of
/// the empty default. The fallback is not cached. For list endpoints (`id` is `None`) the
/// returned value is ignored and the handler acts as a notification hook.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: &FetchError, id: Option<&ResourceId>) -> Option<Resource>;
}

impl<F> ErrorHandler for F
where
    F: Fn(&FetchError, Option<&ResourceId>) -> Option<Resource> + Send + Sync,
{
    fn handle(&self, error: &FetchError, id: Option<&ResourceId>) -> Option<Resource> {
        self(error, id)
    }
}
