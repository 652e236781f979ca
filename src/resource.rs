//! Resource identifiers, payloads, and URL construction.

use crate::classify::Failure;
use serde_json::Value;
use std::fmt;

/// Translation entries for one `(language, namespace)` pair. Key order is preserved and values
/// may nest to any depth; the transport and cache layers never look inside.
pub type Resource = serde_json::Map<String, Value>;

/// Default path template for resource URLs, relative to the base URL.
pub const DEFAULT_PATH_TEMPLATE: &str = "resources/{{lang}}/{{ns}}";

const LANG_PLACEHOLDER: &str = "{{lang}}";
const NS_PLACEHOLDER: &str = "{{ns}}";

/// Composite key naming one resource. The language is the partition component used for
/// group invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    language: String,
    namespace: String,
}

impl ResourceId {
    pub fn new(language: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self { language: language.into(), namespace: namespace.into() }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.language, self.namespace)
    }
}

/// Ensure the base URL ends with exactly one `/` so relative paths append cleanly.
pub fn normalize_base_url(base: &str) -> String {
    let trimmed = base.trim().trim_end_matches('/');
    format!("{}/", trimmed)
}

/// Builds the upstream URL of a resource.
pub trait UrlBuilder: Send + Sync {
    /// `base_url` is already normalized to end with `/`.
    fn resource_url(&self, base_url: &str, id: &ResourceId) -> String;
}

impl<F> UrlBuilder for F
where
    F: Fn(&str, &ResourceId) -> String + Send + Sync,
{
    fn resource_url(&self, base_url: &str, id: &ResourceId) -> String {
        self(base_url, id)
    }
}

/// Substitutes `{{lang}}` and `{{ns}}` in a path template with percent-encoded values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    template: String,
}

impl PathTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Path for `id`, without the base URL.
    pub fn render(&self, id: &ResourceId) -> String {
        self.template
            .replace(LANG_PLACEHOLDER, &urlencoding::encode(id.language()))
            .replace(NS_PLACEHOLDER, &urlencoding::encode(id.namespace()))
    }
}

impl Default for PathTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_PATH_TEMPLATE)
    }
}

impl UrlBuilder for PathTemplate {
    fn resource_url(&self, base_url: &str, id: &ResourceId) -> String {
        let path = self.render(id);
        format!("{}{}", base_url, path.trim_start_matches('/'))
    }
}

/// Decode a list endpoint body: either a bare JSON array of strings or an object carrying the
/// array under `field`.
pub fn parse_name_list(body: &[u8], field: &str) -> Result<Vec<String>, Failure> {
    let value: Value = serde_json::from_slice(body)?;
    let list = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(field) {
            Some(Value::Array(items)) => items,
            _ => return Err(shape_error(format!("expected an array under `{}`", field))),
        },
        _ => return Err(shape_error("expected an array or an object".to_string())),
    };
    list.into_iter()
        .map(|item| match item {
            Value::String(name) => Ok(name),
            other => Err(shape_error(format!("expected a string, found {}", other))),
        })
        .collect()
}

fn shape_error(message: String) -> Failure {
    Failure::parse(<serde_json::Error as serde::de::Error>::custom(message))
}
