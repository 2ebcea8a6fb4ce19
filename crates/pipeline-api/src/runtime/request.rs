//! Request-side helpers: query-string decoding, content negotiation and the
//! [`RequestInfo`] handed to per-request context functions.

use axum::http::{header, HeaderMap, Method, Uri};
use http::request::Parts;
use percent_encoding::percent_decode_str;
pub use pipeline_api_openapi::JSON_MEDIA_TYPE;
use serde_json::{Map, Value};

/// Media type of HAL responses.
pub const HAL_MEDIA_TYPE: &str = "application/hal+json";

/// Largest accepted request body.
pub(crate) const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Maximum nesting of bracketed query keys (`a[b][c]`).
const MAX_KEY_DEPTH: usize = 8;

/// What a context function sees of the incoming request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// HTTP method.
    pub method: Method,
    /// Request URI as routed.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
    /// Decoded query string.
    pub query: Map<String, Value>,
}

impl RequestInfo {
    /// Capture the request head.
    #[must_use]
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            query: parse_query(parts.uri.query().unwrap_or_default()),
        }
    }

    /// Header value as text, when present and visible ASCII.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Representation chosen by content negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// `application/json`.
    Json,
    /// `application/hal+json`, with `_links`.
    Hal,
}

/// Pick the response representation from the `Accept` header.
///
/// A missing or empty header means JSON. `None` when the header names
/// neither media type: such requests are left to whatever the host routes
/// after the API.
#[must_use]
pub fn negotiate(headers: &HeaderMap) -> Option<Representation> {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if accept.trim().is_empty() {
        Some(Representation::Json)
    } else if accept.contains(HAL_MEDIA_TYPE) {
        Some(Representation::Hal)
    } else if accept.contains(JSON_MEDIA_TYPE) {
        Some(Representation::Json)
    } else {
        None
    }
}

/// `true` when the request body is declared as HAL.
#[must_use]
pub fn is_hal_content(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with(HAL_MEDIA_TYPE))
}

/// Decode a query string into a JSON object.
///
/// - `a=1&b=x` gives string values `{ "a": "1", "b": "x" }`
/// - a repeated key collects an array: `a=1&a=2` gives `{ "a": ["1", "2"] }`
/// - `a[]=1&a[]=2` always gives an array
/// - `a[b]=1` nests: `{ "a": { "b": "1" } }`
///
/// Values stay strings; schema coercion turns them into numbers or booleans.
#[must_use]
pub fn parse_query(query: &str) -> Map<String, Value> {
    let mut out = Map::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = percent_decode(raw_key);
        let value = Value::String(percent_decode(raw_value));
        let path = key_path(&key);
        if let Some((first, rest)) = path.split_first() {
            insert_path(&mut out, first, rest, value);
        }
    }
    out
}

/// `a[b][]` → `["a", "b", ""]`. Unbalanced brackets keep the key verbatim.
fn key_path(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![key.to_string()];
    };
    if open == 0 || !key.ends_with(']') {
        return vec![key.to_string()];
    }
    let mut path = vec![key[..open].to_string()];
    for segment in key[open + 1..key.len() - 1].split("][") {
        if segment.contains(['[', ']']) || path.len() > MAX_KEY_DEPTH {
            return vec![key.to_string()];
        }
        path.push(segment.to_string());
    }
    path
}

fn insert_path(target: &mut Map<String, Value>, key: &str, rest: &[String], value: Value) {
    match rest.split_first() {
        None => match target.get_mut(key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, value]);
            }
            None => {
                target.insert(key.to_string(), value);
            }
        },
        // `a[]`: append. Segments after `[]` are ignored.
        Some((next, _)) if next.is_empty() => {
            match target
                .entry(key.to_string())
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                Value::Array(items) => items.push(value),
                existing => {
                    let previous = existing.take();
                    *existing = Value::Array(vec![previous, value]);
                }
            }
        }
        Some((next, tail)) => {
            let entry = target
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                insert_path(child, next, tail, value);
            }
        }
    }
}

/// Decode `%XX` escapes and `+` as space. Invalid UTF-8 is replaced lossily.
#[must_use]
pub fn percent_decode(input: &str) -> String {
    percent_decode_str(&input.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

/// Deep-merge `source` into `target`: objects merge key by key, anything
/// else in `source` overwrites.
pub fn merge_into(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match value {
            Value::Object(incoming) => match target.get_mut(&key) {
                Some(Value::Object(existing)) => merge_into(existing, incoming),
                _ => {
                    target.insert(key, Value::Object(incoming));
                }
            },
            other => {
                target.insert(key, other);
            }
        }
    }
}
