//! Internal option filtering.
//!
//! Context fields whose name starts with a reserved prefix (`_` by default)
//! are internal: they can only be injected by the host, never supplied by
//! callers through a query string or GraphQL arguments.

use serde_json::{Map, Value};

/// Default prefix of internal option names.
pub const DEFAULT_INTERNAL_PREFIX: &str = "_";

/// Predicate and filter for internal option names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalOptions {
    prefix: String,
}

impl Default for InternalOptions {
    fn default() -> Self {
        Self::new(DEFAULT_INTERNAL_PREFIX)
    }
}

impl InternalOptions {
    /// Use `prefix` to recognise internal names. An empty prefix disables filtering.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `true` unless `name` carries the internal prefix.
    #[must_use]
    pub fn is_not_internal(&self, name: &str) -> bool {
        self.prefix.is_empty() || !name.starts_with(&self.prefix)
    }

    /// Remove internal keys from a flat object.
    #[must_use]
    pub fn filter(&self, mut object: Map<String, Value>) -> Map<String, Value> {
        object.retain(|key, _| self.is_not_internal(key));
        object
    }
}
