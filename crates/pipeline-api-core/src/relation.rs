//! Relations between pipelines.
//!
//! A [`Relation`] points from the instances of one resource to another
//! pipeline. Its [`QueryTemplate`] mixes literal values with placeholders
//! that are filled from the parent instance, e.g. `{ "id": ":authorId" }`.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

use crate::error::PipelineError;
use crate::pipeline::{Context, PipelineRef, Query, ResultPage};

/// How many target resources a relation yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one target.
    One,
    /// Any number of targets.
    Many,
}

/// A single query template value.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    /// Placeholder filled from the named field of the parent instance.
    Field(String),
    /// Fixed value.
    Literal(Value),
}

/// Query object whose values may refer to fields of a parent instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryTemplate(IndexMap<String, TemplateValue>);

impl QueryTemplate {
    /// Empty template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a placeholder `key` filled from the parent's `field`.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, field: impl Into<String>) -> Self {
        self.0.insert(key.into(), TemplateValue::Field(field.into()));
        self
    }

    /// Add a literal `key`.
    #[must_use]
    pub fn literal(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), TemplateValue::Literal(value));
        self
    }

    /// Build from a JSON object where `":name"` strings are placeholders.
    #[must_use]
    pub fn from_json(template: &Map<String, Value>) -> Self {
        Self(
            template
                .iter()
                .map(|(key, value)| {
                    let value = match value.as_str().and_then(|s| s.strip_prefix(':')) {
                        Some(field) if !field.is_empty() => TemplateValue::Field(field.to_string()),
                        _ => TemplateValue::Literal(value.clone()),
                    };
                    (key.clone(), value)
                })
                .collect(),
        )
    }

    /// Iterate entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TemplateValue)> {
        self.0.iter()
    }

    /// Template keys.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Whether the template has no entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Substitute placeholders with the fields of `resource`.
    ///
    /// Placeholders whose field is missing or `null` are left out.
    #[must_use]
    pub fn hydrate(&self, resource: &Value) -> Query {
        self.0
            .iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    TemplateValue::Literal(v) => v.clone(),
                    TemplateValue::Field(field) => match resource.get(field) {
                        None | Some(Value::Null) => return None,
                        Some(v) => v.clone(),
                    },
                };
                Some((key.clone(), value))
            })
            .collect()
    }

    /// Placeholder entries as `key → field`.
    #[must_use]
    pub fn templated_parts(&self) -> IndexMap<&str, &str> {
        self.0
            .iter()
            .filter_map(|(key, value)| match value {
                TemplateValue::Field(field) => Some((key.as_str(), field.as_str())),
                TemplateValue::Literal(_) => None,
            })
            .collect()
    }

    /// Literal entries as `key → value`.
    #[must_use]
    pub fn literal_parts(&self) -> IndexMap<&str, &Value> {
        self.0
            .iter()
            .filter_map(|(key, value)| match value {
                TemplateValue::Literal(v) => Some((key.as_str(), v)),
                TemplateValue::Field(_) => None,
            })
            .collect()
    }
}

/// Everything but the unreserved characters of a URI component.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a value for use in a URI query or path segment.
///
/// Strings are encoded raw; other values use their JSON text. Unreserved
/// characters (`A-Z a-z 0-9 - _ . ! ~ * ' ( )`) are kept.
#[must_use]
pub fn escape(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    utf8_percent_encode(&raw, URI_COMPONENT).to_string()
}

type TargetFn = dyn Fn() -> PipelineRef + Send + Sync;

/// A navigable link from one resource's instances to another pipeline.
#[derive(Clone)]
pub struct Relation {
    /// Field name of the relation on the parent.
    pub name: String,
    /// One or many targets.
    pub cardinality: Cardinality,
    /// Query sent to the target, hydrated from the parent instance.
    pub query: QueryTemplate,
    /// Context entries always sent to the target.
    pub options: Context,
    target: Arc<TargetFn>,
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name)
            .field("cardinality", &self.cardinality)
            .field("query", &self.query)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Relation {
    /// A relation resolved lazily through `target`.
    ///
    /// The target is a closure so two pipelines can reference each other
    /// before either exists.
    pub fn new<F>(
        name: impl Into<String>,
        cardinality: Cardinality,
        target: F,
        query: QueryTemplate,
    ) -> Self
    where
        F: Fn() -> PipelineRef + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            cardinality,
            query,
            options: Context::new(),
            target: Arc::new(target),
        }
    }

    /// A [`Cardinality::One`] relation.
    pub fn one<F>(name: impl Into<String>, target: F, query: QueryTemplate) -> Self
    where
        F: Fn() -> PipelineRef + Send + Sync + 'static,
    {
        Self::new(name, Cardinality::One, target, query)
    }

    /// A [`Cardinality::Many`] relation.
    pub fn many<F>(name: impl Into<String>, target: F, query: QueryTemplate) -> Self
    where
        F: Fn() -> PipelineRef + Send + Sync + 'static,
    {
        Self::new(name, Cardinality::Many, target, query)
    }

    /// Fixed context entries for every call to the target.
    #[must_use]
    pub fn with_options(mut self, options: Context) -> Self {
        self.options = options;
        self
    }

    /// Resolve the target pipeline.
    #[must_use]
    pub fn pipeline(&self) -> PipelineRef {
        (self.target)()
    }

    /// Read the targets of `entity`.
    ///
    /// `query` and `context` add to the hydrated template and the fixed
    /// options; on a key clash the relation's own entries win.
    ///
    /// # Errors
    ///
    /// Whatever the target's `read` returns.
    pub async fn fetch(
        &self,
        entity: &Value,
        query: Query,
        context: Context,
    ) -> Result<ResultPage, PipelineError> {
        let mut full_query = query;
        full_query.extend(self.query.hydrate(entity));
        let mut full_context = context;
        full_context.extend(self.options.clone());
        self.pipeline().read(full_query, full_context).await
    }
}
