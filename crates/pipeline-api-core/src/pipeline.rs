//! The pipeline contract: declared schemas, relations and async operations.
//!
//! A pipeline owns the business logic of one resource type. The transports
//! never look inside it; they only read its [`ResourceSchemas`] to decide
//! which operations exist and how their inputs are shaped, then call the
//! matching async method.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PipelineError;
use crate::relation::Relation;
use crate::schema::{InstanceType, Schema};

/// Query object passed to pipeline operations.
pub type Query = Map<String, Value>;

/// Caller-supplied transport-level fields passed to pipeline operations.
pub type Context = Map<String, Value>;

/// Outcome of every pipeline operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultPage {
    /// Affected or matching resources.
    pub data: Vec<Value>,
    /// Operation-specific metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ResultPage {
    /// A page without metadata.
    #[must_use]
    pub fn new(data: Vec<Value>) -> Self {
        Self { data, meta: None }
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// `true` when no resource matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The five resource operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Insert new resources.
    Create,
    /// Find resources by query.
    Read,
    /// Overwrite one resource by id.
    Replace,
    /// Partially update resources matching a query.
    Patch,
    /// Remove resources matching a query.
    Delete,
}

impl Operation {
    /// Every operation, in registration order.
    pub const ALL: [Self; 5] = [
        Self::Read,
        Self::Create,
        Self::Patch,
        Self::Replace,
        Self::Delete,
    ];

    /// Lowercase operation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Replace => "replace",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }

    /// `UpperCamel` operation name, used in schema role names.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Read => "Read",
            Self::Replace => "Replace",
            Self::Patch => "Patch",
            Self::Delete => "Delete",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schemas of a single operation. An absent schema means the input is not used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationSchemas {
    /// Query (filter) shape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Schema>,
    /// Body shape (one item for create).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Schema>,
    /// Shape of the `meta` object in the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Schema>,
}

/// Everything a pipeline declares about its inputs and outputs.
///
/// Deserializable, so a resource can also be described in a JSON or YAML
/// manifest without a running pipeline:
///
/// ```yaml
/// model: { type: object, properties: { id: { type: string } } }
/// context: { type: object, properties: { _role: { type: string } } }
/// read:
///   query: { type: object, properties: { id: { type: string } } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSchemas {
    /// Shape of a stored resource.
    pub model: Schema,
    /// Context shape shared by every operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Schema>,
    /// `create` schemas.
    pub create: OperationSchemas,
    /// `read` schemas.
    pub read: OperationSchemas,
    /// `replace` schemas.
    pub replace: OperationSchemas,
    /// `patch` schemas.
    pub patch: OperationSchemas,
    /// `delete` schemas.
    pub delete: OperationSchemas,
}

impl Default for ResourceSchemas {
    fn default() -> Self {
        Self {
            model: Schema::typed(InstanceType::Object),
            context: None,
            create: OperationSchemas::default(),
            read: OperationSchemas::default(),
            replace: OperationSchemas::default(),
            patch: OperationSchemas::default(),
            delete: OperationSchemas::default(),
        }
    }
}

impl ResourceSchemas {
    /// Start from a model schema with every operation unavailable.
    #[must_use]
    pub fn new(model: Schema) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }

    /// Schemas of `op`.
    #[must_use]
    pub fn operation(&self, op: Operation) -> &OperationSchemas {
        match op {
            Operation::Create => &self.create,
            Operation::Read => &self.read,
            Operation::Replace => &self.replace,
            Operation::Patch => &self.patch,
            Operation::Delete => &self.delete,
        }
    }

    /// Mutable schemas of `op`.
    pub fn operation_mut(&mut self, op: Operation) -> &mut OperationSchemas {
        match op {
            Operation::Create => &mut self.create,
            Operation::Read => &mut self.read,
            Operation::Replace => &mut self.replace,
            Operation::Patch => &mut self.patch,
            Operation::Delete => &mut self.delete,
        }
    }

    /// Whether `op` is offered.
    ///
    /// Availability is structural: read and delete need a query schema,
    /// create, replace and patch need a values schema.
    #[must_use]
    pub fn is_available(&self, op: Operation) -> bool {
        let schemas = self.operation(op);
        match op {
            Operation::Read | Operation::Delete => schemas.query.is_some(),
            Operation::Create | Operation::Replace | Operation::Patch => schemas.values.is_some(),
        }
    }

    /// Offered operations, in [`Operation::ALL`] order.
    pub fn available(&self) -> impl Iterator<Item = Operation> + '_ {
        Operation::ALL.into_iter().filter(|op| self.is_available(*op))
    }

    /// Schemas published as named document components, with their role suffix.
    ///
    /// The model has an empty role. Query and context shapes are projected to
    /// parameters instead and are never listed here.
    #[must_use]
    pub fn named(&self) -> Vec<(String, &Schema)> {
        let mut out = vec![(String::new(), &self.model)];
        for op in [
            Operation::Create,
            Operation::Read,
            Operation::Replace,
            Operation::Patch,
            Operation::Delete,
        ] {
            let schemas = self.operation(op);
            if let Some(values) = &schemas.values {
                out.push((format!("{}Values", op.title()), values));
            }
            if let Some(meta) = &schemas.meta {
                out.push((format!("{}Meta", op.title()), meta));
            }
        }
        out
    }

    /// Context property names also declared by the query schema of `op`.
    #[must_use]
    pub fn context_conflicts(&self, op: Operation) -> Vec<String> {
        let (Some(context), Some(query)) = (
            self.context.as_ref().and_then(Schema::as_object),
            self.operation(op).query.as_ref().and_then(Schema::as_object),
        ) else {
            return Vec::new();
        };
        context
            .properties
            .keys()
            .filter(|name| query.properties.contains_key(*name))
            .cloned()
            .collect()
    }
}

/// Whether a query schema allows a collection-level route (no `{id}` segment).
///
/// The route is allowed unless `id` is required as a single scalar: absent
/// from `required`, declared as an array, or offered through more than one
/// `oneOf` alternative all leave room for a multi-resource call.
#[must_use]
pub fn exposes_collection_route(query: Option<&Schema>) -> bool {
    let Some(query) = query.and_then(Schema::as_object) else {
        return true;
    };
    if !query.is_required("id") {
        return true;
    }
    let Some(id) = query.properties.get("id").and_then(Schema::as_object) else {
        return false;
    };
    if id.has_type(InstanceType::Array) {
        return true;
    }
    id.one_of.as_ref().is_some_and(|alternatives| alternatives.len() > 1)
}

/// A resource implementation.
///
/// Every operation defaults to a [`NotImplemented`](crate::ErrorKind::NotImplemented)
/// error; implementors override the ones their schemas declare.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Declared input and output shapes.
    fn schemas(&self) -> &ResourceSchemas;

    /// Declared relations to other pipelines.
    fn relations(&self) -> &[Relation] {
        &[]
    }

    /// Insert `values`.
    async fn create(
        &self,
        values: Vec<Value>,
        query: Query,
        context: Context,
    ) -> Result<ResultPage, PipelineError> {
        let _ = (values, query, context);
        Err(PipelineError::not_implemented("create"))
    }

    /// Find resources matching `query`.
    async fn read(&self, query: Query, context: Context) -> Result<ResultPage, PipelineError> {
        let _ = (query, context);
        Err(PipelineError::not_implemented("read"))
    }

    /// Overwrite resource `id` with `values`.
    async fn replace(
        &self,
        id: String,
        values: Value,
        context: Context,
    ) -> Result<ResultPage, PipelineError> {
        let _ = (id, values, context);
        Err(PipelineError::not_implemented("replace"))
    }

    /// Apply `values` to resources matching `query`.
    async fn patch(
        &self,
        query: Query,
        values: Value,
        context: Context,
    ) -> Result<ResultPage, PipelineError> {
        let _ = (query, values, context);
        Err(PipelineError::not_implemented("patch"))
    }

    /// Remove resources matching `query`.
    async fn delete(&self, query: Query, context: Context) -> Result<ResultPage, PipelineError> {
        let _ = (query, context);
        Err(PipelineError::not_implemented("delete"))
    }
}

/// Shared handle to a pipeline.
pub type PipelineRef = Arc<dyn Pipeline>;

/// Identity of a pipeline instance, stable for the lifetime of its `Arc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineId(usize);

impl PipelineId {
    /// Identity of `pipeline`. Clones of the same `Arc` share it.
    #[must_use]
    pub fn of(pipeline: &PipelineRef) -> Self {
        Self(Arc::as_ptr(pipeline).cast::<()>() as usize)
    }
}
