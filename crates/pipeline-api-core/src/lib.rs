//! Shared building blocks for the pipeline-api crates.
//!
//! This crate holds what both the document generator
//! (`pipeline-api-openapi`) and the runtime (`pipeline-api`) need:
//!
//! - [`Schema`]: a closed sum type over JSON Schema nodes, with [`walk`] for
//!   recursive traversal and pointer resolution for local `$ref`s
//! - [`Pipeline`]: the async resource contract and its [`ResourceSchemas`]
//! - [`Relation`] / [`QueryTemplate`]: links between pipelines
//! - [`PipelineError`]: the request-time error with a classifiable cause chain
//! - [`SchemaValidator`] / [`JsonSchemaValidator`]: coerce, strip and validate
//! - [`InternalOptions`]: the reserved-prefix filter for context fields
//!
//! You normally depend on `pipeline-api` and use the re-exports from there.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod options;
mod pipeline;
mod relation;
mod schema;
mod validator;
mod walk;

pub use error::{ErrorKind, PipelineError, SchemaError};
pub use options::{InternalOptions, DEFAULT_INTERNAL_PREFIX};
pub use pipeline::{
    exposes_collection_route, Context, Operation, OperationSchemas, Pipeline, PipelineId,
    PipelineRef, Query, ResourceSchemas, ResultPage,
};
pub use relation::{escape, Cardinality, QueryTemplate, Relation, TemplateValue};
pub use schema::{
    escape_segment, unescape_segment, InstanceType, Items, Schema, SchemaKind, SchemaMap,
    SchemaObject, SchemaType,
};
pub use validator::{coerce, strip, JsonSchemaValidator, SchemaValidator};
pub use walk::{walk, walk_ref};

/// Re-exported so pipeline implementations use the same macro version.
pub use async_trait::async_trait;
