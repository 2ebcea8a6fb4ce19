#![allow(clippy::doc_markdown)] // README uses "OpenAPI", "GraphQL" and "GraphiQL" throughout
#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! ## API Reference
//!
//! # Types
//!
//! - [`ApiBuilder`] / [`Api`]: register pipelines, then serve them
//! - [`ApiConfig`]: base path, document metadata, GraphQL switches
//! - [`RestError`]: the `{ code, message }` error response
//! - [`translate`] / [`kind_to_http_status`]: error kind → HTTP status
//! - [`RequestInfo`]: what a context function sees of a request
//!
//! # Companion Crates
//!
//! | Crate                  | Purpose                                  |
//! |------------------------|------------------------------------------|
//! | `pipeline-api` (this)  | Runtime: REST, HAL, GraphQL              |
//! | `pipeline-api-core`    | Schema model, `Pipeline` trait, errors   |
//! | `pipeline-api-openapi` | `OpenAPI` document generation and CLI    |

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod api;
mod config;
mod error;
mod graphql;
mod host;
mod rest;
mod runtime;

pub use api::{Api, ApiBuilder};
pub use config::{ApiConfig, GraphQlConfig};
pub use error::{ConfigError, Result};
pub use host::{ContextFn, ErrorHook};
pub use runtime::*;

pub use pipeline_api_core::{
    async_trait, Cardinality, Context, ErrorKind, Operation, OperationSchemas, Pipeline,
    PipelineError, PipelineRef, Query, QueryTemplate, Relation, ResourceSchemas, ResultPage,
    Schema,
};
pub use pipeline_api_openapi::{DocumentConfig, OpenApiDocument, Parameter};
