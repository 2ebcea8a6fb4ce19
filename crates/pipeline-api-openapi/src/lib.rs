#![allow(clippy::doc_markdown)] // README uses "OpenAPI" proper noun throughout
#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! ## API Reference

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod adapter;
mod builder;
mod config;
mod document;
mod error;
mod helpers;
mod parameters;

pub use adapter::{flatten, remap_refs, to_openapi_schema};
pub use builder::{document_resource, RestDocBuilder};
pub use config::{DocumentConfig, ManifestResource, ResourceManifest};
pub use document::{
    Components, Info, MediaType, OpenApiDocument, Operation, Parameter, ParameterLocation,
    ParameterStyle, PathItem, RequestBody, Response, Server, COMPONENTS_PREFIX, ERROR_SCHEMA,
};
pub use error::{Error, Result};
pub use helpers::{component_ref, upper_camel, upper_first, JSON_MEDIA_TYPE};
pub use parameters::{dedupe, path_parameters, to_parameters};
