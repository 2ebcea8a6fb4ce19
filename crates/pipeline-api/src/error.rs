//! Registration-time errors.
//!
//! Anything that makes the served surface ambiguous or unsafe aborts
//! [`ApiBuilder::register`](crate::ApiBuilder::register) or
//! [`ApiBuilder::build`](crate::ApiBuilder::build). Request-time failures are
//! [`PipelineError`](pipeline_api_core::PipelineError) values instead.

use pipeline_api_core::{Operation, SchemaError};

/// Errors produced while registering resources and building the API.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Context and query schemas of one operation declare the same field.
    #[error(
        "{resource}: context and {operation} query both declare {}; \
         rename one of them",
        conflicts.join(", ")
    )]
    ParamsNameConflict {
        /// Resource name.
        resource: String,
        /// Operation whose query schema clashes.
        operation: Operation,
        /// Shared field names.
        conflicts: Vec<String>,
    },

    /// A resource with this name or plural is already registered.
    #[error("resource '{0}' is already registered")]
    DuplicateResource(String),

    /// The plural name is not a single URL path segment, or collides with
    /// a built-in endpoint (`api.json`, `graphql`, `graphqlSchema`).
    #[error("'{0}' cannot be used as a resource path")]
    ReservedPath(String),

    /// A declared schema could not be compiled.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The `OpenAPI` document rejected the resource.
    #[error(transparent)]
    Document(#[from] pipeline_api_openapi::Error),

    /// The GraphQL schema could not be built.
    #[error("invalid GraphQL schema: {0}")]
    GraphQl(String),

    /// Reading a config file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A config file is not valid YAML.
    #[error(transparent)]
    Yaml(#[from] serde_yaml_ng::Error),
}

/// Convenience alias for registration results.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_name_conflict_lists_fields() {
        let err = ConfigError::ParamsNameConflict {
            resource: "book".to_string(),
            operation: Operation::Read,
            conflicts: vec!["lang".to_string(), "page".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "book: context and read query both declare lang, page; rename one of them"
        );
    }

    #[test]
    fn document_errors_convert() {
        let err: ConfigError = pipeline_api_openapi::Error::SchemaNameCollision {
            name: "Book".to_string(),
        }
        .into();
        assert!(matches!(err, ConfigError::Document(_)));
        assert!(err.to_string().contains("'Book'"));
    }
}
