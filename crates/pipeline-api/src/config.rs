//! Host configuration loaded from YAML.
//!
//! ```yaml
//! base_path: /api
//! internal_option_prefix: "_"
//! info:
//!   title: Library
//!   version: "1.2.0"
//! graphql:
//!   enabled: true
//!   graphiql: true
//!   schema_endpoint: false
//! ```
//!
//! Document settings are shared with `pipeline-api-openapi`, so the same
//! file drives the CLI and a running server.

use std::path::Path;

use pipeline_api_openapi::DocumentConfig;
use serde::Deserialize;

use crate::error::Result;

/// Everything [`ApiBuilder`](crate::ApiBuilder) needs besides the pipelines.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// `OpenAPI` version, `info`, base path and internal option prefix.
    #[serde(flatten)]
    pub document: DocumentConfig,

    /// GraphQL endpoint switches.
    pub graphql: GraphQlConfig,
}

/// GraphQL endpoint switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GraphQlConfig {
    /// Serve `POST {base_path}/graphql`.
    pub enabled: bool,
    /// Serve the GraphiQL explorer on `GET {base_path}/graphql`.
    pub graphiql: bool,
    /// Serve the printed schema on `GET {base_path}/graphqlSchema`.
    pub schema_endpoint: bool,
}

impl Default for GraphQlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            graphiql: false,
            schema_endpoint: false,
        }
    }
}

impl ApiConfig {
    /// Load config from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse config from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed.
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    /// Set the base path every route is mounted under.
    #[must_use]
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.document = self.document.base_path(base_path);
        self
    }

    /// Set the document title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.document = self.document.title(title);
        self
    }

    /// Enable the GraphiQL explorer.
    #[must_use]
    pub fn graphiql(mut self, enabled: bool) -> Self {
        self.graphql.graphiql = enabled;
        self
    }

    /// Enable the printed-schema endpoint.
    #[must_use]
    pub fn graphql_schema_endpoint(mut self, enabled: bool) -> Self {
        self.graphql.schema_endpoint = enabled;
        self
    }

    /// Turn the GraphQL endpoint on or off.
    #[must_use]
    pub fn graphql(mut self, enabled: bool) -> Self {
        self.graphql.enabled = enabled;
        self
    }
}
