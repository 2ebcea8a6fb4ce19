//! Document-level configuration and resource manifests loaded from YAML.
//!
//! # Config file format
//!
//! ```yaml
//! # api/openapi/config.yaml
//! openapi: "3.0.0"
//! base_path: /api
//! internal_option_prefix: "_"
//! info:
//!   title: Library
//!   version: "1.2.0"
//!   description: Books and their authors.
//! ```
//!
//! # Manifest file format
//!
//! A manifest describes resources without a running pipeline, which is all
//! the CLI needs to emit a document:
//!
//! ```yaml
//! resources:
//!   - name: book
//!     plural: books        # defaults to name + "s"
//!     model: { type: object, properties: { id: { type: string } } }
//!     read:
//!       query: { type: object, properties: { id: { type: string } } }
//! ```

use std::path::Path;

use serde::Deserialize;

use pipeline_api_core::{InternalOptions, ResourceSchemas, DEFAULT_INTERNAL_PREFIX};

use crate::builder::document_resource;
use crate::document::{Info, OpenApiDocument};
use crate::error;

/// Document-level settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// `OpenAPI` version string written to the document.
    pub openapi: String,

    /// API metadata.
    pub info: Info,

    /// Path prefix every route is mounted under (e.g. `/api`). Empty for none.
    pub base_path: String,

    /// Prefix of internal context fields hidden from the document.
    pub internal_option_prefix: String,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            openapi: "3.0.0".to_string(),
            info: Info::default(),
            base_path: String::new(),
            internal_option_prefix: DEFAULT_INTERNAL_PREFIX.to_string(),
        }
    }
}

impl DocumentConfig {
    /// Load config from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse config from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed.
    pub fn from_yaml(content: &str) -> error::Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    /// Set the document title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.info.title = title.into();
        self
    }

    /// Set the API version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.info.version = version.into();
        self
    }

    /// Set the base path.
    #[must_use]
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// The internal option filter for this config.
    #[must_use]
    pub fn internal_options(&self) -> InternalOptions {
        InternalOptions::new(self.internal_option_prefix.clone())
    }

    /// An empty document carrying these settings.
    #[must_use]
    pub fn new_document(&self) -> OpenApiDocument {
        OpenApiDocument::new(self.openapi.clone(), self.info.clone()).with_base_path(&self.base_path)
    }
}

/// A resource described by a manifest entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManifestResource {
    /// Singular resource name.
    pub name: String,

    /// Plural name used in paths. Defaults to `name + "s"`.
    #[serde(default)]
    pub plural: Option<String>,

    /// Declared schemas.
    #[serde(flatten)]
    pub schemas: ResourceSchemas,
}

impl ManifestResource {
    /// The plural name, explicit or derived.
    #[must_use]
    pub fn plural_name(&self) -> String {
        self.plural
            .clone()
            .unwrap_or_else(|| format!("{}s", self.name))
    }
}

/// A list of resources to document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResourceManifest {
    /// Resources, documented in order.
    pub resources: Vec<ManifestResource>,
}

impl ResourceManifest {
    /// Load a manifest from a YAML (or JSON) file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a manifest from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed.
    pub fn from_yaml(content: &str) -> error::Result<Self> {
        Ok(serde_yaml_ng::from_str(content)?)
    }

    /// Build the full document for every resource of the manifest.
    ///
    /// # Errors
    ///
    /// Any registration error of [`document_resource`].
    pub fn document(&self, config: &DocumentConfig) -> error::Result<OpenApiDocument> {
        let mut doc = config.new_document();
        let internal = config.internal_options();
        for resource in &self.resources {
            tracing::debug!(resource = %resource.name, "documenting resource");
            document_resource(
                &mut doc,
                &resource.schemas,
                &resource.name,
                &resource.plural_name(),
                &internal,
            )?;
        }
        Ok(doc)
    }
}
