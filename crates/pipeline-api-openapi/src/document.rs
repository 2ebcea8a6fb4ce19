//! Typed `OpenAPI` 3.0 document.
//!
//! Only the subset the generator emits is modelled. Component and parameter
//! schemas reuse the core [`Schema`] type, so everything produced by the
//! adapter can be stored without a detour through untyped JSON.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pipeline_api_core::{unescape_segment, InstanceType, Schema, SchemaMap, SchemaObject};

use crate::error::{Error, Result};

/// Prefix of every component schema pointer.
pub const COMPONENTS_PREFIX: &str = "#/components/schemas/";

/// Name of the shared error envelope schema.
pub const ERROR_SCHEMA: &str = "Error";

/// An `OpenAPI` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    /// `OpenAPI` version string, e.g. `"3.0.0"`.
    pub openapi: String,
    /// API metadata.
    pub info: Info,
    /// Server list (a single entry carrying the base path, when set).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    /// `path → verb → operation`.
    #[serde(default)]
    pub paths: IndexMap<String, PathItem>,
    /// Reusable components.
    #[serde(default)]
    pub components: Components,
}

/// `info` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Info {
    /// API title.
    pub title: String,
    /// API version.
    pub version: String,
    /// Optional long description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for Info {
    fn default() -> Self {
        Self {
            title: "API".to_string(),
            version: "1.0.0".to_string(),
            description: None,
        }
    }
}

/// `servers[]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    /// Server URL, possibly relative.
    pub url: String,
}

/// `components` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    /// Named schemas. Names are unique.
    #[serde(default)]
    pub schemas: SchemaMap,
}

/// Operations of one path, keyed by lowercase HTTP verb.
pub type PathItem = IndexMap<String, Operation>;

/// An operation object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Human readable description.
    pub description: String,
    /// Unique operation id.
    pub operation_id: String,
    /// Path and query parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    /// Request body, for create / patch / replace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code or `"default"`.
    pub responses: IndexMap<String, Response>,
}

/// Where a parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    /// Query string.
    Query,
    /// Path segment.
    Path,
    /// Request header.
    Header,
}

/// Parameter serialization style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterStyle {
    /// `a=1&a=2`, used for arrays.
    Form,
    /// `a[b]=1`, used for objects.
    DeepObject,
}

/// A parameter object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Location.
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    /// Copied from the property schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the parameter is mandatory.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    /// Value shape.
    pub schema: Schema,
    /// Serialization style, when not the default for the location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ParameterStyle>,
}

impl Parameter {
    /// The mandatory `id` path parameter of item routes.
    #[must_use]
    pub fn path_id() -> Self {
        Self {
            name: "id".to_string(),
            location: ParameterLocation::Path,
            description: None,
            required: true,
            schema: Schema::typed(InstanceType::String),
            style: None,
        }
    }
}

/// A request body object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    /// Human readable description.
    pub description: String,
    /// Whether a body is mandatory.
    pub required: bool,
    /// Media type → shape.
    pub content: IndexMap<String, MediaType>,
}

/// A response object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Human readable description.
    pub description: String,
    /// Media type → shape.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<String, MediaType>,
}

/// A media type object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    /// Body shape.
    pub schema: Schema,
}

impl Default for OpenApiDocument {
    fn default() -> Self {
        Self::new("3.0.0", Info::default())
    }
}

impl OpenApiDocument {
    /// An empty document with the shared `Error` schema registered.
    pub fn new(openapi: impl Into<String>, info: Info) -> Self {
        let mut schemas = SchemaMap::new();
        schemas.insert(ERROR_SCHEMA.to_string(), error_schema());
        Self {
            openapi: openapi.into(),
            info,
            servers: Vec::new(),
            paths: IndexMap::new(),
            components: Components { schemas },
        }
    }

    /// Add a server entry for `base_path`, unless it is empty.
    #[must_use]
    pub fn with_base_path(mut self, base_path: &str) -> Self {
        if !base_path.is_empty() {
            self.servers.push(Server {
                url: base_path.to_string(),
            });
        }
        self
    }

    /// Register a component schema.
    ///
    /// # Errors
    ///
    /// [`Error::SchemaNameCollision`] when `name` is taken.
    pub fn insert_schema(&mut self, name: impl Into<String>, schema: Schema) -> Result<()> {
        let name = name.into();
        if self.components.schemas.contains_key(&name) {
            return Err(Error::SchemaNameCollision { name });
        }
        self.components.schemas.insert(name, schema);
        Ok(())
    }

    /// Component schema by name.
    #[must_use]
    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.components.schemas.get(name)
    }

    /// Add an operation under `path` / `method`.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateOperation`] when that verb is already documented for `path`.
    pub fn insert_operation(
        &mut self,
        path: &str,
        method: &str,
        operation: Operation,
    ) -> Result<()> {
        let item = self.paths.entry(path.to_string()).or_default();
        if item.contains_key(method) {
            return Err(Error::DuplicateOperation {
                method: method.to_string(),
                path: path.to_string(),
            });
        }
        item.insert(method.to_string(), operation);
        Ok(())
    }

    /// Operation by path and verb.
    #[must_use]
    pub fn operation(&self, path: &str, method: &str) -> Option<&Operation> {
        self.paths.get(path)?.get(method)
    }

    /// Resolve a `#/components/schemas/...` pointer.
    #[must_use]
    pub fn resolve_ref(&self, reference: &str) -> Option<&Schema> {
        let rest = reference.strip_prefix(COMPONENTS_PREFIX)?;
        let (name, pointer) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        self.schema(&unescape_segment(name))?.pointer(pointer)
    }

    /// Render as JSON.
    ///
    /// # Errors
    ///
    /// [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Render as YAML text.
    ///
    /// # Errors
    ///
    /// [`Error::Yaml`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}

/// `{ code: integer, message: string }`, the error envelope.
fn error_schema() -> Schema {
    let mut obj = SchemaObject {
        instance_type: Some(pipeline_api_core::SchemaType::Single(InstanceType::Object)),
        title: Some(ERROR_SCHEMA.to_string()),
        required: vec!["code".to_string(), "message".to_string()],
        ..SchemaObject::default()
    };
    obj.properties
        .insert("code".to_string(), Schema::typed(InstanceType::Integer));
    obj.properties
        .insert("message".to_string(), Schema::typed(InstanceType::String));
    Schema::object(obj)
}
