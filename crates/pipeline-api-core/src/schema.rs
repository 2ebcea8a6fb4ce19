//! JSON Schema node model.
//!
//! A schema node is either a boolean (always valid / never valid) or an
//! object description. Only the keywords the translation engine reasons about
//! get a dedicated field; everything else (`maxLength`, `format`, `minimum`,
//! `default`, vendor keys, ...) is carried verbatim in [`SchemaObject::extra`]
//! so a round trip through this model never loses information.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::SchemaError;

/// Ordered `name → schema` mapping used for `properties` and `definitions`.
pub type SchemaMap = IndexMap<String, Schema>;

/// A JSON Schema node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Schema {
    /// `true` accepts everything, `false` rejects everything.
    Bool(bool),
    /// An object description.
    Object(Box<SchemaObject>),
}

/// A JSON Schema object description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaObject {
    /// `$id`.
    #[serde(rename = "$id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// `$schema`.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub meta_schema: Option<String>,

    /// `$ref` pointer. Local pointers start with `#`.
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// `type`, either a single instance type or a list of them.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<SchemaType>,

    /// OpenAPI 3.0 `nullable` flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,

    /// `title`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// `description`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// `properties`, in declaration order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: SchemaMap,

    /// `required` property names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// `definitions`, nested named sub-schemas.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub definitions: SchemaMap,

    /// `oneOf`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Schema>>,

    /// `anyOf`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<Schema>>,

    /// `allOf`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Schema>>,

    /// `items`, a single schema or a tuple of schemas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Items>,

    /// `not`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<Schema>>,

    /// `additionalProperties`, a boolean or a schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,

    /// `patternProperties`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_properties: Option<SchemaMap>,

    /// `dependencies`, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Value>,

    /// `const`. `"const": null` is kept as `Some(Value::Null)`.
    #[serde(
        rename = "const",
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub const_value: Option<Value>,

    /// `enum`.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    /// Every other keyword, verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `type` keyword value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    /// `"type": "string"`
    Single(InstanceType),
    /// `"type": ["string", "null"]`
    Multiple(Vec<InstanceType>),
}

/// JSON Schema primitive instance types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    /// `null`
    Null,
    /// `boolean`
    Boolean,
    /// `object`
    Object,
    /// `array`
    Array,
    /// `number`
    Number,
    /// `string`
    String,
    /// `integer`
    Integer,
}

/// `items` keyword value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Items {
    /// Every element validates against the same schema.
    Single(Box<Schema>),
    /// Positional (tuple) validation.
    Tuple(Vec<Schema>),
}

/// Structural classification of a schema node.
///
/// Analysis code (parameter projection, route exposure, GraphQL conversion)
/// matches on this instead of sniffing individual keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind<'a> {
    /// Boolean schema.
    Boolean(bool),
    /// `$ref` node; siblings are ignored.
    Reference(&'a str),
    /// `object` type.
    Object,
    /// `array` type.
    Array,
    /// A single scalar type (`string`, `number`, `integer`, `boolean`, `null`).
    Scalar(InstanceType),
    /// Several instance types at once (`["string", "number"]`).
    Union,
    /// No `type`, composed through `oneOf` / `anyOf` / `allOf`.
    Composite,
    /// No `type` and no composition: anything goes.
    Untyped,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl InstanceType {
    /// JSON Schema spelling of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Number => "number",
            Self::String => "string",
            Self::Integer => "integer",
        }
    }

    /// Whether `value` is an instance of this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Null, Value::Null)
            | (Self::Boolean, Value::Bool(_))
            | (Self::Object, Value::Object(_))
            | (Self::Array, Value::Array(_))
            | (Self::Number, Value::Number(_))
            | (Self::String, Value::String(_)) => true,
            (Self::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for InstanceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SchemaType {
    /// All listed instance types.
    #[must_use]
    pub fn types(&self) -> &[InstanceType] {
        match self {
            Self::Single(t) => std::slice::from_ref(t),
            Self::Multiple(ts) => ts,
        }
    }

    /// Whether `t` is one of the listed types.
    #[must_use]
    pub fn contains(&self, t: InstanceType) -> bool {
        self.types().contains(&t)
    }
}

impl Schema {
    /// Parse a schema from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Json`] if the value is neither a boolean nor an object
    /// or a keyword has an unexpected shape.
    pub fn from_json(value: Value) -> Result<Self, SchemaError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Render the schema as a JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Bool(true))
    }

    /// Wrap an object description.
    #[must_use]
    pub fn object(object: SchemaObject) -> Self {
        Self::Object(Box::new(object))
    }

    /// A bare `{"$ref": pointer}` node.
    #[must_use]
    pub fn reference(pointer: impl Into<String>) -> Self {
        Self::object(SchemaObject {
            reference: Some(pointer.into()),
            ..SchemaObject::default()
        })
    }

    /// A `{"type": t}` node.
    #[must_use]
    pub fn typed(t: InstanceType) -> Self {
        Self::object(SchemaObject {
            instance_type: Some(SchemaType::Single(t)),
            ..SchemaObject::default()
        })
    }

    /// Borrow the object description, if any.
    #[must_use]
    pub fn as_object(&self) -> Option<&SchemaObject> {
        match self {
            Self::Object(obj) => Some(obj),
            Self::Bool(_) => None,
        }
    }

    /// Mutably borrow the object description, if any.
    pub fn as_object_mut(&mut self) -> Option<&mut SchemaObject> {
        match self {
            Self::Object(obj) => Some(obj),
            Self::Bool(_) => None,
        }
    }

    /// Structural classification of this node.
    #[must_use]
    pub fn kind(&self) -> SchemaKind<'_> {
        match self {
            Self::Bool(b) => SchemaKind::Boolean(*b),
            Self::Object(obj) => obj.kind(),
        }
    }

    /// Resolve a JSON pointer (the part after `#`) relative to this node.
    ///
    /// Only schema-bearing keywords are navigable: `properties`, `definitions`,
    /// `patternProperties`, `items`, `oneOf`, `anyOf`, `allOf`, `not` and
    /// `additionalProperties`. An empty pointer resolves to `self`.
    #[must_use]
    pub fn pointer(&self, pointer: &str) -> Option<&Self> {
        if pointer.is_empty() {
            return Some(self);
        }
        let mut segments = pointer.strip_prefix('/')?.split('/').map(unescape_segment);
        let mut current = self;

        while let Some(segment) = segments.next() {
            let obj = current.as_object()?;
            current = match segment.as_str() {
                "properties" => obj.properties.get(&segments.next()?)?,
                "definitions" => obj.definitions.get(&segments.next()?)?,
                "patternProperties" => obj.pattern_properties.as_ref()?.get(&segments.next()?)?,
                "oneOf" => nth(obj.one_of.as_deref()?, &segments.next()?)?,
                "anyOf" => nth(obj.any_of.as_deref()?, &segments.next()?)?,
                "allOf" => nth(obj.all_of.as_deref()?, &segments.next()?)?,
                "not" => obj.not.as_deref()?,
                "additionalProperties" => obj.additional_properties.as_deref()?,
                "items" => match obj.items.as_ref()? {
                    Items::Single(item) => item,
                    Items::Tuple(items) => nth(items, &segments.next()?)?,
                },
                _ => return None,
            };
        }

        Some(current)
    }

    /// Follow local `$ref` chains starting at `self`, resolving against `root`.
    ///
    /// Returns `self` unchanged when it is not a local reference. Gives up
    /// (returns `None`) on dangling pointers or chains longer than 32 hops.
    #[must_use]
    pub fn resolve<'a>(&'a self, root: &'a Self) -> Option<&'a Self> {
        let mut current = self;
        for _ in 0..32 {
            match current.as_object().and_then(SchemaObject::local_ref) {
                Some(pointer) => current = root.pointer(pointer)?,
                None => return Some(current),
            }
        }
        None
    }
}

fn nth<'a>(schemas: &'a [Schema], index: &str) -> Option<&'a Schema> {
    schemas.get(index.parse::<usize>().ok()?)
}

/// Decode a JSON pointer segment (`~1` → `/`, `~0` → `~`).
#[must_use]
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Encode a JSON pointer segment (`~` → `~0`, `/` → `~1`).
#[must_use]
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

impl From<SchemaObject> for Schema {
    fn from(object: SchemaObject) -> Self {
        Self::object(object)
    }
}

impl SchemaObject {
    /// Structural classification of this node.
    #[must_use]
    pub fn kind(&self) -> SchemaKind<'_> {
        if let Some(reference) = self.reference.as_deref() {
            return SchemaKind::Reference(reference);
        }
        match self.instance_type.as_ref().map(SchemaType::types) {
            Some([InstanceType::Object]) => SchemaKind::Object,
            Some([InstanceType::Array]) => SchemaKind::Array,
            Some([single]) => SchemaKind::Scalar(*single),
            Some(types) if !types.is_empty() => SchemaKind::Union,
            _ if self.has_composition() => SchemaKind::Composite,
            _ => SchemaKind::Untyped,
        }
    }

    /// The `$ref` pointer without its leading `#`, for local references only.
    #[must_use]
    pub fn local_ref(&self) -> Option<&str> {
        self.reference.as_deref()?.strip_prefix('#')
    }

    /// The single instance type, when exactly one is declared.
    #[must_use]
    pub fn single_type(&self) -> Option<InstanceType> {
        match self.instance_type.as_ref()?.types() {
            [t] => Some(*t),
            _ => None,
        }
    }

    /// Whether `type` lists `t`.
    #[must_use]
    pub fn has_type(&self, t: InstanceType) -> bool {
        self.instance_type.as_ref().is_some_and(|ty| ty.contains(t))
    }

    /// Whether the property is listed in `required`.
    #[must_use]
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Whether any of `oneOf` / `anyOf` / `allOf` is present.
    #[must_use]
    pub fn has_composition(&self) -> bool {
        self.one_of.is_some() || self.any_of.is_some() || self.all_of.is_some()
    }

    /// Members of `oneOf`, then `anyOf`, then `allOf`.
    pub fn composition(&self) -> impl Iterator<Item = &Schema> {
        self.one_of
            .iter()
            .chain(self.any_of.iter())
            .chain(self.all_of.iter())
            .flatten()
    }
}
