//! JSON Schema → GraphQL type conversion.
//!
//! Objects with at least one property become object types (input objects
//! for arguments). Everything GraphQL cannot express directly (unions of
//! several types, compositions, untyped or property-less objects) falls back
//! to the `JSON` scalar, so a schema never fails to convert.
//!
//! Nested object types are named after their position: `Book` →
//! `BookPublisher` for an inline `publisher` property, `BookAuthor` for a
//! `#/definitions/author` reference. Every name is claimed once per schema;
//! a second claim is a configuration error.

use std::collections::{HashMap, HashSet};

use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, InputObject, InputValue, Object, Scalar, SchemaBuilder,
    TypeRef,
};
use pipeline_api_core::{unescape_segment, InstanceType, Items, Schema, SchemaObject};
use pipeline_api_openapi::upper_camel;
use serde_json::Value;

use crate::error::{ConfigError, Result};

/// Catch-all scalar carrying raw JSON.
pub(crate) const JSON_SCALAR: &str = "JSON";

/// GraphQL shape of a schema node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Shape {
    /// A built-in scalar (`String`, `Int`, `Float`, `Boolean`).
    Scalar(&'static str),
    /// The `JSON` scalar.
    Json,
    /// A named object or input object type.
    Object(String),
    /// A list of the inner shape.
    List(Box<Shape>),
}

impl Shape {
    pub(crate) fn type_ref(&self) -> TypeRef {
        match self {
            Self::Scalar(name) => TypeRef::named(*name),
            Self::Json => TypeRef::named(JSON_SCALAR),
            Self::Object(name) => TypeRef::named(name.clone()),
            Self::List(inner) => TypeRef::List(Box::new(inner.type_ref())),
        }
    }

    /// Resolver output for a JSON value of this shape. `None` for `null`.
    ///
    /// Objects stay `serde_json::Value`s so nested field resolvers can
    /// downcast their parent.
    pub(crate) fn field_value<'a>(&self, value: &Value) -> Option<FieldValue<'a>> {
        match (self, value) {
            (_, Value::Null) => None,
            (Self::Object(_), Value::Object(_)) => Some(FieldValue::owned_any(value.clone())),
            (Self::List(inner), Value::Array(items)) => Some(FieldValue::list(
                items
                    .iter()
                    .map(|item| inner.field_value(item).unwrap_or(FieldValue::NULL)),
            )),
            _ => async_graphql::Value::from_json(value.clone())
                .ok()
                .map(FieldValue::value),
        }
    }
}

/// Whether `name` is a legal, non-reserved GraphQL name.
pub(crate) fn is_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        && !name.starts_with("__")
}

/// An output object type under construction.
///
/// Kept as a field list until the schema is finished so relation fields can
/// be added, or replace a property of the same name, after every pipeline
/// is registered.
pub(crate) struct ObjectSpec {
    name: String,
    fields: Vec<(String, Field)>,
}

impl ObjectSpec {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add `field`, replacing any field with the same name.
    pub(crate) fn set_field(&mut self, name: &str, field: Field) {
        self.fields.retain(|(existing, _)| existing != name);
        self.fields.push((name.to_string(), field));
    }

    fn build(self) -> Object {
        self.fields
            .into_iter()
            .fold(Object::new(self.name), |object, (_, field)| object.field(field))
    }
}

/// Every type of the schema being built.
#[derive(Default)]
pub(crate) struct Registry {
    objects: Vec<ObjectSpec>,
    inputs: Vec<InputObject>,
    names: HashSet<String>,
}

impl Registry {
    /// A registry holding the empty root object type `name`.
    pub(crate) fn with_root(name: &str) -> Self {
        let mut registry = Self::default();
        registry.names.insert(name.to_string());
        registry.objects.push(ObjectSpec::new(name));
        registry
    }

    /// Reserve a type name.
    pub(crate) fn claim(&mut self, name: &str) -> Result<()> {
        if !is_name(name) {
            return Err(ConfigError::GraphQl(format!(
                "'{name}' is not a valid GraphQL type name"
            )));
        }
        if !self.names.insert(name.to_string()) {
            return Err(ConfigError::GraphQl(format!(
                "type '{name}' is defined twice"
            )));
        }
        Ok(())
    }

    /// Add an object type. Its name must not be claimed yet.
    pub(crate) fn add_object(&mut self, spec: ObjectSpec) -> Result<()> {
        self.claim(&spec.name)?;
        self.objects.push(spec);
        Ok(())
    }

    /// Object type under construction, by name.
    pub(crate) fn object_mut(&mut self, name: &str) -> Option<&mut ObjectSpec> {
        self.objects.iter_mut().find(|spec| spec.name == name)
    }

    /// Output shape of `schema`, registering `name` and nested types.
    pub(crate) fn output(&mut self, schema: &Schema, name: &str) -> Result<Shape> {
        Converter::new(self, schema, name, Direction::Output).root(&keep_all)
    }

    /// Input shape of `schema`. Top-level properties failing `keep` are left out.
    pub(crate) fn input(
        &mut self,
        schema: &Schema,
        name: &str,
        keep: &dyn Fn(&str) -> bool,
    ) -> Result<Shape> {
        Converter::new(self, schema, name, Direction::Input).root(keep)
    }

    /// Register every type with `builder`.
    pub(crate) fn register(self, builder: SchemaBuilder) -> SchemaBuilder {
        let builder = builder.register(Scalar::new(JSON_SCALAR));
        let builder = self
            .objects
            .into_iter()
            .fold(builder, |builder, spec| builder.register(spec.build()));
        self.inputs
            .into_iter()
            .fold(builder, |builder, input| builder.register(input))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Output,
    Input,
}

/// Converts one schema document; local `$ref`s resolve against its root.
struct Converter<'r, 's> {
    registry: &'r mut Registry,
    root: &'s Schema,
    base: String,
    direction: Direction,
    refs: HashMap<String, Shape>,
}

fn keep_all(_: &str) -> bool {
    true
}

impl<'r, 's> Converter<'r, 's> {
    fn new(
        registry: &'r mut Registry,
        root: &'s Schema,
        base: &str,
        direction: Direction,
    ) -> Self {
        Self {
            registry,
            root,
            base: base.to_string(),
            direction,
            refs: HashMap::new(),
        }
    }

    fn root(mut self, keep: &dyn Fn(&str) -> bool) -> Result<Shape> {
        // `#` points back at the root
        if becomes_object(self.root, self.root) {
            self.refs
                .insert(String::new(), Shape::Object(self.base.clone()));
        }
        let base = self.base.clone();
        self.convert(self.root, &base, keep)
    }

    fn convert(
        &mut self,
        schema: &'s Schema,
        name: &str,
        keep: &dyn Fn(&str) -> bool,
    ) -> Result<Shape> {
        let Some(obj) = schema.as_object() else {
            return Ok(Shape::Json);
        };
        if obj.reference.is_some() {
            return match obj.local_ref() {
                Some(pointer) => self.reference(pointer),
                None => Ok(Shape::Json),
            };
        }
        match effective_type(obj) {
            Some(InstanceType::Object) => self.object(obj, name, keep),
            Some(InstanceType::Array) => match &obj.items {
                Some(Items::Single(item)) => {
                    let inner = self.convert(item, name, &keep_all)?;
                    Ok(Shape::List(Box::new(inner)))
                }
                _ => Ok(Shape::List(Box::new(Shape::Json))),
            },
            Some(InstanceType::String) => Ok(Shape::Scalar(TypeRef::STRING)),
            Some(InstanceType::Integer) => Ok(Shape::Scalar(TypeRef::INT)),
            Some(InstanceType::Number) => Ok(Shape::Scalar(TypeRef::FLOAT)),
            Some(InstanceType::Boolean) => Ok(Shape::Scalar(TypeRef::BOOLEAN)),
            Some(InstanceType::Null) | None => Ok(Shape::Json),
        }
    }

    fn object(
        &mut self,
        obj: &'s SchemaObject,
        name: &str,
        keep: &dyn Fn(&str) -> bool,
    ) -> Result<Shape> {
        let properties: Vec<(&'s String, &'s Schema)> = obj
            .properties
            .iter()
            .filter(|(prop, _)| is_name(prop.as_str()) && keep(prop.as_str()))
            .collect();
        if properties.is_empty() {
            return Ok(Shape::Json);
        }
        self.registry.claim(name)?;

        let mut fields = Vec::with_capacity(properties.len());
        for (prop, schema) in properties {
            let nested = format!("{name}{}", upper_camel(prop));
            fields.push((prop.as_str(), self.convert(schema, &nested, &keep_all)?));
        }

        match self.direction {
            Direction::Output => {
                let mut spec = ObjectSpec::new(name);
                for (prop, shape) in fields {
                    spec.set_field(prop, property_field(prop, shape));
                }
                self.registry.objects.push(spec);
            }
            Direction::Input => {
                let input = fields
                    .into_iter()
                    .fold(InputObject::new(name), |input, (prop, shape)| {
                        input.field(InputValue::new(prop, shape.type_ref()))
                    });
                self.registry.inputs.push(input);
            }
        }
        Ok(Shape::Object(name.to_string()))
    }

    fn reference(&mut self, pointer: &str) -> Result<Shape> {
        if let Some(shape) = self.refs.get(pointer) {
            return Ok(shape.clone());
        }
        let Some(target) = self
            .root
            .pointer(pointer)
            .and_then(|target| target.resolve(self.root))
        else {
            return Ok(Shape::Json);
        };

        let name = match pointer.rsplit('/').next() {
            Some(segment) if !segment.is_empty() => {
                format!("{}{}", self.base, upper_camel(&unescape_segment(segment)))
            }
            _ => self.base.clone(),
        };
        // Seed the cache so reference cycles terminate.
        let placeholder = if becomes_object(target, self.root) {
            Shape::Object(name.clone())
        } else {
            Shape::Json
        };
        self.refs.insert(pointer.to_string(), placeholder);

        let shape = self.convert(target, &name, &keep_all)?;
        self.refs.insert(pointer.to_string(), shape.clone());
        Ok(shape)
    }
}

/// The declared type once a single `null` alternative is dropped.
fn effective_type(obj: &SchemaObject) -> Option<InstanceType> {
    let types = obj.instance_type.as_ref()?.types();
    let mut non_null = types.iter().filter(|t| **t != InstanceType::Null);
    match (non_null.next(), non_null.next()) {
        (Some(t), None) => Some(*t),
        (None, None) if !types.is_empty() => Some(InstanceType::Null),
        _ => None,
    }
}

/// Whether converting `schema` registers an object type.
fn becomes_object(schema: &Schema, root: &Schema) -> bool {
    schema
        .resolve(root)
        .and_then(Schema::as_object)
        .is_some_and(|obj| {
            effective_type(obj) == Some(InstanceType::Object)
                && obj.properties.keys().any(|prop| is_name(prop))
        })
}

/// Field resolving `name` from a parent `serde_json::Value`.
pub(crate) fn property_field(name: &str, shape: Shape) -> Field {
    let key = name.to_string();
    Field::new(name, shape.type_ref(), move |ctx| {
        let value = ctx
            .parent_value
            .try_downcast_ref::<Value>()
            .ok()
            .and_then(|parent| parent.get(&key))
            .and_then(|value| shape.field_value(value));
        FieldFuture::new(async move { Ok(value) })
    })
}
