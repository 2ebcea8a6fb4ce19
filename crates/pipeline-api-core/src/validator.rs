//! Request payload validation.
//!
//! [`JsonSchemaValidator`] prepares a raw value in three steps before it
//! reaches a pipeline:
//!
//! 1. **coerce** declared scalar types (`"42"` → `42`, `"true"` → `true`,
//!    scalar → one-element array, one-element array → scalar),
//! 2. **strip** object keys the schema does not declare,
//! 3. **validate** the result (JSON Schema draft 7).
//!
//! Query strings carry every value as text, so step 1 is what makes
//! `?value=42` usable against `{ "type": "number" }`.

use std::fmt;

use serde_json::{json, Map, Number, Value};

use crate::error::{PipelineError, SchemaError};
use crate::schema::{InstanceType, Items, Schema, SchemaObject};

/// Validates, coerces and strips a raw value against a schema.
pub trait SchemaValidator: Send + Sync + fmt::Debug {
    /// Return the coerced, stripped value or a validation error.
    ///
    /// # Errors
    ///
    /// A [`Validation`](crate::ErrorKind::Validation) error whose `info.errors`
    /// lists every violation as `{ path, message }`.
    fn validate(&self, value: Value) -> Result<Value, PipelineError>;
}

/// Default [`SchemaValidator`] backed by the `jsonschema` crate.
pub struct JsonSchemaValidator {
    schema: Schema,
    compiled: jsonschema::Validator,
}

impl fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaValidator")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl JsonSchemaValidator {
    /// Compile `schema`.
    ///
    /// # Errors
    ///
    /// [`SchemaError::Compile`] when the schema is not valid draft 7.
    pub fn new(schema: &Schema) -> Result<Self, SchemaError> {
        let compiled = jsonschema::options()
            .with_draft(jsonschema::Draft::Draft7)
            .build(&schema.to_json())
            .map_err(|e| SchemaError::Compile(e.to_string()))?;
        Ok(Self {
            schema: schema.clone(),
            compiled,
        })
    }

    /// The source schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, value: Value) -> Result<Value, PipelineError> {
        let mut value = coerce(value, &self.schema, &self.schema);
        strip(&mut value, &self.schema, &self.schema);

        let errors: Vec<Value> = self
            .compiled
            .iter_errors(&value)
            .map(|e| json!({ "path": e.instance_path.to_string(), "message": e.to_string() }))
            .collect();

        if errors.is_empty() {
            return Ok(value);
        }

        let summary = errors
            .iter()
            .map(|e| {
                let path = e["path"].as_str().unwrap_or_default();
                let message = e["message"].as_str().unwrap_or_default();
                if path.is_empty() {
                    message.to_string()
                } else {
                    format!("{path}: {message}")
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        Err(PipelineError::validation(format!("Invalid parameters: {summary}"))
            .with_info("errors", Value::Array(errors)))
    }
}

/// Coerce `value` toward the types declared by `schema`.
///
/// Values that already match are returned unchanged (apart from their
/// children). Values that cannot be coerced are also returned unchanged so
/// validation reports them.
#[must_use]
pub fn coerce(value: Value, schema: &Schema, root: &Schema) -> Value {
    let Some(obj) = schema.resolve(root).and_then(Schema::as_object) else {
        return value;
    };

    let mut value = value;
    if let Some(types) = obj.instance_type.as_ref().map(|t| t.types().to_vec()) {
        if !types.iter().any(|t| t.matches(&value)) {
            if let Some(coerced) = types.iter().find_map(|t| coerce_scalar(&value, *t)) {
                value = coerced;
            }
        }
    }

    if let Some(members) = obj.all_of.as_ref() {
        for member in members {
            value = coerce(value, member, root);
        }
    }
    for members in [&obj.one_of, &obj.any_of].into_iter().flatten() {
        value = coerce_alternatives(value, members, root);
    }

    match value {
        Value::Object(map) => Value::Object(coerce_properties(map, obj, root)),
        Value::Array(items) => Value::Array(coerce_items(items, obj, root)),
        other => other,
    }
}

fn coerce_properties(map: Map<String, Value>, obj: &SchemaObject, root: &Schema) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, child)| {
            let child = match obj.properties.get(&key) {
                Some(child_schema) => coerce(child, child_schema, root),
                None => match obj.additional_properties.as_deref() {
                    Some(extra @ Schema::Object(_)) => coerce(child, extra, root),
                    _ => child,
                },
            };
            (key, child)
        })
        .collect()
}

fn coerce_items(items: Vec<Value>, obj: &SchemaObject, root: &Schema) -> Vec<Value> {
    match &obj.items {
        Some(Items::Single(item)) => items.into_iter().map(|v| coerce(v, item, root)).collect(),
        Some(Items::Tuple(schemas)) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| match schemas.get(i) {
                Some(s) => coerce(v, s, root),
                None => v,
            })
            .collect(),
        None => items,
    }
}

/// Pick the first alternative whose declared type already accepts `value`,
/// else the first one that can coerce it.
fn coerce_alternatives(value: Value, members: &[Schema], root: &Schema) -> Value {
    let accepts = |member: &Schema, v: &Value| {
        member
            .resolve(root)
            .and_then(Schema::as_object)
            .is_some_and(|obj| {
                obj.instance_type
                    .as_ref()
                    .is_none_or(|t| t.types().iter().any(|t| t.matches(v)))
            })
    };

    if let Some(member) = members.iter().find(|m| accepts(m, &value)) {
        return coerce(value, member, root);
    }
    for member in members {
        let candidate = coerce(value.clone(), member, root);
        if accepts(member, &candidate) {
            return candidate;
        }
    }
    value
}

fn coerce_scalar(value: &Value, target: InstanceType) -> Option<Value> {
    match (target, value) {
        (InstanceType::Array, Value::Array(_)) => None,
        (InstanceType::Array, scalar) => Some(Value::Array(vec![scalar.clone()])),
        (_, Value::Array(items)) if items.len() == 1 => coerce_scalar(&items[0], target)
            .or_else(|| target.matches(&items[0]).then(|| items[0].clone())),
        (InstanceType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|_| !s.trim().is_empty())
            .and_then(number_value),
        (InstanceType::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
            Ok(i) => Some(Value::from(i)),
            Err(_) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.fract() == 0.0)
                .and_then(number_value),
        },
        (InstanceType::Number | InstanceType::Integer, Value::Bool(b)) => Some(Value::from(u8::from(*b))),
        (InstanceType::Number | InstanceType::Integer, Value::Null) => Some(Value::from(0)),
        (InstanceType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (InstanceType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (InstanceType::String, Value::Null) => Some(Value::String(String::new())),
        (InstanceType::Boolean, Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (InstanceType::Boolean, Value::Number(n)) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(Value::Bool(true)),
            Some(f) if f == 0.0 => Some(Value::Bool(false)),
            _ => None,
        },
        (InstanceType::Boolean, Value::Null) => Some(Value::Bool(false)),
        (InstanceType::Null, Value::String(s)) if s.is_empty() => Some(Value::Null),
        (InstanceType::Null, Value::Bool(false)) => Some(Value::Null),
        (InstanceType::Null, Value::Number(n)) if n.as_f64() == Some(0.0) => Some(Value::Null),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_value(f: f64) -> Option<Value> {
    if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
        return Some(Value::from(f as i64));
    }
    Number::from_f64(f).map(Value::Number)
}

/// Remove object keys `schema` does not declare.
///
/// Declared keys are the `properties` of the node and of every member of its
/// `oneOf` / `anyOf` / `allOf`. Nodes with a schema-valued or `true`
/// `additionalProperties`, or with `patternProperties`, keep everything.
pub fn strip(value: &mut Value, schema: &Schema, root: &Schema) {
    let Some(obj) = schema.resolve(root).and_then(Schema::as_object) else {
        return;
    };

    match value {
        Value::Object(map) => {
            let open = obj.pattern_properties.is_some()
                || matches!(
                    obj.additional_properties.as_deref(),
                    Some(Schema::Bool(true) | Schema::Object(_))
                );
            if !open && declares_properties(obj, root) {
                map.retain(|key, _| is_declared(obj, key, root));
            }
            for (key, child) in map.iter_mut() {
                if let Some(child_schema) = obj.properties.get(key) {
                    strip(child, child_schema, root);
                } else if let Some(extra @ Schema::Object(_)) = obj.additional_properties.as_deref() {
                    strip(child, extra, root);
                }
            }
        }
        Value::Array(items) => match &obj.items {
            Some(Items::Single(item)) => items.iter_mut().for_each(|v| strip(v, item, root)),
            Some(Items::Tuple(schemas)) => items
                .iter_mut()
                .zip(schemas)
                .for_each(|(v, s)| strip(v, s, root)),
            None => {}
        },
        _ => {}
    }
}

/// Whether the node (or a composition member) says anything about object keys.
///
/// Untyped, property-less schemas such as `{}` accept any object untouched.
fn declares_properties(obj: &SchemaObject, root: &Schema) -> bool {
    !obj.properties.is_empty()
        || obj.additional_properties.is_some()
        || obj.composition().any(|member| {
            member
                .resolve(root)
                .and_then(Schema::as_object)
                .is_some_and(|m| declares_properties(m, root))
        })
}

fn is_declared(obj: &SchemaObject, key: &str, root: &Schema) -> bool {
    obj.properties.contains_key(key)
        || obj.composition().any(|member| {
            member
                .resolve(root)
                .and_then(Schema::as_object)
                .is_some_and(|m| is_declared(m, key, root))
        })
}
