//! Projection of object schemas onto query parameters.

use std::collections::HashSet;

use pipeline_api_core::{walk, InstanceType, Schema, SchemaKind, SchemaObject};

use crate::document::{
    OpenApiDocument, Parameter, ParameterLocation, ParameterStyle, COMPONENTS_PREFIX,
};

/// Maximum `$ref` hops followed while projecting one schema.
const MAX_DEPTH: usize = 16;

/// Maximum references inlined into one parameter schema.
const MAX_INLINED: usize = 32;

/// Project `schema` onto query parameters.
///
/// A local reference is resolved and projected in its place:
/// `#/components/schemas/...` pointers against `doc`, any other `#/...`
/// pointer against `schema` itself. An object schema yields one parameter per
/// property whose (resolved) schema declares a `type`; object-typed
/// properties use the `deepObject` style and array-typed ones `form`. Members
/// of `oneOf` / `anyOf` / `allOf` are projected recursively and appended.
/// Anything else yields no parameters.
///
/// The output may contain duplicates; see [`dedupe`].
#[must_use]
pub fn to_parameters(schema: &Schema, doc: &OpenApiDocument) -> Vec<Parameter> {
    let mut out = Vec::new();
    project(schema, schema, doc, 0, &mut out);
    out
}

fn resolve<'a>(
    schema: &'a Schema,
    root: &'a Schema,
    doc: &'a OpenApiDocument,
) -> Option<&'a Schema> {
    let mut current = schema;
    for _ in 0..MAX_DEPTH {
        let Some(reference) = current.as_object().and_then(|o| o.reference.as_deref()) else {
            return Some(current);
        };
        current = if reference.starts_with(COMPONENTS_PREFIX) {
            doc.resolve_ref(reference)?
        } else {
            root.pointer(reference.strip_prefix('#')?)?
        };
    }
    None
}

/// Whether the node is an object shape: `type: object`, or untyped with properties.
fn is_object(obj: &SchemaObject) -> bool {
    match obj.kind() {
        SchemaKind::Object => true,
        SchemaKind::Composite | SchemaKind::Untyped => !obj.properties.is_empty(),
        _ => false,
    }
}

fn project(
    schema: &Schema,
    root: &Schema,
    doc: &OpenApiDocument,
    depth: usize,
    out: &mut Vec<Parameter>,
) {
    if depth > MAX_DEPTH {
        return;
    }
    let Some(obj) = resolve(schema, root, doc).and_then(Schema::as_object) else {
        return;
    };

    if is_object(obj) {
        for (name, property) in &obj.properties {
            let Some(resolved) = resolve(property, root, doc) else {
                continue;
            };
            let Some(prop) = resolved.as_object() else {
                continue;
            };
            if prop.instance_type.is_none() {
                continue;
            }
            let style = match prop.single_type() {
                Some(InstanceType::Object) => Some(ParameterStyle::DeepObject),
                Some(InstanceType::Array) => Some(ParameterStyle::Form),
                _ => None,
            };
            out.push(Parameter {
                name: name.clone(),
                location: ParameterLocation::Query,
                description: prop.description.clone(),
                required: obj.is_required(name),
                schema: inline_refs(resolved, root),
                style,
            });
        }
    }

    for member in obj.composition() {
        project(member, root, doc, depth + 1, out);
    }
}

/// Replace nested local references of a parameter schema by their targets.
///
/// Parameter schemas are copied out of their source, so pointers relative to
/// that source would dangle. Component pointers stay as they are. Recursive
/// shapes are unrolled at most [`MAX_INLINED`] times.
fn inline_refs(schema: &Schema, root: &Schema) -> Schema {
    let mut out = schema.clone();
    let mut budget = MAX_INLINED;
    walk(&mut out, &mut |node| {
        if budget == 0 {
            return;
        }
        let Some(pointer) = node.local_ref() else {
            return;
        };
        if pointer.starts_with("/components/schemas/") {
            return;
        }
        if let Some(Schema::Object(target)) = root.pointer(pointer) {
            *node = (**target).clone();
            budget -= 1;
        }
    });
    out
}

/// Keep only the first parameter of each name, preserving order.
#[must_use]
pub fn dedupe(parameters: Vec<Parameter>) -> Vec<Parameter> {
    let mut seen = HashSet::new();
    parameters
        .into_iter()
        .filter(|p| seen.insert(p.name.clone()))
        .collect()
}

/// Move the parameters listed in `names` to the path.
#[must_use]
pub fn path_parameters(parameters: Vec<Parameter>, names: &[&str]) -> Vec<Parameter> {
    parameters
        .into_iter()
        .map(|mut p| {
            if names.contains(&p.name.as_str()) {
                p.location = ParameterLocation::Path;
                p.required = true;
            }
            p
        })
        .collect()
}
