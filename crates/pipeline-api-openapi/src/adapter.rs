//! JSON Schema → `OpenAPI` 3.0 schema conversion.
//!
//! `OpenAPI` 3.0 schemas are a dialect of JSON Schema: no type arrays (a
//! `nullable` flag instead), no `const`, no `patternProperties` and no
//! `dependencies`. [`to_openapi_schema`] rewrites a tree into that dialect,
//! dropping what cannot be expressed. [`flatten`] then lifts nested
//! `definitions` into top-level components so every `$ref` points at
//! `#/components/schemas/{Name}`.

use std::collections::HashSet;

use pipeline_api_core::{escape_segment, walk, Schema, SchemaMap, SchemaObject, SchemaType};

use crate::document::COMPONENTS_PREFIX;
use crate::error::{Error, Result};
use crate::helpers::upper_first;

/// Rewrite `schema` into the `OpenAPI` 3.0 dialect.
///
/// At every node:
///
/// - `$id`, `$schema`, `dependencies` and `patternProperties` are dropped
/// - `type: []` is dropped, `type: [T]` becomes `type: T`
/// - `type: [T, "null"]` becomes `type: T` with `nullable: true`
/// - any other multi-type list is dropped (documented loss, not an error)
/// - `type: "null"` is dropped and `nullable: true` set
/// - `const: v` becomes `enum: [v]`
#[must_use]
pub fn to_openapi_schema(schema: &Schema) -> Schema {
    let mut schema = schema.clone();
    walk(&mut schema, &mut adapt_node);
    schema
}

fn adapt_node(node: &mut SchemaObject) {
    use pipeline_api_core::InstanceType::Null;

    node.id = None;
    node.meta_schema = None;
    node.dependencies = None;
    node.pattern_properties = None;

    if let Some(SchemaType::Multiple(types)) = &node.instance_type {
        node.instance_type = match types.as_slice() {
            [single] => Some(SchemaType::Single(*single)),
            [a, b] if *a == Null || *b == Null => {
                node.nullable = Some(true);
                Some(SchemaType::Single(if *a == Null { *b } else { *a }))
            }
            _ => None,
        };
    }
    if node.instance_type == Some(SchemaType::Single(Null)) {
        node.instance_type = None;
        node.nullable = Some(true);
    }
    if let Some(value) = node.const_value.take() {
        node.enum_values = Some(vec![value]);
    }
}

/// Rebase every local `$ref` of `schema` onto `base`.
///
/// `#/definitions/x` under base `#/components/schemas/Test` becomes
/// `#/components/schemas/Test/definitions/x`; a bare `#` becomes `base`.
#[must_use]
pub fn remap_refs(schema: Schema, base: &str) -> Schema {
    let mut schema = schema;
    walk(&mut schema, &mut |node| {
        if let Some(pointer) = node.local_ref() {
            node.reference = Some(format!("{base}{pointer}"));
        }
    });
    schema
}

/// Lift every nested `definitions` entry to a top-level schema.
///
/// A sub-schema `sub` of `Parent` moves to `Parent` + `UpperFirst(sub)`, and
/// every pointer to it (or into it) is rewritten across all schemas. Passes
/// repeat until nothing moves, since moved schemas may carry their own
/// `definitions`. Running it on its own output is a no-op.
///
/// # Errors
///
/// [`Error::FlattenCollision`] when a synthesized name is already taken or
/// two definitions synthesize the same name. `schemas` is left partially
/// flattened in that case.
pub fn flatten(schemas: &mut SchemaMap) -> Result<()> {
    loop {
        let mut moves: Vec<(String, String, Schema)> = Vec::new();
        for (name, schema) in schemas.iter_mut() {
            let Some(obj) = schema.as_object_mut() else {
                continue;
            };
            for (sub, sub_schema) in std::mem::take(&mut obj.definitions) {
                let pointer = format!(
                    "{COMPONENTS_PREFIX}{}/definitions/{}",
                    escape_segment(name),
                    escape_segment(&sub)
                );
                moves.push((format!("{name}{}", upper_first(&sub)), pointer, sub_schema));
            }
        }
        if moves.is_empty() {
            return Ok(());
        }

        let mut seen = HashSet::new();
        for (new_name, pointer, _) in &moves {
            if schemas.contains_key(new_name) || !seen.insert(new_name.as_str()) {
                return Err(Error::FlattenCollision {
                    name: new_name.clone(),
                    source_pointer: pointer.clone(),
                });
            }
        }

        let renames: Vec<(String, String)> = moves
            .iter()
            .map(|(new_name, pointer, _)| {
                (
                    pointer.clone(),
                    format!("{COMPONENTS_PREFIX}{}", escape_segment(new_name)),
                )
            })
            .collect();

        tracing::debug!(count = moves.len(), "flattening nested definitions");
        for (new_name, _, sub_schema) in moves {
            schemas.insert(new_name, sub_schema);
        }
        for schema in schemas.values_mut() {
            rewrite_refs(schema, &renames);
        }
    }
}

/// Apply `old → new` pointer renames, for exact and prefixed matches.
fn rewrite_refs(schema: &mut Schema, renames: &[(String, String)]) {
    walk(schema, &mut |node| {
        let Some(reference) = node.reference.as_deref() else {
            return;
        };
        for (old, new) in renames {
            if reference == old {
                node.reference = Some(new.clone());
                return;
            }
            if let Some(rest) = reference.strip_prefix(old.as_str()) {
                if rest.starts_with('/') {
                    node.reference = Some(format!("{new}{rest}"));
                    return;
                }
            }
        }
    });
}
