//! Recursive traversal over a schema tree.
//!
//! [`walk`] visits every reachable object node exactly once, parent before
//! children. Boolean nodes are never visited. `$ref` pointers are not followed,
//! so reference cycles cannot cause a loop.

use crate::schema::{Items, Schema, SchemaObject};

/// Apply `visit` to every object node reachable from `schema`, pre-order.
///
/// Children are read after `visit` returns, so a visitor that deletes a key
/// (e.g. `definitions`) also prunes the traversal below it.
pub fn walk<F>(schema: &mut Schema, visit: &mut F)
where
    F: FnMut(&mut SchemaObject),
{
    let Schema::Object(obj) = schema else {
        return;
    };
    visit(obj);

    for child in obj.properties.values_mut() {
        walk(child, visit);
    }
    for child in obj.definitions.values_mut() {
        walk(child, visit);
    }
    for list in [&mut obj.one_of, &mut obj.all_of, &mut obj.any_of]
        .into_iter()
        .flatten()
    {
        for child in list {
            walk(child, visit);
        }
    }
    match &mut obj.items {
        Some(Items::Single(item)) => walk(item, visit),
        Some(Items::Tuple(items)) => {
            for item in items {
                walk(item, visit);
            }
        }
        None => {}
    }
    if let Some(not) = &mut obj.not {
        walk(not, visit);
    }
    if let Some(additional) = &mut obj.additional_properties {
        walk(additional, visit);
    }
}

/// Read-only counterpart of [`walk`].
pub fn walk_ref<'a, F>(schema: &'a Schema, visit: &mut F)
where
    F: FnMut(&'a SchemaObject),
{
    let Schema::Object(obj) = schema else {
        return;
    };
    visit(obj);

    obj.properties
        .values()
        .chain(obj.definitions.values())
        .chain(obj.one_of.iter().flatten())
        .chain(obj.all_of.iter().flatten())
        .chain(obj.any_of.iter().flatten())
        .for_each(|child| walk_ref(child, visit));

    match &obj.items {
        Some(Items::Single(item)) => walk_ref(item, visit),
        Some(Items::Tuple(items)) => items.iter().for_each(|item| walk_ref(item, visit)),
        None => {}
    }
    if let Some(not) = &obj.not {
        walk_ref(not, visit);
    }
    if let Some(additional) = &obj.additional_properties {
        walk_ref(additional, visit);
    }
}
