//! Shared builders for document fragments and names.

use indexmap::IndexMap;

use pipeline_api_core::{InstanceType, Items, Schema, SchemaObject, SchemaType};

use crate::document::{MediaType, Response, COMPONENTS_PREFIX, ERROR_SCHEMA};

/// Media type of every request and response body.
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// `#/components/schemas/{name}`.
#[must_use]
pub fn component_ref(name: &str) -> String {
    format!("{COMPONENTS_PREFIX}{name}")
}

/// Uppercase the first character, keep the rest.
#[must_use]
pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `UpperCamel` form of a resource or role name.
///
/// Words are split on any non-alphanumeric character; inner capitals are
/// kept, so `"blog-post"`, `"blog_post"` and `"blogPost"` all give `"BlogPost"`.
#[must_use]
pub fn upper_camel(s: &str) -> String {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(upper_first)
        .collect()
}

/// Build `content` for `application/json` with the given schema.
#[must_use]
pub fn json_content(schema: Schema) -> IndexMap<String, MediaType> {
    let mut content = IndexMap::new();
    content.insert(JSON_MEDIA_TYPE.to_string(), MediaType { schema });
    content
}

/// Build a response with description and `application/json` schema.
#[must_use]
pub fn json_response(description: &str, schema: Schema) -> Response {
    Response {
        description: description.to_string(),
        content: json_content(schema),
    }
}

/// Build an error response pointing at the shared `Error` schema.
#[must_use]
pub fn error_response(description: &str) -> Response {
    json_response(description, Schema::reference(component_ref(ERROR_SCHEMA)))
}

/// `{ type: array, items: <items> }`.
#[must_use]
pub fn array_of(items: Schema) -> Schema {
    Schema::object(SchemaObject {
        instance_type: Some(SchemaType::Single(InstanceType::Array)),
        items: Some(Items::Single(Box::new(items))),
        ..SchemaObject::default()
    })
}

/// Result envelope: `{ data: [<model>], meta?: <meta> }`.
#[must_use]
pub fn result_page_schema(model: &str, meta: Option<&str>) -> Schema {
    let mut obj = SchemaObject {
        instance_type: Some(SchemaType::Single(InstanceType::Object)),
        ..SchemaObject::default()
    };
    obj.properties.insert(
        "data".to_string(),
        array_of(Schema::reference(component_ref(model))),
    );
    if let Some(meta) = meta {
        obj.properties
            .insert("meta".to_string(), Schema::reference(component_ref(meta)));
    }
    Schema::object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn camel_casing() {
        assert_eq!(upper_first("tests"), "Tests");
        assert_eq!(upper_first(""), "");
        assert_eq!(upper_camel("blog-post"), "BlogPost");
        assert_eq!(upper_camel("blog_post"), "BlogPost");
        assert_eq!(upper_camel("blogPost"), "BlogPost");
        assert_eq!(upper_camel("ümlaut"), "Ümlaut");
    }

    #[test]
    fn result_page_with_and_without_meta() {
        assert_eq!(
            result_page_schema("Test", Some("TestReadMeta")).to_json(),
            json!({
                "type": "object",
                "properties": {
                    "data": { "type": "array", "items": { "$ref": "#/components/schemas/Test" } },
                    "meta": { "$ref": "#/components/schemas/TestReadMeta" }
                }
            })
        );
        let bare = result_page_schema("Test", None).to_json();
        assert!(bare["properties"].get("meta").is_none());
    }

    #[test]
    fn error_response_refs_error_schema() {
        let response = serde_json::to_value(error_response("Bad request")).unwrap();
        assert_eq!(
            response,
            json!({
                "description": "Bad request",
                "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Error" } } }
            })
        );
    }
}
