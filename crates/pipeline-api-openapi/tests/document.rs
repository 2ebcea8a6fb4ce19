//! End-to-end document generation from YAML manifests.
//!
//! Each test builds a manifest, renders the full document and checks the
//! parts a client generator would rely on.

use indoc::indoc;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use pipeline_api_openapi::{DocumentConfig, Error, ResourceManifest};

const LIBRARY: &str = indoc! {r##"
    resources:
      - name: book
        model:
          type: object
          properties:
            id: { type: string }
            title: { type: string }
            author: { $ref: "#/definitions/author" }
            rating: { type: [integer, "null"] }
          required: [id, title]
          definitions:
            author:
              type: object
              properties:
                name: { type: string }
        context:
          type: object
          properties:
            _session: { type: string }
            lang: { type: string }
        create:
          values:
            type: object
            properties:
              title: { type: string }
            required: [title]
        read:
          query:
            type: object
            properties:
              id: { type: string }
              title: { type: string }
              tags: { type: array, items: { type: string } }
          meta:
            type: object
            properties:
              total: { type: integer }
        patch:
          query:
            type: object
            properties:
              id: { type: string }
            required: [id]
          values:
            type: object
            properties:
              title: { type: string }
        delete:
          query:
            type: object
            properties:
              id: { type: [string, array] }
      - name: person
        plural: people
        model:
          type: object
          properties:
            id: { type: string }
        read:
          query: { type: object, properties: { id: { type: string } } }
"##};

fn library_document() -> Value {
    let manifest = ResourceManifest::from_yaml(LIBRARY).unwrap();
    let config = DocumentConfig::default().title("Library").base_path("/api");
    manifest.document(&config).unwrap().to_json().unwrap()
}

fn operation_ids(doc: &Value) -> Vec<String> {
    let mut ids = Vec::new();
    for item in doc["paths"].as_object().unwrap().values() {
        for op in item.as_object().unwrap().values() {
            ids.push(op["operationId"].as_str().unwrap().to_string());
        }
    }
    ids
}

#[test]
fn paths_and_operation_ids() {
    let doc = library_document();
    let paths: Vec<_> = doc["paths"].as_object().unwrap().keys().cloned().collect();
    assert_eq!(paths, vec!["/books", "/books/{id}", "/people", "/people/{id}"]);
    assert_eq!(
        operation_ids(&doc),
        vec![
            "findBooks",
            "addBook",
            "deleteBooks",
            "getBookById",
            "patchBook",
            "deleteBook",
            "findPeople",
            "getPersonById",
        ]
    );
}

#[test]
fn header_and_servers() {
    let doc = library_document();
    assert_eq!(doc["openapi"], "3.0.0");
    assert_eq!(doc["info"]["title"], "Library");
    assert_eq!(doc["servers"], json!([{ "url": "/api" }]));
}

#[test]
fn components_are_adapted_and_flattened() {
    let doc = library_document();
    let schemas = doc["components"]["schemas"].as_object().unwrap();
    let names: Vec<_> = schemas.keys().cloned().collect();
    assert_eq!(
        names,
        vec![
            "Error",
            "Book",
            "BookCreateValues",
            "BookReadMeta",
            "BookPatchValues",
            "BookAuthor",
            "Person",
        ]
    );

    let book = &schemas["Book"];
    assert_eq!(book["title"], "Book");
    assert!(book.get("definitions").is_none());
    assert_eq!(
        book["properties"]["author"]["$ref"],
        "#/components/schemas/BookAuthor"
    );
    assert_eq!(
        book["properties"]["rating"],
        json!({ "type": "integer", "nullable": true })
    );
}

#[test]
fn find_parameters_hide_internal_context() {
    let doc = library_document();
    let find = &doc["paths"]["/books"]["get"];
    let params: Vec<_> = find["parameters"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| (p["name"].as_str().unwrap(), p.get("style").cloned()))
        .collect();
    assert_eq!(
        params,
        vec![
            ("id", None),
            ("title", None),
            ("tags", Some(json!("form"))),
            ("lang", None),
        ]
    );
    assert_eq!(
        find["responses"]["200"]["content"]["application/json"]["schema"]["properties"]["meta"]
            ["$ref"],
        "#/components/schemas/BookReadMeta"
    );
}

#[test]
fn every_component_ref_resolves() {
    let doc = library_document();
    let text = doc.to_string();
    let schemas = doc["components"]["schemas"].as_object().unwrap();
    for part in text.split("\"#/components/schemas/").skip(1) {
        let name = part.split(['"', '/']).next().unwrap();
        assert!(schemas.contains_key(name), "dangling ref to {name}");
    }
}

#[test]
fn yaml_rendering_round_trips() {
    let manifest = ResourceManifest::from_yaml(LIBRARY).unwrap();
    let doc = manifest.document(&DocumentConfig::default()).unwrap();
    let yaml = doc.to_yaml().unwrap();
    let parsed: Value = serde_yaml_ng::from_str(&yaml).unwrap();
    assert_eq!(parsed, doc.to_json().unwrap());
}

#[test]
fn colliding_resources_are_rejected() {
    let manifest = ResourceManifest::from_yaml(indoc! {"
        resources:
          - name: blog-post
            read: { query: { type: object } }
          - name: blog_post
            plural: blog_posts_v2
            read: { query: { type: object } }
    "})
    .unwrap();
    let err = manifest.document(&DocumentConfig::default()).unwrap_err();
    assert!(
        matches!(err, Error::SchemaNameCollision { ref name } if name == "BlogPost"),
        "{err}"
    );
}
