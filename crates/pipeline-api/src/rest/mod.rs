//! REST transport: one axum router per registered resource, the root HAL
//! index and the `api.json` document endpoint.
//!
//! Routes of a resource `tests`:
//!
//! | Route           | Methods                                    |
//! |-----------------|--------------------------------------------|
//! | `/tests`        | `GET`, `POST`, conditionally `PATCH`/`DELETE` |
//! | `/tests/{id}`   | `GET`, `PUT`, `PATCH`, `DELETE`            |
//!
//! Only operations the pipeline offers are routed. Collection-level `PATCH`
//! and `DELETE` exist only when the operation's query schema leaves room for
//! more than one `id` (see [`exposes_collection_route`]).
//!
//! Paths are absolute: every router here already carries the base path.

mod hal;
mod handlers;
mod pass_through;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, MethodRouter};
use axum::{Json, Router};
use pipeline_api_core::{exposes_collection_route, Operation};
use serde_json::{json, Map, Value};

use crate::host::Resource;
use crate::runtime::{HAL_MEDIA_TYPE, JSON_MEDIA_TYPE};

/// Routes of one resource. Requests without an acceptable `Accept` header
/// go to `next`.
pub(crate) fn resource_router(resource: Arc<Resource>, next: Router) -> Router {
    let schemas = resource.pipeline.schemas();
    let mut collection: MethodRouter<Arc<Resource>> = MethodRouter::new();
    let mut item: MethodRouter<Arc<Resource>> = MethodRouter::new();
    let mut routed_collection = false;
    let mut routed_item = false;

    for op in schemas.available() {
        match op {
            Operation::Read => {
                collection = collection.get(handlers::read_collection);
                item = item.get(handlers::read_item);
                routed_collection = true;
                routed_item = true;
            }
            Operation::Create => {
                collection = collection.post(handlers::create);
                routed_collection = true;
            }
            Operation::Replace => {
                item = item.put(handlers::replace);
                routed_item = true;
            }
            Operation::Patch => {
                item = item.patch(handlers::patch_item);
                routed_item = true;
                if exposes_collection_route(schemas.patch.query.as_ref()) {
                    collection = collection.patch(handlers::patch_collection);
                    routed_collection = true;
                }
            }
            Operation::Delete => {
                item = item.delete(handlers::delete_item);
                routed_item = true;
                if exposes_collection_route(schemas.delete.query.as_ref()) {
                    collection = collection.delete(handlers::delete_collection);
                    routed_collection = true;
                }
            }
        }
    }

    let path = resource.endpoint();
    let mut router = Router::new();
    if routed_collection {
        router = router
            .route(&path, collection.clone())
            .route(&format!("{path}/"), collection);
    }
    if routed_item {
        router = router.route(&format!("{path}/{{id}}"), item);
    }
    tracing::debug!(
        resource = %resource.name,
        path = %path,
        operations = ?schemas.available().collect::<Vec<_>>(),
        "routes registered"
    );
    router
        .route_layer(middleware::from_fn_with_state(next, pass_through::negotiated))
        .with_state(resource)
}

/// HAL index of every resource, served at the base path.
///
/// Only answers requests sent with `Content-Type: application/hal+json`;
/// anything else goes to `next`.
pub(crate) fn root_router(base_path: &str, resources: &[Arc<Resource>], next: Router) -> Router {
    let root = if base_path.is_empty() { "/" } else { base_path };
    let mut links = Map::new();
    links.insert("self".to_string(), json!({ "href": root }));
    for resource in resources {
        links.insert(resource.plural.clone(), json!({ "href": resource.endpoint() }));
    }
    let index = Arc::new(json!({ "_links": links }));
    Router::new()
        .route(root, get(serve_root))
        .route_layer(middleware::from_fn_with_state(next, pass_through::hal_only))
        .with_state(index)
}

async fn serve_root(State(index): State<Arc<Value>>) -> Response {
    (
        [(header::CONTENT_TYPE, HAL_MEDIA_TYPE)],
        Json(index.as_ref().clone()),
    )
        .into_response()
}

/// `GET {base}/api.json`, the OpenAPI document serialized once at build time.
pub(crate) fn document_router(base_path: &str, document: Bytes) -> Router {
    Router::new()
        .route(&format!("{base_path}/api.json"), get(serve_document))
        .with_state(document)
}

async fn serve_document(State(document): State<Bytes>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, JSON_MEDIA_TYPE)], document)
}
