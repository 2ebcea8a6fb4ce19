//! REST routes driven in-process through the axum router.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use http::{header, Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};

use common::{api, builder, get, send, with_json};
use pipeline_api::{ApiConfig, RequestInfo, HAL_MEDIA_TYPE};

#[tokio::test]
async fn query_values_are_coerced() {
    let router = api().router();
    let reply = send(&router, get("/api/tests/?value=42")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["data"][0]["echo"]["query"], json!({ "value": 42 }));
}

#[tokio::test]
async fn internal_context_fields_are_dropped() {
    let router = api().router();
    let reply = send(&router, get("/api/tests/?_role=admin&v=1")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["data"][0]["echo"]["context"], json!({ "v": 1 }));
}

#[tokio::test]
async fn undeclared_query_fields_are_stripped() {
    let router = api().router();
    let reply = send(&router, get("/api/tests?foo=bar&id=1")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json["data"][0]["echo"]["query"], json!({ "id": "1" }));
}

#[tokio::test]
async fn read_by_invalid_id_is_a_bad_request() {
    let router = api().router();
    let reply = send(&router, get("/api/tests/badId")).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json["code"], 400);
}

#[tokio::test]
async fn read_by_unknown_id_is_not_found() {
    let router = api().router();
    let reply = send(&router, get("/api/tests/0")).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.json, json!({ "code": 404, "message": "test:0" }));
}

#[tokio::test]
async fn create_validates_every_item() {
    let router = api().router();
    let reply = send(&router, with_json("POST", "/api/tests/", &json!([{ "id": "1" }]))).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json["code"], 400);
}

#[tokio::test]
async fn create_answers_created() {
    let router = api().router();
    let reply = send(
        &router,
        with_json("POST", "/api/tests/?_role=admin&v=1", &json!([{ "value": 42 }])),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json["data"], json!([{ "value": 42 }]));
    assert_eq!(reply.json["meta"]["context"], json!({ "v": 1 }));
}

#[tokio::test]
async fn create_accepts_a_single_object() {
    let router = api().router();
    let reply = send(&router, with_json("POST", "/api/tests", &json!({ "value": "3" }))).await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.json["data"], json!([{ "value": 3 }]));
}

#[tokio::test]
async fn missing_or_malformed_body_is_a_bad_request() {
    let router = api().router();
    let empty = Request::post("/api/tests").body(Body::empty()).unwrap();
    assert_eq!(send(&router, empty).await.status, StatusCode::BAD_REQUEST);

    let malformed = Request::post("/api/tests").body(Body::from("{oops")).unwrap();
    assert_eq!(send(&router, malformed).await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn replace_coerces_the_body() {
    let router = api().router();
    let reply = send(&router, with_json("PUT", "/api/tests/1", &json!({ "value": "5" }))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json, json!({ "data": [{ "id": "1", "value": 5 }] }));
}

#[tokio::test]
async fn id_addressed_patch_and_delete_without_match_are_not_found() {
    let router = api().router();
    let patch = send(&router, with_json("PATCH", "/api/tests/1", &json!({ "value": 1 }))).await;
    assert_eq!(patch.status, StatusCode::NOT_FOUND);
    assert_eq!(patch.json, json!({ "code": 404, "message": "test:1" }));

    let delete = Request::delete("/api/tests/1").body(Body::empty()).unwrap();
    assert_eq!(send(&router, delete).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn collection_routes_follow_the_query_schema() {
    let router = api().router();
    // patch requires a single `id`, so there is no collection-level patch
    let patch = send(&router, with_json("PATCH", "/api/tests", &json!({ "value": 1 }))).await;
    assert_eq!(patch.status, StatusCode::METHOD_NOT_ALLOWED);

    // delete leaves `id` optional
    let delete = Request::delete("/api/tests").body(Body::empty()).unwrap();
    let reply = send(&router, delete).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json, json!({ "data": [] }));
}

#[tokio::test]
async fn read_only_resources_have_no_write_routes() {
    let router = api().router();
    let reply = send(&router, with_json("POST", "/api/owners", &json!({ "id": "o2" }))).await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn unhandled_errors_are_generic_and_reported() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let api = builder(ApiConfig::default())
        .on_error(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    let reply = send(&api.router(), get("/api/tests?value=13")).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.json, json!({ "code": 500, "message": "Internal Server Error" }));
    assert!(!reply.text.contains("connection refused"));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn context_fn_sets_internal_fields() {
    let api = builder(ApiConfig::default())
        .context_fn(|info: &RequestInfo| {
            let mut extra = Map::new();
            if let Some(role) = info.header("x-role") {
                extra.insert("_role".to_string(), Value::String(role.to_string()));
            }
            extra
        })
        .build()
        .unwrap();
    let request = Request::get("/api/tests?_role=admin")
        .header("x-role", "editor")
        .body(Body::empty())
        .unwrap();
    let reply = send(&api.router(), request).await;
    assert_eq!(reply.json["data"][0]["echo"]["context"], json!({ "_role": "editor" }));
}

#[tokio::test]
async fn hal_responses_carry_links() {
    let router = api().router();
    let request = Request::get("/api/tests/5")
        .header(header::ACCEPT, HAL_MEDIA_TYPE)
        .body(Body::empty())
        .unwrap();
    let reply = send(&router, request).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.content_type(), HAL_MEDIA_TYPE);
    assert_eq!(
        reply.json["_links"],
        json!({
            "self": { "href": "/api/tests" },
            "owner": { "href": "/api/owners/{id}", "templated": true }
        })
    );
    assert_eq!(
        reply.json["data"][0]["_links"],
        json!({
            "self": { "href": "/api/tests/5" },
            "owner": { "href": "/api/owners/o1" }
        })
    );
}

#[tokio::test]
async fn plain_json_has_no_links() {
    let router = api().router();
    let request = Request::get("/api/tests/5")
        .header(header::ACCEPT, "application/json")
        .body(Body::empty())
        .unwrap();
    let reply = send(&router, request).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.content_type().starts_with("application/json"));
    assert!(reply.json.get("_links").is_none());
    assert!(reply.json["data"][0].get("_links").is_none());
}

fn host_pages() -> Router {
    Router::new().fallback(|| async { "served by the host" })
}

fn accepting(uri: &str, media_type: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::ACCEPT, media_type)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn unacceptable_media_type_passes_through() {
    let router = api().router_with_fallback(host_pages());
    let reply = send(&router, accepting("/api/tests", "text/html")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.text, "served by the host");

    let served = send(&router, accepting("/api/tests", "text/html, application/json")).await;
    assert_eq!(served.json["data"][0]["id"], "1");
}

#[tokio::test]
async fn unacceptable_media_type_without_fallback_is_not_found() {
    let router = api().router();
    let reply = send(&router, accepting("/api/tests/5", "text/html")).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.text.is_empty());
}

#[tokio::test]
async fn unrouted_requests_reach_the_fallback() {
    let router = api().router_with_fallback(host_pages());
    assert_eq!(send(&router, get("/index.html")).await.text, "served by the host");
    assert_eq!(send(&router, get("/api")).await.text, "served by the host");
    assert_eq!(send(&router, get("/api/api.json")).await.status, StatusCode::OK);
}

#[tokio::test]
async fn document_is_served() {
    let router = api().router();
    let reply = send(&router, get("/api/api.json")).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.content_type().starts_with("application/json"));

    let keys: Vec<&str> = reply
        .json
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, ["openapi", "info", "servers", "paths", "components"]);
    let paths = reply.json["paths"].as_object().unwrap();
    assert!(paths.contains_key("/tests"));
    assert!(paths.contains_key("/tests/{id}"));
    assert!(paths.contains_key("/owners"));
}

#[tokio::test]
async fn root_lists_resources_for_hal_clients() {
    let router = api().router();
    let hal = Request::get("/api")
        .header(header::CONTENT_TYPE, HAL_MEDIA_TYPE)
        .body(Body::empty())
        .unwrap();
    let reply = send(&router, hal).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.content_type(), HAL_MEDIA_TYPE);
    assert_eq!(reply.json["_links"]["tests"], json!({ "href": "/api/tests" }));
    assert_eq!(reply.json["_links"]["owners"], json!({ "href": "/api/owners" }));

    assert_eq!(send(&router, get("/api")).await.status, StatusCode::NOT_FOUND);
}
