//! GraphQL endpoint driven in-process through the axum router.

mod common;

use axum::body::Body;
use http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};

use common::{api, builder, get, send, with_json};
use pipeline_api::{ApiConfig, RequestInfo};

fn graphql(query: &str) -> Request<Body> {
    with_json("POST", "/api/graphql", &json!({ "query": query }))
}

#[tokio::test]
async fn root_field_reads_with_validated_arguments() {
    let router = api().router();
    let reply = send(
        &router,
        graphql(r#"{ tests(query: { value: 42 }, options: { v: 1.5 }) { data { id value echo } } }"#),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.json.get("errors").is_none(), "{}", reply.text);
    assert_eq!(
        reply.json["data"]["tests"]["data"][0],
        json!({
            "id": "1",
            "value": 7,
            "echo": { "query": { "value": 42 }, "context": { "v": 1.5 } }
        })
    );
}

#[tokio::test]
async fn one_relations_are_fetched() {
    let router = api().router();
    let reply = send(&router, graphql("{ tests { data { id owner { id value } } } }")).await;
    assert!(reply.json.get("errors").is_none(), "{}", reply.text);
    assert_eq!(
        reply.json["data"]["tests"]["data"],
        json!([{ "id": "1", "owner": { "id": "o1", "value": 7 } }])
    );
}

const COMMENTS: &str =
    r#"{ tests { data { comments(query: { value: 3 }, options: { lang: "en" }) { id echo } } } }"#;

#[tokio::test]
async fn many_relations_hydrate_the_template_and_take_arguments() {
    let router = api().router();
    let reply = send(&router, graphql(COMMENTS)).await;
    assert!(reply.json.get("errors").is_none(), "{}", reply.text);
    assert_eq!(
        reply.json["data"]["tests"]["data"][0]["comments"],
        json!([{
            "id": "1",
            "echo": { "query": { "value": 3, "testId": "1" }, "context": { "lang": "en" } }
        }])
    );
}

#[tokio::test]
async fn many_relations_see_the_context_fn() {
    let api = builder(ApiConfig::default())
        .context_fn(|_: &RequestInfo| json!({ "_role": "admin" }).as_object().unwrap().clone())
        .build()
        .unwrap();
    let reply = send(&api.router(), graphql(COMMENTS)).await;
    assert!(reply.json.get("errors").is_none(), "{}", reply.text);
    assert_eq!(
        reply.json["data"]["tests"]["data"][0]["comments"][0]["echo"]["context"],
        json!({ "lang": "en", "_role": "admin" })
    );
}

#[tokio::test]
async fn many_relation_arguments_hide_internal_and_fixed_fields() {
    let api = api();
    let sdl = api.graphql_schema().unwrap().sdl();
    assert!(sdl.contains(
        "comments(query: TestCommentsReadQuery, options: TestCommentsContext): [TestComments]"
    ));

    // `_role` is internal and `testId` comes from the parent, so neither can be passed
    let router = api.router();
    let spoofed = send(
        &router,
        graphql(r#"{ tests { data { comments(options: { _role: "admin" }) { id } } } }"#),
    )
    .await;
    assert!(spoofed.json["errors"][0]["message"].is_string());
    let fixed = send(
        &router,
        graphql(r#"{ tests { data { comments(query: { testId: "9" }) { id } } } }"#),
    )
    .await;
    assert!(fixed.json["errors"][0]["message"].is_string());
}

#[tokio::test]
async fn pipeline_errors_become_graphql_errors() {
    let router = api().router();
    let reply = send(&router, graphql("{ tests(query: { value: 13 }) { data { id } } }")).await;
    assert_eq!(reply.status, StatusCode::OK);
    let error = &reply.json["errors"][0];
    assert_eq!(error["message"], "Internal Server Error");
    assert_eq!(error["extensions"]["code"], 500);
    assert!(!reply.text.contains("connection refused"));
}

#[tokio::test]
async fn validation_errors_carry_400() {
    let router = api().router();
    let reply = send(&router, graphql(r#"{ tests(query: { id: "toolong" }) { data { id } } }"#)).await;
    assert_eq!(reply.json["errors"][0]["extensions"]["code"], 400);
}

#[tokio::test]
async fn context_fn_sees_the_http_request() {
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
    let request = Request::post("/api/graphql")
        .header("x-role", "editor")
        .body(Body::from(json!({ "query": "{ tests { data { echo } } }" }).to_string()))
        .unwrap();
    let reply = send(&api.router(), request).await;
    assert_eq!(
        reply.json["data"]["tests"]["data"][0]["echo"]["context"],
        json!({ "_role": "editor" })
    );
}

#[tokio::test]
async fn malformed_requests_are_rejected() {
    let router = api().router();
    let request = Request::post("/api/graphql").body(Body::from("not json")).unwrap();
    let reply = send(&router, request).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json["code"], 400);
}

#[tokio::test]
async fn schema_hides_internal_context_fields() {
    let api = api();
    let sdl = api.graphql_schema().unwrap().sdl();
    assert!(sdl.contains("tests(query: TestReadQuery, options: TestContext): TestReadResult!"));
    assert!(sdl.contains("owners(query: OwnerReadQuery): OwnerReadResult!"));
    assert!(sdl.contains("owner: Owner"));
    assert!(!sdl.contains("_role"));
}

#[tokio::test]
async fn explorer_and_printed_schema_are_off_by_default() {
    let router = api().router();
    assert_eq!(
        send(&router, get("/api/graphql")).await.status,
        StatusCode::METHOD_NOT_ALLOWED
    );
    assert_eq!(send(&router, get("/api/graphqlSchema")).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn explorer_and_printed_schema_can_be_enabled() {
    let api = builder(ApiConfig::default().graphiql(true).graphql_schema_endpoint(true))
        .build()
        .unwrap();
    let router = api.router();

    let explorer = send(&router, get("/api/graphql")).await;
    assert_eq!(explorer.status, StatusCode::OK);
    assert!(explorer.content_type().starts_with("text/html"));
    assert!(explorer.text.contains("/api/graphql"));

    let schema = send(&router, get("/api/graphqlSchema")).await;
    assert_eq!(schema.status, StatusCode::OK);
    assert!(schema.text.contains("type Query"));
}

#[tokio::test]
async fn disabled_graphql_serves_nothing() {
    let api = builder(ApiConfig::default().graphql(false)).build().unwrap();
    assert!(api.graphql_schema().is_none());
    let reply = send(&api.router(), graphql("{ tests { data { id } } }")).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}
