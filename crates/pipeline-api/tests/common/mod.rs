//! Echo pipelines and request helpers shared by the integration suites.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::Router;
use http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use pipeline_api::{
    async_trait, Api, ApiBuilder, ApiConfig, Context, Pipeline, PipelineError, PipelineRef,
    Query, QueryTemplate, Relation, ResourceSchemas, ResultPage,
};

/// Answers every read with one item echoing the validated query and context.
///
/// - `value == 13` fails with an unclassified error
/// - `id == "0"` matches nothing
/// - patch and delete never match anything
pub struct Echo {
    schemas: ResourceSchemas,
    relations: Vec<Relation>,
}

#[async_trait]
impl Pipeline for Echo {
    fn schemas(&self) -> &ResourceSchemas {
        &self.schemas
    }

    fn relations(&self) -> &[Relation] {
        &self.relations
    }

    async fn read(&self, query: Query, context: Context) -> Result<ResultPage, PipelineError> {
        if query.get("value") == Some(&json!(13)) {
            return Err(PipelineError::other("DatabaseDown", "connection refused"));
        }
        let id = query.get("id").cloned().unwrap_or_else(|| json!("1"));
        if id == "0" {
            return Ok(ResultPage::default());
        }
        Ok(ResultPage::new(vec![json!({
            "id": id,
            "value": 7,
            "ownerId": "o1",
            "echo": { "query": query, "context": context }
        })]))
    }

    async fn create(
        &self,
        values: Vec<Value>,
        query: Query,
        context: Context,
    ) -> Result<ResultPage, PipelineError> {
        Ok(ResultPage::new(values).with_meta(json!({ "query": query, "context": context })))
    }

    async fn replace(
        &self,
        id: String,
        values: Value,
        _context: Context,
    ) -> Result<ResultPage, PipelineError> {
        Ok(ResultPage::new(vec![json!({ "id": id, "value": values["value"] })]))
    }

    async fn patch(
        &self,
        _query: Query,
        _values: Value,
        _context: Context,
    ) -> Result<ResultPage, PipelineError> {
        Ok(ResultPage::default())
    }

    async fn delete(&self, _query: Query, _context: Context) -> Result<ResultPage, PipelineError> {
        Ok(ResultPage::default())
    }
}

fn schemas(value: Value) -> ResourceSchemas {
    serde_json::from_value(value).unwrap()
}

/// Owners: read only.
pub fn owners() -> PipelineRef {
    Arc::new(Echo {
        schemas: schemas(json!({
            "model": {
                "type": "object",
                "properties": { "id": { "type": "string" }, "value": { "type": "number" } }
            },
            "read": {
                "query": { "type": "object", "properties": { "id": { "type": "string" } } }
            }
        })),
        relations: Vec::new(),
    })
}

/// Comments of a test: read only, never registered, so relations to it
/// get a synthesized GraphQL type and no HAL link.
pub fn comments() -> PipelineRef {
    Arc::new(Echo {
        schemas: schemas(json!({
            "model": {
                "type": "object",
                "properties": { "id": { "type": "string" }, "echo": { "type": "object" } }
            },
            "context": {
                "type": "object",
                "properties": { "_role": { "type": "string" }, "lang": { "type": "string" } }
            },
            "read": {
                "query": {
                    "type": "object",
                    "properties": { "testId": { "type": "string" }, "value": { "type": "number" } }
                }
            }
        })),
        relations: Vec::new(),
    })
}

/// The `tests` resource: every operation, an internal `_role` context
/// field, an `owner` relation to `owners` and a `comments` relation.
pub fn tests(owners: &PipelineRef) -> PipelineRef {
    let owners = Arc::clone(owners);
    let comments = comments();
    Arc::new(Echo {
        schemas: schemas(json!({
            "model": {
                "type": "object",
                "properties": {
                    "id": { "type": "string", "maxLength": 2 },
                    "value": { "type": "number" },
                    "echo": { "type": "object" }
                },
                "required": ["id", "value"]
            },
            "context": {
                "type": "object",
                "properties": { "_role": { "type": "string" }, "v": { "type": "number" } }
            },
            "create": {
                "values": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "maxLength": 2 },
                        "value": { "type": "number" }
                    },
                    "required": ["value"]
                }
            },
            "read": {
                "query": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "maxLength": 2 },
                        "value": { "type": "number" }
                    }
                }
            },
            "replace": {
                "values": {
                    "type": "object",
                    "properties": { "value": { "type": "number" } },
                    "required": ["value"]
                }
            },
            "patch": {
                "query": {
                    "type": "object",
                    "properties": { "id": { "type": "string" } },
                    "required": ["id"]
                },
                "values": {
                    "type": "object",
                    "properties": { "value": { "type": "number" } }
                }
            },
            "delete": {
                "query": { "type": "object", "properties": { "id": { "type": "string" } } }
            }
        })),
        relations: vec![
            Relation::one(
                "owner",
                move || Arc::clone(&owners),
                QueryTemplate::new().field("id", "ownerId"),
            ),
            Relation::many(
                "comments",
                move || Arc::clone(&comments),
                QueryTemplate::new().field("testId", "id"),
            ),
        ],
    })
}

/// `tests` and `owners` under `/api`.
pub fn builder(config: ApiConfig) -> ApiBuilder {
    let owners = owners();
    ApiBuilder::new(config.base_path("/api"))
        .register(tests(&owners), "test", None)
        .unwrap()
        .register(owners, "owner", None)
        .unwrap()
}

pub fn api() -> Api {
    builder(ApiConfig::default()).build().unwrap()
}

/// Status, headers and JSON body (`Value::Null` when the body is not JSON).
pub struct Reply {
    pub status: StatusCode,
    pub headers: http::HeaderMap,
    pub text: String,
    pub json: Value,
}

impl Reply {
    pub fn content_type(&self) -> &str {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> Reply {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Reply {
        status,
        headers,
        text,
        json,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn with_json(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
