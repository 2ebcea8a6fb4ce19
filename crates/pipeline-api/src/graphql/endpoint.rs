//! HTTP endpoints of the GraphQL schema.
//!
//! - `POST {base}/graphql` executes a request
//! - `GET {base}/graphql` serves GraphiQL (when enabled)
//! - `GET {base}/graphqlSchema` prints the schema (when enabled)

use std::sync::Arc;

use async_graphql::dynamic::Schema;
use async_graphql::http::GraphiQLSource;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::config::GraphQlConfig;
use crate::runtime::{RequestInfo, RestError, BODY_LIMIT};

struct GraphQlState {
    schema: Schema,
    endpoint: String,
}

/// Router serving `schema` under the base path.
pub(crate) fn routes(schema: Schema, config: &GraphQlConfig, base_path: &str) -> Router {
    let state = Arc::new(GraphQlState {
        schema,
        endpoint: format!("{base_path}/graphql"),
    });

    let mut graphql = post(execute);
    if config.graphiql {
        graphql = graphql.get(graphiql);
    }
    let mut router = Router::new().route(&state.endpoint, graphql);
    if config.schema_endpoint {
        router = router.route(&format!("{base_path}/graphqlSchema"), get(print_schema));
    }
    tracing::debug!(
        endpoint = %state.endpoint,
        graphiql = config.graphiql,
        schema_endpoint = config.schema_endpoint,
        "graphql routes"
    );
    router.with_state(state)
}

async fn execute(State(state): State<Arc<GraphQlState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let info = RequestInfo::from_parts(&parts);

    let bytes = match axum::body::to_bytes(body, BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return RestError::new(StatusCode::BAD_REQUEST, format!("Cannot read request body: {e}"))
                .into_response()
        }
    };
    let request: async_graphql::Request = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(e) => {
            return RestError::new(StatusCode::BAD_REQUEST, format!("Invalid GraphQL request: {e}"))
                .into_response()
        }
    };

    tracing::debug!(operation = ?request.operation_name, uri = %info.uri, "executing graphql request");
    let response = state.schema.execute(request.data(info)).await;
    Json(response).into_response()
}

async fn graphiql(State(state): State<Arc<GraphQlState>>) -> Html<String> {
    Html(GraphiQLSource::build().endpoint(&state.endpoint).finish())
}

async fn print_schema(State(state): State<Arc<GraphQlState>>) -> String {
    state.schema.sdl()
}
