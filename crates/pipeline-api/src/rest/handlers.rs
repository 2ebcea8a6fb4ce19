//! Route handlers: one request through context → query → dispatch → respond.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use pipeline_api_core::{Operation, PipelineError, Query, ResultPage};
use serde_json::Value;

use super::hal::HalLinks;
use crate::host::Resource;
use crate::runtime::{Representation, RequestInfo, BODY_LIMIT, HAL_MEDIA_TYPE};

/// How a request addresses resources.
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Collection,
    Item(&'a str),
}

impl Target<'_> {
    fn id(self) -> Option<String> {
        match self {
            Self::Collection => None,
            Self::Item(id) => Some(id.to_string()),
        }
    }
}

pub(crate) async fn read_collection(
    State(resource): State<Arc<Resource>>,
    request: Request,
) -> Response {
    handle(&resource, Operation::Read, Target::Collection, request).await
}

pub(crate) async fn read_item(
    State(resource): State<Arc<Resource>>,
    Path(id): Path<String>,
    request: Request,
) -> Response {
    handle(&resource, Operation::Read, Target::Item(&id), request).await
}

pub(crate) async fn create(State(resource): State<Arc<Resource>>, request: Request) -> Response {
    handle(&resource, Operation::Create, Target::Collection, request).await
}

pub(crate) async fn replace(
    State(resource): State<Arc<Resource>>,
    Path(id): Path<String>,
    request: Request,
) -> Response {
    handle(&resource, Operation::Replace, Target::Item(&id), request).await
}

pub(crate) async fn patch_collection(
    State(resource): State<Arc<Resource>>,
    request: Request,
) -> Response {
    handle(&resource, Operation::Patch, Target::Collection, request).await
}

pub(crate) async fn patch_item(
    State(resource): State<Arc<Resource>>,
    Path(id): Path<String>,
    request: Request,
) -> Response {
    handle(&resource, Operation::Patch, Target::Item(&id), request).await
}

pub(crate) async fn delete_collection(
    State(resource): State<Arc<Resource>>,
    request: Request,
) -> Response {
    handle(&resource, Operation::Delete, Target::Collection, request).await
}

pub(crate) async fn delete_item(
    State(resource): State<Arc<Resource>>,
    Path(id): Path<String>,
    request: Request,
) -> Response {
    handle(&resource, Operation::Delete, Target::Item(&id), request).await
}

async fn handle(
    resource: &Resource,
    op: Operation,
    target: Target<'_>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let representation = parts
        .extensions
        .get::<Representation>()
        .copied()
        .unwrap_or(Representation::Json);
    let info = RequestInfo::from_parts(&parts);
    tracing::debug!(
        resource = %resource.name,
        operation = %op,
        method = %info.method,
        uri = %info.uri,
        "dispatching request"
    );

    match dispatch(resource, op, target, &info, body).await {
        Ok(page) => {
            let status = if op == Operation::Create {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            render(resource, status, page, representation)
        }
        Err(err) => resource.host.fail(err, &info).into_response(),
    }
}

async fn dispatch(
    resource: &Resource,
    op: Operation,
    target: Target<'_>,
    info: &RequestInfo,
    body: Body,
) -> Result<ResultPage, PipelineError> {
    let context = resource.context(info.query.clone(), Some(info))?;
    let pipeline = &resource.pipeline;

    match (op, target) {
        (Operation::Read, Target::Collection) => {
            let query = resource.query(op, info.query.clone())?;
            pipeline.read(query, context).await
        }
        (Operation::Read, Target::Item(id)) => {
            let mut candidate = serde_json::Map::new();
            candidate.insert("id".to_string(), Value::String(id.to_string()));
            let query = resource.query(op, candidate)?;
            let page = pipeline.read(query, context).await?;
            found(resource, target, page)
        }
        (Operation::Create, _) => {
            let query = resource.query(op, info.query.clone())?;
            let values = match read_json(body).await? {
                Value::Array(items) => items,
                single => vec![single],
            };
            let values = values
                .into_iter()
                .map(|item| resource.values(op, item))
                .collect::<Result<Vec<_>, _>>()?;
            pipeline.create(values, query, context).await
        }
        (Operation::Replace, _) => {
            let values = resource.values(op, read_json(body).await?)?;
            let id = target.id().unwrap_or_default();
            let page = pipeline.replace(id, values, context).await?;
            found(resource, target, page)
        }
        (Operation::Patch, _) => {
            let query = addressed_query(resource, op, target, info)?;
            let values = resource.values(op, read_json(body).await?)?;
            let page = pipeline.patch(query, values, context).await?;
            found(resource, target, page)
        }
        (Operation::Delete, _) => {
            let query = addressed_query(resource, op, target, info)?;
            let page = pipeline.delete(query, context).await?;
            found(resource, target, page)
        }
    }
}

/// Query string plus the path `id`, validated when the operation declares a
/// query schema. The path `id` is kept even when the schema does not declare it.
fn addressed_query(
    resource: &Resource,
    op: Operation,
    target: Target<'_>,
    info: &RequestInfo,
) -> Result<Query, PipelineError> {
    let mut candidate = info.query.clone();
    if let Some(id) = target.id() {
        candidate.insert("id".to_string(), Value::String(id));
    }
    let mut query = resource.query(op, candidate)?;
    if let Some(id) = target.id() {
        query.entry("id").or_insert(Value::String(id));
    }
    Ok(query)
}

/// Turn an empty result of an id-addressed call into `NotFound`.
fn found(
    resource: &Resource,
    target: Target<'_>,
    page: ResultPage,
) -> Result<ResultPage, PipelineError> {
    match target {
        Target::Item(id) if page.is_empty() => {
            Err(PipelineError::not_found(format!("{}:{id}", resource.name)))
        }
        _ => Ok(page),
    }
}

async fn read_json(body: Body) -> Result<Value, PipelineError> {
    let bytes = axum::body::to_bytes(body, BODY_LIMIT)
        .await
        .map_err(|e| PipelineError::validation(format!("Cannot read request body: {e}")))?;
    if bytes.is_empty() {
        return Err(PipelineError::validation("Missing request body"));
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| PipelineError::validation(format!("Invalid JSON body: {e}")))
}

fn render(
    resource: &Resource,
    status: StatusCode,
    page: ResultPage,
    representation: Representation,
) -> Response {
    match representation {
        Representation::Json => (status, Json(page)).into_response(),
        Representation::Hal => {
            let links = HalLinks::new(
                &resource.host,
                resource.endpoint(),
                resource.pipeline.relations(),
            );
            (
                status,
                [(header::CONTENT_TYPE, HAL_MEDIA_TYPE)],
                Json(links.envelope(page)),
            )
                .into_response()
        }
    }
}
