//! Per-request plumbing shared by the REST and GraphQL transports.
//!
//! [`Host`] holds what every request of every resource needs (base path,
//! internal option filter, caller hooks, pipeline → path table).
//! [`Resource`] adds one registered pipeline and its compiled validators.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use pipeline_api_core::{
    Context, InternalOptions, JsonSchemaValidator, Operation, PipelineError, PipelineId,
    PipelineRef, Query, ResourceSchemas, SchemaError, SchemaValidator,
};
use serde_json::{json, Map, Value};

use crate::runtime::{merge_into, RequestInfo, RestError};

/// Per-request context function: extra context entries derived from the request.
pub type ContextFn = Arc<dyn Fn(&RequestInfo) -> Map<String, Value> + Send + Sync>;

/// Hook called with every error a request fails with, before translation.
pub type ErrorHook = Arc<dyn Fn(&PipelineError) + Send + Sync>;

/// Kind name of errors wrapped by [`Host::api_error`].
pub(crate) const API_ERROR_KIND: &str = "ApiError";

pub(crate) struct Host {
    pub(crate) base_path: String,
    pub(crate) internal: InternalOptions,
    pub(crate) context_fn: Option<ContextFn>,
    pub(crate) on_error: Option<ErrorHook>,
    pub(crate) paths: HashMap<PipelineId, String>,
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("base_path", &self.base_path)
            .field("internal", &self.internal)
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl Host {
    /// Context candidate: caller-supplied entries without internal keys,
    /// deep-merged with the context function output.
    pub(crate) fn request_context(
        &self,
        supplied: Map<String, Value>,
        info: Option<&RequestInfo>,
    ) -> Map<String, Value> {
        let mut candidate = self.internal.filter(supplied);
        if let (Some(context_fn), Some(info)) = (&self.context_fn, info) {
            merge_into(&mut candidate, context_fn(info));
        }
        candidate
    }

    /// Wrap `error` with the request it failed.
    ///
    /// The wrapper keeps the cause's message so translated responses read
    /// the same; the cause stays reachable for classification.
    pub(crate) fn api_error(error: PipelineError, info: &RequestInfo) -> PipelineError {
        PipelineError::other(API_ERROR_KIND, error.message().to_string())
            .with_info("method", json!(info.method.as_str()))
            .with_info("url", json!(info.uri.to_string()))
            .with_source(error)
    }

    /// Run the error hook, log, and translate.
    pub(crate) fn report(&self, error: &PipelineError) -> RestError {
        if let Some(hook) = &self.on_error {
            hook(error);
        }
        let response = RestError::from_pipeline(error);
        if response.status().is_server_error() {
            tracing::error!(error = %error.full_message(), "unhandled pipeline error");
        } else {
            tracing::warn!(
                status = response.status().as_u16(),
                error = %error.full_message(),
                "request rejected"
            );
        }
        response
    }

    /// [`api_error`](Self::api_error) then [`report`](Self::report).
    pub(crate) fn fail(&self, error: PipelineError, info: &RequestInfo) -> RestError {
        self.report(&Self::api_error(error, info))
    }

    /// `{base_path}/{plural}` of a registered pipeline.
    pub(crate) fn resource_path(&self, pipeline: &PipelineRef) -> Option<String> {
        self.paths
            .get(&PipelineId::of(pipeline))
            .map(|plural| format!("{}/{plural}", self.base_path))
    }
}

/// Compiled validators of one resource.
#[derive(Debug, Default)]
pub(crate) struct Validators {
    context: Option<Box<dyn SchemaValidator>>,
    queries: HashMap<Operation, Box<dyn SchemaValidator>>,
    values: HashMap<Operation, Box<dyn SchemaValidator>>,
}

impl Validators {
    /// Compile every declared context, query and values schema.
    pub(crate) fn compile(schemas: &ResourceSchemas) -> Result<Self, SchemaError> {
        let mut out = Self::default();
        if let Some(context) = &schemas.context {
            out.context = Some(Box::new(JsonSchemaValidator::new(context)?));
        }
        for op in Operation::ALL {
            let declared = schemas.operation(op);
            if let Some(query) = &declared.query {
                out.queries
                    .insert(op, Box::new(JsonSchemaValidator::new(query)?));
            }
            if let Some(values) = &declared.values {
                out.values
                    .insert(op, Box::new(JsonSchemaValidator::new(values)?));
            }
        }
        Ok(out)
    }
}

/// A registered pipeline as the transports see it.
pub(crate) struct Resource {
    pub(crate) host: Arc<Host>,
    pub(crate) pipeline: PipelineRef,
    pub(crate) name: String,
    pub(crate) plural: String,
    validators: Validators,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("plural", &self.plural)
            .field("validators", &self.validators)
            .finish_non_exhaustive()
    }
}

impl Resource {
    pub(crate) fn new(
        host: Arc<Host>,
        pipeline: PipelineRef,
        name: String,
        plural: String,
        validators: Validators,
    ) -> Self {
        Self {
            host,
            pipeline,
            name,
            plural,
            validators,
        }
    }

    /// `{base_path}/{plural}`.
    pub(crate) fn endpoint(&self) -> String {
        format!("{}/{}", self.host.base_path, self.plural)
    }

    /// Build and validate the context of a request.
    ///
    /// Without a context schema the filtered candidate passes unchanged.
    pub(crate) fn context(
        &self,
        supplied: Map<String, Value>,
        info: Option<&RequestInfo>,
    ) -> Result<Context, PipelineError> {
        let candidate = self.host.request_context(supplied, info);
        match &self.validators.context {
            Some(validator) => into_object(validator.validate(Value::Object(candidate))?),
            None => Ok(candidate),
        }
    }

    /// Validate the query of `op`. Without a query schema the query is empty.
    pub(crate) fn query(
        &self,
        op: Operation,
        candidate: Map<String, Value>,
    ) -> Result<Query, PipelineError> {
        match self.validators.queries.get(&op) {
            Some(validator) => into_object(validator.validate(Value::Object(candidate))?),
            None => Ok(Query::new()),
        }
    }

    /// Validate a body value of `op`.
    pub(crate) fn values(&self, op: Operation, value: Value) -> Result<Value, PipelineError> {
        match self.validators.values.get(&op) {
            Some(validator) => validator.validate(value),
            None => Ok(value),
        }
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, PipelineError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(PipelineError::validation(format!(
            "Invalid parameters: expected an object, got {other}"
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pipeline_api_core::{async_trait, ErrorKind, Pipeline, ResourceSchemas};
    use pretty_assertions::assert_eq;

    pub(crate) struct Schemas(pub ResourceSchemas);

    #[async_trait]
    impl Pipeline for Schemas {
        fn schemas(&self) -> &ResourceSchemas {
            &self.0
        }
    }

    pub(crate) fn host(context_fn: Option<ContextFn>) -> Arc<Host> {
        Arc::new(Host {
            base_path: "/api".to_string(),
            internal: InternalOptions::default(),
            context_fn,
            on_error: None,
            paths: HashMap::new(),
        })
    }

    fn resource(schemas: Value, context_fn: Option<ContextFn>) -> Resource {
        let schemas: ResourceSchemas = serde_json::from_value(schemas).unwrap();
        let validators = Validators::compile(&schemas).unwrap();
        Resource::new(
            host(context_fn),
            Arc::new(Schemas(schemas)),
            "test".to_string(),
            "tests".to_string(),
            validators,
        )
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn info(uri: &str) -> RequestInfo {
        let (parts, ()) = axum::http::Request::builder()
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts();
        RequestInfo::from_parts(&parts)
    }

    #[test]
    fn context_filters_internal_then_merges_context_fn() {
        let context_fn: ContextFn = Arc::new(|_| object(json!({ "_role": "admin" })));
        let resource = resource(
            json!({
                "context": {
                    "type": "object",
                    "properties": { "_role": { "type": "string" }, "v": { "type": "number" } }
                }
            }),
            Some(context_fn),
        );
        let request = info("/api/tests?_role=guest&v=1&other=x");
        let context = resource
            .context(request.query.clone(), Some(&request))
            .unwrap();
        assert_eq!(Value::Object(context), json!({ "_role": "admin", "v": 1 }));
    }

    #[test]
    fn context_without_schema_passes_through() {
        let resource = resource(json!({}), None);
        let context = resource
            .context(object(json!({ "_secret": 1, "lang": "en" })), None)
            .unwrap();
        assert_eq!(Value::Object(context), json!({ "lang": "en" }));
    }

    #[test]
    fn invalid_context_is_a_validation_error() {
        let resource = resource(
            json!({
                "context": { "type": "object", "properties": { "v": { "type": "number" } } }
            }),
            None,
        );
        let err = resource
            .context(object(json!({ "v": "abc" })), None)
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::Validation);
    }

    #[test]
    fn query_is_empty_without_schema() {
        let resource = resource(json!({}), None);
        let query = resource
            .query(Operation::Delete, object(json!({ "id": "1" })))
            .unwrap();
        assert!(query.is_empty());
    }

    #[test]
    fn api_error_keeps_message_and_request() {
        let request = info("/api/tests/1");
        let wrapped = Host::api_error(PipelineError::not_found("test:1"), &request);
        assert_eq!(wrapped.kind(), &ErrorKind::Other(API_ERROR_KIND.to_string()));
        assert_eq!(wrapped.message(), "test:1");
        assert_eq!(wrapped.info()["method"], "GET");
        assert_eq!(wrapped.info()["url"], "/api/tests/1");
        assert!(wrapped.find_cause(&ErrorKind::NotFound).is_some());
    }

    #[test]
    fn report_runs_the_error_hook() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let host = Host {
            on_error: Some(Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })),
            ..Arc::try_unwrap(host(None)).unwrap()
        };
        let response = host.report(&PipelineError::conflict("duplicate"));
        assert_eq!(response.status().as_u16(), 409);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
