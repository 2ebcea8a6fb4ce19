//! The host facade.
//!
//! An [`ApiBuilder`] collects resources; every registration is checked and
//! documented immediately, so a bad resource fails before anything is
//! served. [`ApiBuilder::build`] consumes the builder and yields an [`Api`],
//! which is read-only: its document, GraphQL schema and routes never change
//! afterwards.
//!
//! ```no_run
//! # use pipeline_api::{ApiBuilder, ApiConfig, PipelineRef};
//! # fn books() -> PipelineRef { unimplemented!() }
//! # fn main() -> Result<(), pipeline_api::ConfigError> {
//! let api = ApiBuilder::new(ApiConfig::default().base_path("/api"))
//!     .register(books(), "book", None)?
//!     .build()?;
//! let router: axum::Router = api.router();
//! # let _ = router;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_graphql::dynamic::Schema;
use axum::body::Bytes;
use axum::Router;
use pipeline_api_core::{InternalOptions, Operation, PipelineError, PipelineId, PipelineRef};
use pipeline_api_openapi::{document_resource, OpenApiDocument, Parameter};
use serde_json::{Map, Value};

use crate::config::ApiConfig;
use crate::error::{ConfigError, Result};
use crate::graphql::{self, GraphQlBuilder};
use crate::host::{ContextFn, ErrorHook, Host, Resource, Validators};
use crate::rest;
use crate::runtime::RequestInfo;

/// Paths served next to the resources.
const RESERVED_PATHS: &[&str] = &["api.json", "graphql", "graphqlSchema"];

struct Registration {
    pipeline: PipelineRef,
    name: String,
    plural: String,
    validators: Validators,
}

/// Registration phase of an [`Api`].
pub struct ApiBuilder {
    config: ApiConfig,
    internal: InternalOptions,
    document: OpenApiDocument,
    registrations: Vec<Registration>,
    context_fn: Option<ContextFn>,
    on_error: Option<ErrorHook>,
}

impl fmt::Debug for ApiBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiBuilder")
            .field("config", &self.config)
            .field(
                "resources",
                &self.registrations.iter().map(|r| &r.name).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl ApiBuilder {
    /// Start with no resources.
    ///
    /// The base path is normalized to a leading `/` without a trailing one;
    /// `""` and `"/"` both mean "serve at the root".
    #[must_use]
    pub fn new(mut config: ApiConfig) -> Self {
        config.document.base_path = normalize_base_path(&config.document.base_path);
        let internal = config.document.internal_options();
        let document = config.document.new_document();
        Self {
            config,
            internal,
            document,
            registrations: Vec::new(),
            context_fn: None,
            on_error: None,
        }
    }

    /// Derive extra context entries from every request.
    ///
    /// The output is deep-merged over the caller-supplied context after
    /// internal options were stripped, so it is the only way to set them.
    #[must_use]
    pub fn context_fn<F>(mut self, context_fn: F) -> Self
    where
        F: Fn(&RequestInfo) -> Map<String, Value> + Send + Sync + 'static,
    {
        self.context_fn = Some(Arc::new(context_fn));
        self
    }

    /// Observe every error a request fails with.
    #[must_use]
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&PipelineError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    /// Register `pipeline` as resource `name`, served under `/{plural}`.
    ///
    /// `plural` defaults to `name + "s"`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ParamsNameConflict`] when the context schema and an
    ///   operation's query schema declare the same field
    /// - [`ConfigError::DuplicateResource`] when the name, the plural or the
    ///   pipeline itself is already registered
    /// - [`ConfigError::ReservedPath`] when the plural cannot be routed
    /// - [`ConfigError::Document`] when the document rejects a schema name
    /// - [`ConfigError::Schema`] when a schema cannot be compiled
    pub fn register(
        mut self,
        pipeline: PipelineRef,
        name: &str,
        plural: Option<&str>,
    ) -> Result<Self> {
        let plural = plural.map_or_else(|| format!("{name}s"), str::to_string);
        if !is_path_segment(&plural) || RESERVED_PATHS.contains(&plural.as_str()) {
            return Err(ConfigError::ReservedPath(plural));
        }
        let id = PipelineId::of(&pipeline);
        if self.registrations.iter().any(|r| {
            r.name == name || r.plural == plural || PipelineId::of(&r.pipeline) == id
        }) {
            return Err(ConfigError::DuplicateResource(name.to_string()));
        }

        let schemas = pipeline.schemas();
        for operation in schemas.available() {
            let conflicts = schemas.context_conflicts(operation);
            if !conflicts.is_empty() {
                return Err(ConfigError::ParamsNameConflict {
                    resource: name.to_string(),
                    operation,
                    conflicts,
                });
            }
        }

        document_resource(&mut self.document, schemas, name, &plural, &self.internal)?;
        let validators = Validators::compile(schemas)?;
        let operations: Vec<Operation> = schemas.available().collect();

        tracing::debug!(resource = name, %plural, ?operations, "resource registered");
        self.registrations.push(Registration {
            pipeline,
            name: name.to_string(),
            plural,
            validators,
        });
        Ok(self)
    }

    /// The document as registered so far.
    #[must_use]
    pub fn document(&self) -> &OpenApiDocument {
        &self.document
    }

    /// Seal the registrations.
    ///
    /// # Errors
    ///
    /// [`ConfigError::GraphQl`] when the GraphQL schema cannot be built,
    /// [`ConfigError::Document`] when the document cannot be serialized.
    pub fn build(self) -> Result<Api> {
        let host = Arc::new(Host {
            base_path: self.config.document.base_path.clone(),
            internal: self.internal,
            context_fn: self.context_fn,
            on_error: self.on_error,
            paths: self
                .registrations
                .iter()
                .map(|r| (PipelineId::of(&r.pipeline), r.plural.clone()))
                .collect(),
        });

        let resources: Vec<Arc<Resource>> = self
            .registrations
            .into_iter()
            .map(|r| {
                Arc::new(Resource::new(
                    Arc::clone(&host),
                    r.pipeline,
                    r.name,
                    r.plural,
                    r.validators,
                ))
            })
            .collect();

        let graphql = if self.config.graphql.enabled {
            let mut builder = GraphQlBuilder::new(Arc::clone(&host));
            for resource in &resources {
                builder.register(resource)?;
            }
            builder.finish()?
        } else {
            None
        };

        let document_json =
            serde_json::to_vec(&self.document).map_err(pipeline_api_openapi::Error::from)?;
        let by_name = resources
            .iter()
            .enumerate()
            .map(|(index, resource)| (resource.name.clone(), index))
            .collect();

        tracing::debug!(
            resources = resources.len(),
            graphql = graphql.is_some(),
            base_path = %host.base_path,
            "api built"
        );
        Ok(Api {
            config: self.config,
            host,
            resources,
            by_name,
            document: self.document,
            document_json: Bytes::from(document_json),
            graphql,
        })
    }
}

/// Serving phase: the sealed set of resources and everything derived from it.
pub struct Api {
    config: ApiConfig,
    host: Arc<Host>,
    resources: Vec<Arc<Resource>>,
    by_name: HashMap<String, usize>,
    document: OpenApiDocument,
    document_json: Bytes,
    graphql: Option<Schema>,
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("host", &self.host)
            .field("resources", &self.resources)
            .field("graphql", &self.graphql.is_some())
            .finish_non_exhaustive()
    }
}

impl Api {
    /// Every route: resources, root HAL index, `api.json` and GraphQL,
    /// under the base path.
    ///
    /// Requests the API leaves alone answer `404`. Use
    /// [`router_with_fallback`](Self::router_with_fallback) to serve them.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router_with_fallback(Router::new())
    }

    /// [`router`](Self::router), handing every request the API does not
    /// serve to `fallback`.
    ///
    /// That covers unrouted paths, resource requests whose `Accept` header
    /// names neither `application/json` nor `application/hal+json`, and root
    /// index requests without `Content-Type: application/hal+json`.
    ///
    /// ```no_run
    /// # use pipeline_api::Api;
    /// # fn api() -> Api { unimplemented!() }
    /// use axum::Router;
    ///
    /// let pages = Router::new().fallback(|| async { "served by the host" });
    /// let router = api().router_with_fallback(pages);
    /// # let _ = router;
    /// ```
    #[must_use]
    pub fn router_with_fallback(&self, fallback: Router) -> Router {
        let base_path = &self.host.base_path;
        let mut router = Router::new();
        for resource in &self.resources {
            router = router.merge(rest::resource_router(
                Arc::clone(resource),
                fallback.clone(),
            ));
        }
        router = router
            .merge(rest::root_router(base_path, &self.resources, fallback.clone()))
            .merge(rest::document_router(base_path, self.document_json.clone()));
        if let Some(schema) = &self.graphql {
            router = router.merge(graphql::routes(
                schema.clone(),
                &self.config.graphql,
                base_path,
            ));
        }
        router.fallback_service(fallback)
    }

    /// The `OpenAPI` document served at `api.json`.
    #[must_use]
    pub fn document(&self) -> &OpenApiDocument {
        &self.document
    }

    /// The GraphQL schema, unless disabled or no resource can be read.
    #[must_use]
    pub fn graphql_schema(&self) -> Option<&Schema> {
        self.graphql.as_ref()
    }

    /// A registered pipeline by resource name.
    #[must_use]
    pub fn pipeline_by_name(&self, name: &str) -> Option<&PipelineRef> {
        self.by_name
            .get(name)
            .map(|&index| &self.resources[index].pipeline)
    }

    /// Normalized base path, `""` when serving at the root.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.host.base_path
    }

    /// `object` without internal options.
    #[must_use]
    pub fn filter_internal_options(&self, object: Map<String, Value>) -> Map<String, Value> {
        self.host.internal.filter(object)
    }

    /// `parameters` without internal options.
    #[must_use]
    pub fn filter_internal_parameters(&self, parameters: Vec<Parameter>) -> Vec<Parameter> {
        parameters
            .into_iter()
            .filter(|p| self.host.internal.is_not_internal(&p.name))
            .collect()
    }

    /// Whether `name` may be supplied by callers.
    #[must_use]
    pub fn is_not_an_internal_option(&self, name: &str) -> bool {
        self.host.internal.is_not_internal(name)
    }

    /// Wrap a raw failure with the request it belongs to.
    ///
    /// The wrapper keeps the message and records the method and URL; the
    /// original error stays in the cause chain, so translation still finds
    /// its kind.
    #[must_use]
    pub fn api_error(&self, error: PipelineError, request: &RequestInfo) -> PipelineError {
        Host::api_error(error, request)
    }
}

/// `"api/"` → `"/api"`, `"/"` → `""`.
fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn is_path_segment(plural: &str) -> bool {
    !plural.is_empty()
        && plural
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
}
