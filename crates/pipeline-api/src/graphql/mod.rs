//! GraphQL surface: a read-only schema derived from the registered pipelines.
//!
//! Each registered pipeline contributes an object type for its model. A
//! pipeline offering `read` also gets a root field named after its plural:
//!
//! ```graphql
//! type Query {
//!   books(query: BookReadQuery, options: BookContext): BookReadResult!
//! }
//! type BookReadResult { data: [Book]  meta: BookReadMeta }
//! ```
//!
//! Relations become fields of the model types once every pipeline is known.
//! A relation whose target was never registered gets a model type built on
//! the spot, named after the parent and the relation (`BookPublisher`).

mod endpoint;
mod types;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, InputValue, ResolverContext, Schema, TypeRef,
};
use async_graphql::ErrorExtensions;
use pipeline_api_core::{
    Cardinality, Operation, PipelineError, PipelineId, PipelineRef, Relation, ResultPage,
};
use pipeline_api_openapi::upper_camel;
use serde_json::{json, Map, Value};

pub(crate) use self::endpoint::routes;
use self::types::{is_name, property_field, ObjectSpec, Registry, Shape};
use crate::error::{ConfigError, Result};
use crate::host::{Host, Resource};
use crate::runtime::RequestInfo;

const QUERY: &str = "Query";

/// Model type of one pipeline.
struct Model {
    type_name: String,
    shape: Shape,
    pipeline: PipelineRef,
}

/// Collects types and root fields during registration.
pub(crate) struct GraphQlBuilder {
    host: Arc<Host>,
    registry: Registry,
    models: Vec<Model>,
    by_pipeline: HashMap<PipelineId, usize>,
    root_fields: usize,
}

impl GraphQlBuilder {
    pub(crate) fn new(host: Arc<Host>) -> Self {
        Self {
            host,
            registry: Registry::with_root(QUERY),
            models: Vec::new(),
            by_pipeline: HashMap::new(),
            root_fields: 0,
        }
    }

    /// Add the model type of `resource` and, when it can be read, its root field.
    pub(crate) fn register(&mut self, resource: &Arc<Resource>) -> Result<()> {
        let schemas = resource.pipeline.schemas();
        let type_name = upper_camel(&resource.name);
        let shape = self.registry.output(&schemas.model, &type_name)?;
        self.add_model(type_name.clone(), shape.clone(), Arc::clone(&resource.pipeline));

        if !schemas.is_available(Operation::Read) {
            return Ok(());
        }
        if !is_name(&resource.plural) {
            return Err(ConfigError::GraphQl(format!(
                "'{}' is not a valid GraphQL field name",
                resource.plural
            )));
        }

        let internal = self.host.internal.clone();
        let keep_public = |name: &str| internal.is_not_internal(name);
        let options = match &schemas.context {
            Some(context) => Some(self.registry.input(
                context,
                &format!("{type_name}Context"),
                &keep_public,
            )?),
            None => None,
        };
        let query = match &schemas.read.query {
            Some(query) => Some(self.registry.input(
                query,
                &format!("{type_name}ReadQuery"),
                &|_: &str| true,
            )?),
            None => None,
        };
        let meta = match &schemas.read.meta {
            Some(meta) => self.registry.output(meta, &format!("{type_name}ReadMeta"))?,
            None => Shape::Json,
        };

        let result = format!("{type_name}ReadResult");
        let mut spec = ObjectSpec::new(result.as_str());
        spec.set_field("data", property_field("data", Shape::List(Box::new(shape))));
        spec.set_field("meta", property_field("meta", meta));
        self.registry.add_object(spec)?;

        let field = arguments(read_field(resource, &result), query, options);
        if let Some(root) = self.registry.object_mut(QUERY) {
            root.set_field(&resource.plural, field);
        }
        self.root_fields += 1;
        tracing::debug!(resource = %resource.name, field = %resource.plural, "graphql root field");
        Ok(())
    }

    /// Add relation fields and build the schema. `None` when no pipeline can
    /// be read, since a schema needs at least one root field.
    pub(crate) fn finish(mut self) -> Result<Option<Schema>> {
        // Relations of synthesized models are walked too; they append to `models`.
        let mut index = 0;
        while index < self.models.len() {
            self.add_relations(index)?;
            index += 1;
        }

        if self.root_fields == 0 {
            return Ok(None);
        }
        let builder = self.registry.register(Schema::build(QUERY, None, None));
        builder
            .finish()
            .map(Some)
            .map_err(|e| ConfigError::GraphQl(e.to_string()))
    }

    fn add_model(&mut self, type_name: String, shape: Shape, pipeline: PipelineRef) {
        self.by_pipeline
            .insert(PipelineId::of(&pipeline), self.models.len());
        self.models.push(Model {
            type_name,
            shape,
            pipeline,
        });
    }

    fn add_relations(&mut self, index: usize) -> Result<()> {
        let parent = self.models[index].type_name.clone();
        if !matches!(self.models[index].shape, Shape::Object(_)) {
            return Ok(());
        }
        let pipeline = Arc::clone(&self.models[index].pipeline);

        for relation in pipeline.relations() {
            if !is_name(&relation.name) {
                return Err(ConfigError::GraphQl(format!(
                    "relation '{}' of {parent} is not a valid GraphQL field name",
                    relation.name
                )));
            }
            let target = relation.pipeline();
            if !target.schemas().is_available(Operation::Read) {
                tracing::debug!(%parent, relation = %relation.name, "relation target cannot be read");
                continue;
            }
            let shape = self.target_shape(&parent, relation, &target)?;
            let field = match relation.cardinality {
                Cardinality::One => self.one_field(relation, shape),
                Cardinality::Many => self.many_field(&parent, relation, &target, shape)?,
            };
            if let Some(spec) = self.registry.object_mut(&parent) {
                spec.set_field(&relation.name, field);
            }
        }
        Ok(())
    }

    /// Model shape of a relation target, synthesizing a model when the
    /// target was never registered.
    fn target_shape(
        &mut self,
        parent: &str,
        relation: &Relation,
        target: &PipelineRef,
    ) -> Result<Shape> {
        if let Some(&index) = self.by_pipeline.get(&PipelineId::of(target)) {
            return Ok(self.models[index].shape.clone());
        }
        let type_name = format!("{parent}{}", upper_camel(&relation.name));
        let shape = self.registry.output(&target.schemas().model, &type_name)?;
        self.add_model(type_name, shape.clone(), Arc::clone(target));
        Ok(shape)
    }

    fn one_field(&self, relation: &Relation, shape: Shape) -> Field {
        let relation = Arc::new(relation.clone());
        let host = Arc::clone(&self.host);
        Field::new(relation.name.clone(), shape.type_ref(), move |ctx| {
            let relation = Arc::clone(&relation);
            let host = Arc::clone(&host);
            let shape = shape.clone();
            FieldFuture::new(async move {
                let parent = ctx.parent_value.try_downcast_ref::<Value>()?;
                if let Some(embedded) = parent.get(&relation.name).filter(|v| !v.is_null()) {
                    return Ok(shape.field_value(embedded));
                }
                let info = ctx.data_opt::<RequestInfo>().cloned();
                let page = relation
                    .fetch(parent, Map::new(), Map::new())
                    .await
                    .map_err(|err| failure(&host, err, info.as_ref()))?;
                Ok(page.data.first().and_then(|first| shape.field_value(first)))
            })
        })
    }

    fn many_field(
        &mut self,
        parent: &str,
        relation: &Relation,
        target: &PipelineRef,
        shape: Shape,
    ) -> Result<Field> {
        let prefix = format!("{parent}{}", upper_camel(&relation.name));
        let schemas = target.schemas();
        let fixed_query: HashSet<&str> = relation.query.keys().map(String::as_str).collect();
        let fixed_options: HashSet<&str> = relation.options.keys().map(String::as_str).collect();
        let internal = &self.host.internal;

        let query = match &schemas.read.query {
            Some(query) => Some(self.registry.input(
                query,
                &format!("{prefix}ReadQuery"),
                &|name: &str| !fixed_query.contains(name),
            )?),
            None => None,
        };
        let options = match &schemas.context {
            Some(context) => Some(self.registry.input(
                context,
                &format!("{prefix}Context"),
                &|name: &str| internal.is_not_internal(name) && !fixed_options.contains(name),
            )?),
            None => None,
        };

        let relation = Arc::new(relation.clone());
        let host = Arc::clone(&self.host);
        let list = Shape::List(Box::new(shape));
        let field = Field::new(relation.name.clone(), list.type_ref(), move |ctx| {
            let relation = Arc::clone(&relation);
            let host = Arc::clone(&host);
            let list = list.clone();
            FieldFuture::new(async move {
                let parent = ctx.parent_value.try_downcast_ref::<Value>()?;
                if let Some(embedded) = parent.get(&relation.name).filter(|v| v.is_array()) {
                    return Ok(list.field_value(embedded));
                }
                let query = object_arg(&ctx, "query")?;
                let info = ctx.data_opt::<RequestInfo>().cloned();
                let options = host.request_context(object_arg(&ctx, "options")?, info.as_ref());
                let page = relation
                    .fetch(parent, query, options)
                    .await
                    .map_err(|err| failure(&host, err, info.as_ref()))?;
                Ok(list.field_value(&Value::Array(page.data)))
            })
        });
        Ok(arguments(field, query, options))
    }
}

/// Root field reading `resource`.
fn read_field(resource: &Arc<Resource>, result: &str) -> Field {
    let resource = Arc::clone(resource);
    let name = resource.plural.clone();
    Field::new(name, TypeRef::named_nn(result), move |ctx| {
        let resource = Arc::clone(&resource);
        FieldFuture::new(async move {
            let query = object_arg(&ctx, "query")?;
            let options = object_arg(&ctx, "options")?;
            let info = ctx.data_opt::<RequestInfo>().cloned();
            let page = read_page(&resource, query, options, info.as_ref())
                .await
                .map_err(|err| failure(&resource.host, err, info.as_ref()))?;
            Ok(Some(FieldValue::owned_any(page_value(page))))
        })
    })
}

async fn read_page(
    resource: &Resource,
    query: Map<String, Value>,
    options: Map<String, Value>,
    info: Option<&RequestInfo>,
) -> std::result::Result<ResultPage, PipelineError> {
    let context = resource.context(options, info)?;
    let query = resource.query(Operation::Read, query)?;
    resource.pipeline.read(query, context).await
}

fn page_value(page: ResultPage) -> Value {
    json!({ "data": page.data, "meta": page.meta })
}

/// Declare the optional `query` and `options` arguments.
fn arguments(field: Field, query: Option<Shape>, options: Option<Shape>) -> Field {
    let field = match query {
        Some(shape) => field.argument(InputValue::new("query", shape.type_ref())),
        None => field,
    };
    match options {
        Some(shape) => field.argument(InputValue::new("options", shape.type_ref())),
        None => field,
    }
}

/// An object argument as JSON. Missing or `null` is the empty object.
fn object_arg(ctx: &ResolverContext<'_>, name: &str) -> async_graphql::Result<Map<String, Value>> {
    let Some(arg) = ctx.args.get(name) else {
        return Ok(Map::new());
    };
    match arg.as_value().clone().into_json()? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(async_graphql::Error::new(format!(
            "argument '{name}' must be an object, got {other}"
        ))),
    }
}

/// Translate a pipeline error into a GraphQL error carrying the HTTP status
/// as `extensions.code`.
fn failure(host: &Host, error: PipelineError, info: Option<&RequestInfo>) -> async_graphql::Error {
    let error = match info {
        Some(info) => Host::api_error(error, info),
        None => error,
    };
    let response = host.report(&error);
    let code = response.status().as_u16();
    async_graphql::Error::new(response.message()).extend_with(|_, extensions| {
        extensions.set("code", code);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::tests::{host, Schemas};
    use crate::host::Validators;
    use pipeline_api_core::{async_trait, Context, Query, QueryTemplate, ResourceSchemas};
    use pretty_assertions::assert_eq;

    fn resource(name: &str, plural: &str, pipeline: PipelineRef) -> Arc<Resource> {
        let validators = Validators::compile(pipeline.schemas()).unwrap();
        Arc::new(Resource::new(
            host(None),
            pipeline,
            name.to_string(),
            plural.to_string(),
            validators,
        ))
    }

    fn schemas(value: Value) -> ResourceSchemas {
        serde_json::from_value(value).unwrap()
    }

    fn type_block<'a>(sdl: &'a str, header: &str) -> &'a str {
        let start = sdl.find(header).unwrap();
        let end = start + sdl[start..].find('}').unwrap();
        &sdl[start..end]
    }

    fn model() -> Value {
        json!({
            "type": "object",
            "properties": { "id": { "type": "string" }, "title": { "type": "string" } }
        })
    }

    struct Books {
        schemas: ResourceSchemas,
        relations: Vec<Relation>,
    }

    #[async_trait]
    impl pipeline_api_core::Pipeline for Books {
        fn schemas(&self) -> &ResourceSchemas {
            &self.schemas
        }

        fn relations(&self) -> &[Relation] {
            &self.relations
        }

        async fn read(&self, query: Query, context: Context) -> std::result::Result<ResultPage, PipelineError> {
            if query.get("title").and_then(Value::as_str) == Some("missing") {
                return Err(PipelineError::not_found("no such book"));
            }
            Ok(ResultPage::new(vec![
                json!({ "id": "1", "title": "Dune", "query": query, "context": context }),
            ]))
        }
    }

    #[test]
    fn no_readable_pipeline_means_no_schema() {
        let mut builder = GraphQlBuilder::new(host(None));
        let write_only = schemas(json!({ "model": model(), "create": { "values": model() } }));
        builder
            .register(&resource("note", "notes", Arc::new(Schemas(write_only))))
            .unwrap();
        assert!(builder.finish().unwrap().is_none());
    }

    #[test]
    fn invalid_plural_is_rejected() {
        let mut builder = GraphQlBuilder::new(host(None));
        let readable = schemas(json!({ "model": model(), "read": { "query": { "type": "object" } } }));
        let err = builder
            .register(&resource("blogPost", "blog-posts", Arc::new(Schemas(readable))))
            .unwrap_err();
        assert!(matches!(err, ConfigError::GraphQl(message) if message.contains("blog-posts")));
    }

    #[tokio::test]
    async fn root_field_reads_through_validation() {
        let books: PipelineRef = Arc::new(Books {
            schemas: schemas(json!({
                "model": model(),
                "context": {
                    "type": "object",
                    "properties": { "_role": { "type": "string" }, "lang": { "type": "string" } }
                },
                "read": {
                    "query": { "type": "object", "properties": { "title": { "type": "string" } } }
                }
            })),
            relations: Vec::new(),
        });
        let mut builder = GraphQlBuilder::new(host(None));
        builder.register(&resource("book", "books", books)).unwrap();
        let schema = builder.finish().unwrap().unwrap();

        let sdl = schema.sdl();
        assert!(sdl.contains("books(query: BookReadQuery, options: BookContext): BookReadResult!"));
        assert!(!sdl.contains("_role"));

        let response = schema
            .execute(r#"{ books(query: { title: "Dune" }, options: { lang: "en" }) { data { id title } } }"#)
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({ "books": { "data": [{ "id": "1", "title": "Dune" }] } })
        );
    }

    #[tokio::test]
    async fn pipeline_errors_carry_the_status_code() {
        let books: PipelineRef = Arc::new(Books {
            schemas: schemas(json!({
                "model": model(),
                "read": {
                    "query": { "type": "object", "properties": { "title": { "type": "string" } } }
                }
            })),
            relations: Vec::new(),
        });
        let mut builder = GraphQlBuilder::new(host(None));
        builder.register(&resource("book", "books", books)).unwrap();
        let schema = builder.finish().unwrap().unwrap();

        let response = schema
            .execute(r#"{ books(query: { title: "missing" }) { data { id } } }"#)
            .await;
        let error = &response.errors[0];
        assert_eq!(error.message, "no such book");
        let code = error.extensions.as_ref().and_then(|ext| ext.get("code"));
        assert_eq!(code, Some(&async_graphql::Value::from(404)));
    }

    #[tokio::test]
    async fn relations_to_unregistered_pipelines_get_synthesized_types() {
        let authors: PipelineRef = Arc::new(Books {
            schemas: schemas(json!({
                "model": {
                    "type": "object",
                    "properties": { "id": { "type": "string" }, "title": { "type": "string" } }
                },
                "read": {
                    "query": {
                        "type": "object",
                        "properties": { "id": { "type": "string" }, "title": { "type": "string" } }
                    }
                }
            })),
            relations: Vec::new(),
        });
        let target = Arc::clone(&authors);
        let books: PipelineRef = Arc::new(Books {
            schemas: schemas(json!({
                "model": model(),
                "read": { "query": { "type": "object" } }
            })),
            relations: vec![Relation::many(
                "related",
                move || Arc::clone(&target),
                QueryTemplate::new().field("id", "id"),
            )],
        });
        let mut builder = GraphQlBuilder::new(host(None));
        builder.register(&resource("book", "books", books)).unwrap();
        let schema = builder.finish().unwrap().unwrap();

        let sdl = schema.sdl();
        assert!(sdl.contains("type BookRelated"));
        assert!(sdl.contains("related(query: BookRelatedReadQuery): [BookRelated]"));
        // `id` is fixed by the relation, only `title` stays an argument
        let input = type_block(&sdl, "input BookRelatedReadQuery");
        assert!(input.contains("title: String"));
        assert!(!input.contains("id:"));

        let response = schema
            .execute(r#"{ books { data { related(query: { title: "x" }) { id title } } } }"#)
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({ "books": { "data": [{ "related": [{ "id": "1", "title": "Dune" }] }] } })
        );
    }
}
