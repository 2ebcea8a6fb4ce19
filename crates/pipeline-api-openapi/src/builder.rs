//! Per-resource `OpenAPI` assembly.
//!
//! [`RestDocBuilder`] registers a resource's named schemas as components and
//! emits one path-item operation per exposed REST route. It does pure
//! document assembly: no routing, no validation.

use pipeline_api_core::{
    exposes_collection_route, InternalOptions, Operation as ResourceOperation, ResourceSchemas,
    Schema,
};

use crate::adapter::{flatten, remap_refs, to_openapi_schema};
use crate::document::{OpenApiDocument, Operation, Parameter, RequestBody};
use crate::error::Result;
use crate::helpers::{
    array_of, component_ref, error_response, json_content, json_response, result_page_schema,
    upper_camel,
};
use crate::parameters::{dedupe, to_parameters};

/// Emits the path items of one resource into a shared document.
#[derive(Debug)]
pub struct RestDocBuilder<'a> {
    doc: &'a mut OpenApiDocument,
    schemas: &'a ResourceSchemas,
    internal: &'a InternalOptions,
    upper_name: String,
    upper_plural: String,
    collection_path: String,
    item_path: String,
}

impl<'a> RestDocBuilder<'a> {
    /// Register the resource's named schemas and prepare its paths.
    ///
    /// The model is registered as `UpperCamel(name)`; every other values or
    /// meta schema as `UpperCamel(name) + Role` (e.g. `TestCreateValues`).
    /// Each one is converted to the `OpenAPI` dialect, rebased, titled, and
    /// the whole component map is flattened afterwards.
    ///
    /// # Errors
    ///
    /// [`Error::SchemaNameCollision`](crate::Error::SchemaNameCollision) or
    /// [`Error::FlattenCollision`](crate::Error::FlattenCollision).
    pub fn new(
        doc: &'a mut OpenApiDocument,
        schemas: &'a ResourceSchemas,
        name: &str,
        plural: &str,
        internal: &'a InternalOptions,
    ) -> Result<Self> {
        let upper_name = upper_camel(name);
        for (role, schema) in schemas.named() {
            let component = format!("{upper_name}{role}");
            let mut converted = remap_refs(to_openapi_schema(schema), &component_ref(&component));
            if let Some(obj) = converted.as_object_mut() {
                obj.title = Some(component.clone());
            }
            doc.insert_schema(component, converted)?;
        }
        flatten(&mut doc.components.schemas)?;

        let collection_path = format!("/{plural}");
        let item_path = format!("{collection_path}/{{id}}");
        Ok(Self {
            doc,
            schemas,
            internal,
            upper_name,
            upper_plural: upper_camel(plural),
            collection_path,
            item_path,
        })
    }

    /// Document every available operation.
    ///
    /// Collection-level patch and delete are documented only when the query
    /// schema leaves room for them (see [`exposes_collection_route`]).
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateOperation`](crate::Error::DuplicateOperation) when the
    /// paths are already documented.
    pub fn document_all(mut self) -> Result<()> {
        let schemas = self.schemas;
        for op in schemas.available() {
            match op {
                ResourceOperation::Read => self.add_read_doc()?,
                ResourceOperation::Create => self.add_create_doc()?,
                ResourceOperation::Replace => self.add_replace_doc()?,
                ResourceOperation::Patch => {
                    self.add_patch_doc(true)?;
                    if exposes_collection_route(schemas.patch.query.as_ref()) {
                        self.add_patch_doc(false)?;
                    }
                }
                ResourceOperation::Delete => {
                    self.add_delete_doc(true)?;
                    if exposes_collection_route(schemas.delete.query.as_ref()) {
                        self.add_delete_doc(false)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn meta_name(&self, op: ResourceOperation) -> Option<String> {
        self.schemas
            .operation(op)
            .meta
            .as_ref()
            .map(|_| format!("{}{}Meta", self.upper_name, op.title()))
    }

    fn page(&self, op: ResourceOperation) -> Schema {
        result_page_schema(&self.upper_name, self.meta_name(op).as_deref())
    }

    fn query_parameters(&self, op: ResourceOperation) -> Vec<Parameter> {
        self.schemas
            .operation(op)
            .query
            .as_ref()
            .map(|query| to_parameters(&to_openapi_schema(query), &*self.doc))
            .unwrap_or_default()
    }

    fn context_parameters(&self) -> Vec<Parameter> {
        self.schemas
            .context
            .as_ref()
            .map(|context| to_parameters(&to_openapi_schema(context), &*self.doc))
            .unwrap_or_default()
            .into_iter()
            .filter(|p| self.internal.is_not_internal(&p.name))
            .collect()
    }

    /// `GET /{plural}` and `GET /{plural}/{id}`.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateOperation`](crate::Error::DuplicateOperation).
    pub fn add_read_doc(&mut self) -> Result<()> {
        let mut parameters = self.query_parameters(ResourceOperation::Read);
        parameters.extend(self.context_parameters());

        let find = Operation {
            description: format!("Find {}", self.upper_plural),
            operation_id: format!("find{}", self.upper_plural),
            parameters: dedupe(parameters),
            request_body: None,
            responses: [
                (
                    "200",
                    json_response(
                        &format!("{} corresponding to the query", self.upper_plural),
                        self.page(ResourceOperation::Read),
                    ),
                ),
                ("400", error_response("Bad request")),
                ("default", error_response("Unexpected error")),
            ]
            .into_iter()
            .map(|(code, r)| (code.to_string(), r))
            .collect(),
        };

        let get_by_id = Operation {
            description: format!("Get one {} by its id", self.upper_name),
            operation_id: format!("get{}ById", self.upper_name),
            parameters: vec![Parameter::path_id()],
            request_body: None,
            responses: [
                (
                    "200",
                    json_response(
                        &format!("{} corresponding to the provided id", self.upper_plural),
                        self.page(ResourceOperation::Read),
                    ),
                ),
                ("400", error_response("Bad request")),
                ("404", error_response("Not Found")),
                ("default", error_response("Unexpected error")),
            ]
            .into_iter()
            .map(|(code, r)| (code.to_string(), r))
            .collect(),
        };

        let (collection, item) = (self.collection_path.clone(), self.item_path.clone());
        self.doc.insert_operation(&collection, "get", find)?;
        self.doc.insert_operation(&item, "get", get_by_id)
    }

    /// `POST /{plural}` with an array of create values.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateOperation`](crate::Error::DuplicateOperation).
    pub fn add_create_doc(&mut self) -> Result<()> {
        let mut parameters = self.query_parameters(ResourceOperation::Create);
        parameters.extend(self.context_parameters());

        let values = format!("{}CreateValues", self.upper_name);
        let operation = Operation {
            description: format!("Create a new {}", self.upper_name),
            operation_id: format!("add{}", self.upper_name),
            parameters: dedupe(parameters),
            request_body: Some(RequestBody {
                description: format!("The {} to be created.", self.upper_name),
                required: true,
                content: json_content(array_of(Schema::reference(component_ref(&values)))),
            }),
            responses: [
                (
                    "201",
                    json_response(
                        &format!("{} created", self.upper_name),
                        self.page(ResourceOperation::Create),
                    ),
                ),
                ("400", error_response("Bad request")),
                ("409", error_response("Conflict")),
                ("default", error_response("Unexpected error")),
            ]
            .into_iter()
            .map(|(code, r)| (code.to_string(), r))
            .collect(),
        };

        let path = self.collection_path.clone();
        self.doc.insert_operation(&path, "post", operation)
    }

    /// `PUT /{plural}/{id}` with the replacement values.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateOperation`](crate::Error::DuplicateOperation).
    pub fn add_replace_doc(&mut self) -> Result<()> {
        let mut parameters = vec![Parameter::path_id()];
        parameters.extend(self.context_parameters());

        let values = format!("{}ReplaceValues", self.upper_name);
        let operation = Operation {
            description: format!("Replace a {} using its id", self.upper_name),
            operation_id: format!("replace{}", self.upper_name),
            parameters: dedupe(parameters),
            request_body: Some(RequestBody {
                description: format!("The replacement {}.", self.upper_name),
                required: true,
                content: json_content(Schema::reference(component_ref(&values))),
            }),
            responses: [
                (
                    "200",
                    json_response(
                        &format!("Replaced {}", self.upper_name),
                        self.page(ResourceOperation::Replace),
                    ),
                ),
                ("400", error_response("Bad request")),
                ("404", error_response("Not Found")),
                ("default", error_response("Unexpected error")),
            ]
            .into_iter()
            .map(|(code, r)| (code.to_string(), r))
            .collect(),
        };

        let path = self.item_path.clone();
        self.doc.insert_operation(&path, "put", operation)
    }

    /// `PATCH /{plural}/{id}` or, with `with_id == false`, `PATCH /{plural}`.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateOperation`](crate::Error::DuplicateOperation).
    pub fn add_patch_doc(&mut self, with_id: bool) -> Result<()> {
        let mut parameters = if with_id {
            vec![Parameter::path_id()]
        } else {
            Vec::new()
        };
        parameters.extend(self.query_parameters(ResourceOperation::Patch));
        parameters.extend(self.context_parameters());

        let target = if with_id { &self.upper_name } else { &self.upper_plural };
        let values = format!("{}PatchValues", self.upper_name);
        let mut responses = vec![
            (
                "200",
                json_response(
                    &format!("Updated {target}"),
                    self.page(ResourceOperation::Patch),
                ),
            ),
            ("400", error_response("Bad request")),
        ];
        if with_id {
            responses.push(("404", error_response("Not Found")));
        }
        responses.push(("default", error_response("Unexpected error")));

        let operation = Operation {
            description: if with_id {
                format!("Patch a {} using its id", self.upper_name)
            } else {
                format!("Patch many {}", self.upper_plural)
            },
            operation_id: format!("patch{target}"),
            parameters: dedupe(parameters),
            request_body: Some(RequestBody {
                description: format!("The patch of {}.", self.upper_name),
                required: true,
                content: json_content(Schema::reference(component_ref(&values))),
            }),
            responses: responses
                .into_iter()
                .map(|(code, r)| (code.to_string(), r))
                .collect(),
        };

        let path = if with_id {
            self.item_path.clone()
        } else {
            self.collection_path.clone()
        };
        self.doc.insert_operation(&path, "patch", operation)
    }

    /// `DELETE /{plural}/{id}` or, with `with_id == false`, `DELETE /{plural}`.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateOperation`](crate::Error::DuplicateOperation).
    pub fn add_delete_doc(&mut self, with_id: bool) -> Result<()> {
        let mut parameters = if with_id {
            vec![Parameter::path_id()]
        } else {
            Vec::new()
        };
        parameters.extend(self.query_parameters(ResourceOperation::Delete));
        parameters.extend(self.context_parameters());

        let target = if with_id { &self.upper_name } else { &self.upper_plural };
        let mut responses = vec![
            (
                "200",
                json_response(
                    &format!("Deleted {target}"),
                    self.page(ResourceOperation::Delete),
                ),
            ),
            ("400", error_response("Bad request")),
        ];
        if with_id {
            responses.push(("404", error_response("Not Found")));
        }
        responses.push(("default", error_response("Unexpected error")));

        let operation = Operation {
            description: if with_id {
                format!("Delete a {} using its id", self.upper_name)
            } else {
                format!("Delete many {}", self.upper_plural)
            },
            operation_id: format!("delete{target}"),
            parameters: dedupe(parameters),
            request_body: None,
            responses: responses
                .into_iter()
                .map(|(code, r)| (code.to_string(), r))
                .collect(),
        };

        let path = if with_id {
            self.item_path.clone()
        } else {
            self.collection_path.clone()
        };
        self.doc.insert_operation(&path, "delete", operation)
    }
}

/// Register a resource and document every operation it offers.
///
/// # Errors
///
/// Any error of [`RestDocBuilder::new`] or [`RestDocBuilder::document_all`].
pub fn document_resource(
    doc: &mut OpenApiDocument,
    schemas: &ResourceSchemas,
    name: &str,
    plural: &str,
    internal: &InternalOptions,
) -> Result<()> {
    RestDocBuilder::new(doc, schemas, name, plural, internal)?.document_all()
}
