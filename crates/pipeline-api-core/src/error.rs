//! Error types shared by every pipeline-api crate.
//!
//! [`PipelineError`] is the request-time error: pipelines return it, the
//! validator raises it, and the transports translate it. Each value carries a
//! stable [`ErrorKind`], a message, free-form `info` metadata and an optional
//! cause, so errors can be nested into a chain and classified by walking
//! [`std::error::Error::source`].
//!
//! [`SchemaError`] covers configuration-time failures with schemas.

use std::error::Error as StdError;
use std::fmt;

use serde_json::{Map, Value};

/// Stable error kind names recognised by the transports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Input does not match the declared schema.
    Validation,
    /// An id-addressed operation matched nothing.
    NotFound,
    /// Duplicate or constraint violation reported by the pipeline.
    Conflict,
    /// The operation is not offered by the pipeline.
    NotImplemented,
    /// The caller is not authenticated.
    Unauthorized,
    /// The caller is not allowed to perform the operation.
    Forbidden,
    /// The resource moved; `info.location` holds the new target.
    MovedPermanently,
    /// Any other, application-defined kind.
    Other(String),
}

impl ErrorKind {
    /// Stable kind name, e.g. `"ValidationError"`.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Validation => "ValidationError",
            Self::NotFound => "NotFoundError",
            Self::Conflict => "ConflictError",
            Self::NotImplemented => "NotImplementedError",
            Self::Unauthorized => "UnauthorizedError",
            Self::Forbidden => "ForbiddenError",
            Self::MovedPermanently => "MovedPermanentlyError",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A request-time failure with a kind, a message, metadata and a cause.
#[derive(Debug)]
pub struct PipelineError {
    kind: ErrorKind,
    message: String,
    info: Map<String, Value>,
    source: Option<BoxError>,
}

impl PipelineError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            info: Map::new(),
            source: None,
        }
    }

    /// A [`ErrorKind::Validation`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// A [`ErrorKind::NotFound`] error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// A [`ErrorKind::Conflict`] error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// A [`ErrorKind::NotImplemented`] error.
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented, message)
    }

    /// A [`ErrorKind::Unauthorized`] error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// A [`ErrorKind::Forbidden`] error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    /// A [`ErrorKind::MovedPermanently`] error pointing at `location`.
    pub fn moved_permanently(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::new(ErrorKind::MovedPermanently, message)
            .with_info("location", Value::String(location.into()))
    }

    /// An application-defined kind.
    pub fn other(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other(kind.into()), message)
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_info(mut self, key: impl Into<String>, value: Value) -> Self {
        self.info.insert(key.into(), value);
        self
    }

    /// Attach a cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Wrap `cause` into a new error of `kind`, keeping it as the source.
    pub fn wrap(kind: ErrorKind, message: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::new(kind, message).with_source(cause)
    }

    /// Kind of this error (not of its causes).
    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Message of this error.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured metadata.
    #[must_use]
    pub fn info(&self) -> &Map<String, Value> {
        &self.info
    }

    /// Iterate this error and every [`PipelineError`] in its cause chain.
    ///
    /// Causes of other error types are skipped but traversal continues
    /// through their own sources.
    pub fn chain(&self) -> impl Iterator<Item = &PipelineError> {
        let mut next: Option<&(dyn StdError + 'static)> = Some(self);
        std::iter::from_fn(move || {
            while let Some(current) = next {
                next = current.source();
                if let Some(found) = current.downcast_ref::<PipelineError>() {
                    return Some(found);
                }
            }
            None
        })
    }

    /// First error in the chain (self included) with the given kind.
    #[must_use]
    pub fn find_cause(&self, kind: &ErrorKind) -> Option<&PipelineError> {
        self.chain().find(|e| e.kind() == kind)
    }

    /// Every message in the full cause chain, joined with `": "`.
    #[must_use]
    pub fn full_message(&self) -> String {
        let mut out = self.to_string();
        let mut next = StdError::source(self);
        while let Some(cause) = next {
            out.push_str(": ");
            out.push_str(&cause.to_string());
            next = cause.source();
        }
        out
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for PipelineError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|s| s as &(dyn StdError + 'static))
    }
}

/// Invalid schema documents.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SchemaError {
    /// The JSON value is not a valid schema node.
    #[error("invalid schema: {0}")]
    Json(#[from] serde_json::Error),

    /// The schema could not be compiled into a validator.
    #[error("cannot compile schema: {0}")]
    Compile(String),

    /// A local `$ref` does not resolve.
    #[error("unresolvable reference '{0}'")]
    UnresolvedReference(String),
}
