//! REST error response: `{ code, message }` with the translated HTTP status.

use axum::extract::Json;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use pipeline_api_core::PipelineError;

use super::status_map::{translate, Translation};

/// Message sent for errors no well-known kind matches.
const UNHANDLED_MESSAGE: &str = "Internal Server Error";

/// An HTTP error response.
///
/// Serializes as the error envelope:
///
/// ```json
/// { "code": 404, "message": "book:42" }
/// ```
///
/// with a `Location` header for translated `MovedPermanently` errors.
///
/// # Examples
///
/// ```
/// use axum::response::IntoResponse;
/// use pipeline_api::RestError;
/// use pipeline_api_core::PipelineError;
///
/// let err = RestError::from_pipeline(&PipelineError::not_found("book:42"));
/// assert_eq!(err.into_response().status(), axum::http::StatusCode::NOT_FOUND);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestError {
    status: StatusCode,
    message: String,
    location: Option<String>,
}

impl std::fmt::Display for RestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for RestError {}

impl RestError {
    /// An error with an explicit status.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            location: None,
        }
    }

    /// Translate a pipeline error.
    ///
    /// Well-known kinds keep the outermost message; anything else becomes a
    /// generic 500 that does not leak internal detail.
    #[must_use]
    pub fn from_pipeline(error: &PipelineError) -> Self {
        match translate(error) {
            Translation::Known {
                status, location, ..
            } => Self {
                status,
                message: error.message().to_string(),
                location,
            },
            Translation::Unhandled => Self::internal(),
        }
    }

    /// The generic 500 response.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, UNHANDLED_MESSAGE)
    }

    /// Set the `Location` header.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Message sent in the body.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Redirect target, if any.
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

impl From<PipelineError> for RestError {
    fn from(error: PipelineError) -> Self {
        Self::from_pipeline(&error)
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({
            "code": self.status.as_u16(),
            "message": self.message,
        });
        let mut response = (self.status, Json(body)).into_response();
        if let Some(location) = self
            .location
            .as_deref()
            .and_then(|l| HeaderValue::from_str(l).ok())
        {
            response.headers_mut().insert(header::LOCATION, location);
        }
        response
    }
}
