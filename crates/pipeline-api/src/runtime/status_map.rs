//! Error kind → HTTP status mapping.

use axum::http::StatusCode;
use pipeline_api_core::{ErrorKind, PipelineError};

/// Well-known kinds and their HTTP status, in lookup order.
///
/// Translation scans this table top to bottom and stops at the first kind
/// found anywhere in the cause chain, so a `NotFound` wrapping a
/// `Validation` still answers 400.
#[must_use]
pub fn status_table() -> [(ErrorKind, StatusCode); 7] {
    [
        (ErrorKind::Validation, StatusCode::BAD_REQUEST),
        (ErrorKind::NotFound, StatusCode::NOT_FOUND),
        (ErrorKind::Conflict, StatusCode::CONFLICT),
        (ErrorKind::NotImplemented, StatusCode::METHOD_NOT_ALLOWED),
        (ErrorKind::Unauthorized, StatusCode::UNAUTHORIZED),
        (ErrorKind::Forbidden, StatusCode::FORBIDDEN),
        (ErrorKind::MovedPermanently, StatusCode::MOVED_PERMANENTLY),
    ]
}

/// HTTP status of a single kind, ignoring any chain.
///
/// # Examples
///
/// ```
/// use pipeline_api::kind_to_http_status;
/// use pipeline_api_core::ErrorKind;
///
/// assert_eq!(kind_to_http_status(&ErrorKind::NotFound).map(|s| s.as_u16()), Some(404));
/// assert_eq!(kind_to_http_status(&ErrorKind::Other("Boom".into())), None);
/// ```
#[must_use]
pub fn kind_to_http_status(kind: &ErrorKind) -> Option<StatusCode> {
    status_table()
        .into_iter()
        .find_map(|(known, status)| (known == *kind).then_some(status))
}

/// Outcome of [`translate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// A well-known kind was found in the chain.
    Known {
        /// Matched kind.
        kind: ErrorKind,
        /// HTTP status for it.
        status: StatusCode,
        /// Redirect target, for [`ErrorKind::MovedPermanently`] causes that carry one.
        location: Option<String>,
    },
    /// No well-known kind anywhere in the chain.
    Unhandled,
}

/// Classify `error` by the first table entry present in its cause chain.
///
/// For `MovedPermanently` the `location` entry of the matched cause's
/// `info` becomes the redirect target.
#[must_use]
pub fn translate(error: &PipelineError) -> Translation {
    for (kind, status) in status_table() {
        let Some(cause) = error.find_cause(&kind) else {
            continue;
        };
        let location = if kind == ErrorKind::MovedPermanently {
            cause
                .info()
                .get("location")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        } else {
            None
        };
        return Translation::Known {
            kind,
            status,
            location,
        };
    }
    Translation::Unhandled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustive_kind_to_http_mapping() {
        let cases: &[(ErrorKind, u16)] = &[
            (ErrorKind::Validation, 400),
            (ErrorKind::NotFound, 404),
            (ErrorKind::Conflict, 409),
            (ErrorKind::NotImplemented, 405),
            (ErrorKind::Unauthorized, 401),
            (ErrorKind::Forbidden, 403),
            (ErrorKind::MovedPermanently, 301),
        ];
        for (kind, expected) in cases {
            assert_eq!(
                kind_to_http_status(kind).map(|s| s.as_u16()),
                Some(*expected),
                "{kind} should map to HTTP {expected}",
            );
        }
        assert_eq!(cases.len(), status_table().len());
    }

    #[test]
    fn other_kinds_are_unhandled() {
        let err = PipelineError::other("DatabaseError", "connection reset");
        assert_eq!(translate(&err), Translation::Unhandled);
        assert_eq!(kind_to_http_status(err.kind()), None);
    }

    #[test]
    fn matches_anywhere_in_the_chain() {
        let err = PipelineError::other("ApiError", "request failed")
            .with_source(PipelineError::not_found("book:1"));
        assert_eq!(
            translate(&err),
            Translation::Known {
                kind: ErrorKind::NotFound,
                status: StatusCode::NOT_FOUND,
                location: None,
            }
        );
    }

    #[test]
    fn table_order_wins_over_chain_depth() {
        let err = PipelineError::not_found("outer")
            .with_source(PipelineError::validation("inner"));
        assert!(matches!(
            translate(&err),
            Translation::Known { status, .. } if status == StatusCode::BAD_REQUEST
        ));
    }

    #[test]
    fn moved_permanently_carries_location() {
        let err = PipelineError::other("ApiError", "moved")
            .with_source(PipelineError::moved_permanently("moved", "/books/2"));
        assert_eq!(
            translate(&err),
            Translation::Known {
                kind: ErrorKind::MovedPermanently,
                status: StatusCode::MOVED_PERMANENTLY,
                location: Some("/books/2".to_string()),
            }
        );

        let bare = PipelineError::new(ErrorKind::MovedPermanently, "moved");
        assert!(matches!(
            translate(&bare),
            Translation::Known { location: None, .. }
        ));
    }
}
