//! Request-side runtime shared by the REST and GraphQL transports.
//!
//! - [`RestError`]: the `{ code, message }` error response
//! - [`translate`] / [`kind_to_http_status`]: error kind → HTTP status
//! - [`RequestInfo`] / [`parse_query`] / [`negotiate`]: what the handlers
//!   read from an incoming request

mod error;
mod request;
mod status_map;

pub use error::RestError;
pub use request::{
    is_hal_content, merge_into, negotiate, parse_query, percent_decode, Representation,
    RequestInfo, HAL_MEDIA_TYPE, JSON_MEDIA_TYPE,
};
pub(crate) use request::BODY_LIMIT;
pub use status_map::{kind_to_http_status, status_table, translate, Translation};
