//! Request gates in front of the REST routes.
//!
//! A request the API does not serve (an `Accept` header naming neither JSON
//! nor HAL, or a root index request without the HAL content type) is not
//! answered here. It is handed to the router given to
//! [`Api::router_with_fallback`](crate::Api::router_with_fallback), as if the
//! route had never matched.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use crate::runtime::{is_hal_content, negotiate};

/// Resource routes: run the handler with the negotiated
/// [`Representation`](crate::Representation) as a request extension.
pub(crate) async fn negotiated(
    State(next): State<Router>,
    mut request: Request,
    run: Next,
) -> Response {
    match negotiate(request.headers()) {
        Some(representation) => {
            request.extensions_mut().insert(representation);
            run.run(request).await
        }
        None => pass(next, request).await,
    }
}

/// Root index: only HAL requests.
pub(crate) async fn hal_only(State(next): State<Router>, request: Request, run: Next) -> Response {
    if is_hal_content(request.headers()) {
        run.run(request).await
    } else {
        pass(next, request).await
    }
}

async fn pass(next: Router, request: Request) -> Response {
    tracing::debug!(method = %request.method(), uri = %request.uri(), "passing request through");
    match next.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}
