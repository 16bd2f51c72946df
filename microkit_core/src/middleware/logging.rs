//! HTTP request logging

use axum::{body::Body, Router};
use http::{Request, Response, StatusCode};
use std::time::Duration;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::trace::TraceLayer;
use tracing::{info_span, Span};

/// Wraps every route of `router` in an `http_request` span and logs the
/// outcome of each request.
pub fn with_request_logging(router: Router) -> Router {
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &Request<Body>| {
                info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    no_cache = request.headers().contains_key(crate::endpoint::NO_CACHE_HEADER),
                )
            })
            .on_request(|_request: &Request<Body>, _span: &Span| {
                tracing::debug!("started processing request");
            })
            .on_response(|response: &Response<Body>, latency: Duration, _span: &Span| {
                log_status(response.status(), latency);
            })
            .on_failure(|error: ServerErrorsFailureClass, latency: Duration, _span: &Span| {
                tracing::error!(latency_ms = latency.as_millis() as u64, error = %error, "request failed");
            }),
    )
}

fn log_status(status: StatusCode, latency: Duration) {
    let latency_ms = latency.as_millis() as u64;

    match status.as_u16() {
        401 | 403 => tracing::info!(status = status.as_u16(), latency_ms, "request rejected"),
        429 | 503 => tracing::warn!(status = status.as_u16(), latency_ms, "request shed"),
        _ if status.is_server_error() => {
            tracing::error!(status = status.as_u16(), latency_ms, "server error response")
        }
        _ if status.is_client_error() => {
            tracing::warn!(status = status.as_u16(), latency_ms, "client error response")
        }
        _ => tracing::info!(status = status.as_u16(), latency_ms, "request completed"),
    }
}
