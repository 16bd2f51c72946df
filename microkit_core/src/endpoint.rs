//! The endpoint abstraction every pipeline layer implements and wraps.

use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use std::future::Future;
use std::sync::Arc;

use crate::auth::Identity;
use crate::error::AppError;

pub const NO_CACHE_HEADER: &str = "x-no-cache";

/// Per-request routing facts used by the cache layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointContext {
    pub cacheable: bool,
    pub key: String,
    pub bypass_cache: bool,
}

impl EndpointContext {
    pub fn new(cacheable: bool, key: impl Into<String>, bypass_cache: bool) -> Self {
        Self {
            cacheable,
            key: key.into(),
            bypass_cache,
        }
    }

    /// Only `GET` requests are cacheable. `X-No-Cache: true` skips the cache
    /// read but still refreshes the entry.
    pub fn from_parts(method: &Method, path: &str, headers: &HeaderMap) -> Self {
        let bypass_cache = headers
            .get(NO_CACHE_HEADER)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == "true");

        Self::new(method == Method::GET, path, bypass_cache)
    }
}

/// Everything an endpoint knows about the caller, passed explicitly through
/// every layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestScope {
    pub identity: Identity,
    pub endpoint: EndpointContext,
}

impl RequestScope {
    pub fn new(identity: Identity, endpoint: EndpointContext) -> Self {
        Self { identity, endpoint }
    }
}

/// One step of a pipeline: a business operation or a middleware wrapping
/// the next step.
#[async_trait]
pub trait Endpoint<Req, Resp>: Send + Sync {
    async fn call(&self, scope: RequestScope, request: Req) -> Result<Resp, AppError>;
}

pub type BoxEndpoint<Req, Resp> = Arc<dyn Endpoint<Req, Resp>>;

/// Adapts an async closure into an [`Endpoint`].
pub struct FnEndpoint<F> {
    f: F,
}

pub fn endpoint_fn<F>(f: F) -> FnEndpoint<F> {
    FnEndpoint { f }
}

#[async_trait]
impl<F, Fut, Req, Resp> Endpoint<Req, Resp> for FnEndpoint<F>
where
    F: Fn(RequestScope, Req) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Resp, AppError>> + Send,
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn call(&self, scope: RequestScope, request: Req) -> Result<Resp, AppError> {
        (self.f)(scope, request).await
    }
}
