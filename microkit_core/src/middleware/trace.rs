use async_trait::async_trait;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::endpoint::{BoxEndpoint, Endpoint, RequestScope};
use crate::error::AppError;

/// Runs every call inside an `endpoint` span carrying a fresh request id.
pub struct TraceEndpoint<Req, Resp> {
    name: String,
    inner: BoxEndpoint<Req, Resp>,
}

impl<Req, Resp> TraceEndpoint<Req, Resp> {
    pub fn new(name: impl Into<String>, inner: BoxEndpoint<Req, Resp>) -> Self {
        Self {
            name: name.into(),
            inner,
        }
    }
}

#[async_trait]
impl<Req, Resp> Endpoint<Req, Resp> for TraceEndpoint<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn call(&self, scope: RequestScope, request: Req) -> Result<Resp, AppError> {
        let span = info_span!(
            "endpoint",
            endpoint = %self.name,
            subject = %scope.identity.subject,
            request_id = %Uuid::new_v4(),
        );

        let result = self.inner.call(scope, request).instrument(span.clone()).await;

        span.in_scope(|| match &result {
            Ok(_) => tracing::debug!("endpoint call succeeded"),
            Err(e) if e.status_code().is_server_error() => tracing::error!(error = %e, "endpoint call failed"),
            Err(e) => tracing::info!(error = %e, "endpoint call rejected"),
        });

        result
    }
}
