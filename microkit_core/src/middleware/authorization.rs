use async_trait::async_trait;
use std::sync::Arc;

use crate::endpoint::{BoxEndpoint, Endpoint, RequestScope};
use crate::error::AppError;
use crate::policy::PolicyOracle;

/// Asks the policy oracle whether the caller may invoke the named operation.
pub struct AuthorizationEndpoint<Req, Resp> {
    name: String,
    oracle: Arc<dyn PolicyOracle>,
    inner: BoxEndpoint<Req, Resp>,
}

impl<Req, Resp> AuthorizationEndpoint<Req, Resp> {
    pub fn new(
        name: impl Into<String>,
        oracle: Arc<dyn PolicyOracle>,
        inner: BoxEndpoint<Req, Resp>,
    ) -> Self {
        Self {
            name: name.into(),
            oracle,
            inner,
        }
    }
}

#[async_trait]
impl<Req, Resp> Endpoint<Req, Resp> for AuthorizationEndpoint<Req, Resp>
where
    Req: Send + 'static,
    Resp: Send + 'static,
{
    async fn call(&self, scope: RequestScope, request: Req) -> Result<Resp, AppError> {
        let subject = &scope.identity.subject;
        tracing::debug!(endpoint = %self.name, subject = %subject, "authorizing");

        let allowed = self
            .oracle
            .enforce(subject, &self.name, "*")
            .await
            .map_err(|e| AppError::Enforcement(e.to_string()))?;

        if !allowed {
            tracing::info!(endpoint = %self.name, subject = %subject, "access denied");
            return Err(AppError::NotAuthorized);
        }

        self.inner.call(scope, request).await
    }
}
