use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::auth::{AuthError, Identity};
use crate::endpoint::{EndpointContext, RequestScope};
use crate::error::AppError;
use crate::service::ServiceContext;

/// Verifies the bearer token and stores the caller's [`Identity`] in the
/// request extensions.
pub async fn token_auth_middleware(
    State(context): State<ServiceContext>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = match request.headers().get(AUTHORIZATION) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| AuthError::MalformedHeader)?
                .to_string(),
        ),
        None => None,
    };

    let identity = context.verifier().verify(header.as_deref()).await?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Enforces `(subject, request path, request method)` against the policy
/// oracle. Must run inside [`token_auth_middleware`].
pub async fn route_authorization_middleware(
    State(context): State<ServiceContext>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let subject = request
        .extensions()
        .get::<Identity>()
        .map(|identity| identity.subject.clone())
        .ok_or(AppError::Authentication(AuthError::MissingHeader))?;
    let path = request.uri().path().to_string();
    let method = request.method().as_str().to_string();

    let allowed = context
        .oracle()
        .enforce(&subject, &path, &method)
        .await
        .map_err(|e| AppError::Enforcement(e.to_string()))?;

    if !allowed {
        tracing::info!(subject = %subject, path = %path, method = %method, "route access denied");
        return Err(AppError::NotAuthorized);
    }

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestScope
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(AppError::Authentication(AuthError::MissingHeader))?;

        let endpoint = EndpointContext::from_parts(&parts.method, parts.uri.path(), &parts.headers);
        Ok(RequestScope::new(identity, endpoint))
    }
}
