//! Authenticated, policy-gated, cache-aside middleware for HTTP microservice
//! endpoints.

pub mod auth;
pub mod cache;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod pipeline;
pub mod policy;
pub mod service;

pub use auth::{AuthError, HttpKeySetFetcher, Identity, KeySetFetcher, StaticKeySet, TokenVerifier};
pub use cache::{CacheError, CacheStore, CacheabilityRecord, EndpointCache, MemoryCacheStore};
pub use config::AppConfig;
pub use endpoint::{endpoint_fn, BoxEndpoint, Endpoint, EndpointContext, RequestScope};
pub use error::{AppError, Result};
pub use metrics::{LatencyRecorder, MetricsCollector};
pub use pipeline::PipelineBuilder;
pub use policy::{InMemoryPolicyOracle, Policy, PolicyOracle, PolicySet, StaticPolicySource};
pub use service::ServiceContext;

use axum::{middleware as axum_middleware, Router};
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};

/// Puts token verification (and, when configured, route-level policy
/// checks) in front of every route, with request logging outermost.
pub fn secure_router(router: Router, context: ServiceContext) -> Router {
    let mut router = router;

    if context.config().server.route_authorization {
        router = router.layer(axum_middleware::from_fn_with_state(
            context.clone(),
            middleware::route_authorization_middleware,
        ));
    }

    let router = router.layer(axum_middleware::from_fn_with_state(
        context,
        middleware::token_auth_middleware,
    ));

    middleware::with_request_logging(router)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Configuration(format!("cannot bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Other(e.into()))?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
