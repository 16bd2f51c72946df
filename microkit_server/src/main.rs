//! Main entry point for the demo service binary

use anyhow::Result;
use axum::{extract::State, routing::get, Json, Router};
use microkit_core::metrics::MetricsSnapshot;
use microkit_core::policy::default_policies;
use microkit_core::{
    endpoint_fn, run_server, secure_router, AppConfig, AppError, BoxEndpoint, PolicySet,
    RequestScope, ServiceContext, StaticPolicySource,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const GET_APP_DATA: &str = "get-app-data";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AppData {
    service: String,
    subject: String,
    path: String,
}

#[derive(Clone)]
struct AppState {
    context: ServiceContext,
    get_app_data: BoxEndpoint<(), AppData>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let policies = Arc::new(StaticPolicySource::new(PolicySet {
        policies: default_policies(),
        roles: vec![],
        default_roles: vec!["user".to_string()],
    }));
    let context = ServiceContext::from_config(config, policies).await?;

    let service_name = context.config().server.service_name.clone();
    let get_app_data = context
        .pipeline(GET_APP_DATA)
        .build(endpoint_fn(move |scope: RequestScope, _request: ()| {
            let service = service_name.clone();
            async move {
                Ok::<_, AppError>(AppData {
                    service,
                    subject: scope.identity.subject,
                    path: scope.endpoint.key,
                })
            }
        }))
        .await?;

    let state = AppState {
        context: context.clone(),
        get_app_data,
    };

    let router = Router::new()
        .route("/user/app", get(app_data_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    run_server(secure_router(router, context), addr).await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn app_data_handler(
    State(state): State<AppState>,
    scope: RequestScope,
) -> Result<Json<AppData>, AppError> {
    let data = state.get_app_data.call(scope, ()).await?;
    Ok(Json(data))
}

async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.context.metrics().get_snapshot())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if cfg!(debug_assertions) { "debug" } else { "info" };

        format!(
            "{}={},microkit_core={},tower_http=debug",
            env!("CARGO_CRATE_NAME").replace('-', "_"),
            default_level,
            default_level
        )
        .into()
    });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
