mod common;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{Request, StatusCode},
    routing::get,
    Json, Router,
};
use common::*;
use microkit_core::config::AppConfig;
use microkit_core::policy::{default_policies, PolicySet, RoleAssignment};
use microkit_core::{
    endpoint_fn, secure_router, AppError, BoxEndpoint, InMemoryPolicyOracle, MemoryCacheStore,
    RequestScope, ServiceContext,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

#[derive(Clone)]
struct TestState {
    get_app_data: BoxEndpoint<(), Value>,
}

async fn app_data(
    State(state): State<TestState>,
    scope: RequestScope,
) -> Result<Json<Value>, AppError> {
    Ok(Json(state.get_app_data.call(scope, ()).await?))
}

async fn app(config: AppConfig, counter: Counter) -> Router {
    let oracle = InMemoryPolicyOracle::from_set(PolicySet {
        policies: default_policies(),
        roles: vec![RoleAssignment {
            subject: "u1".to_string(),
            role: "user".to_string(),
        }],
        default_roles: vec![],
    })
    .await
    .unwrap();

    let store = Arc::new(MemoryCacheStore::new(&config.cache));
    let context = ServiceContext::new(config, verifier(), Arc::new(oracle)).with_cache_store(store);

    let get_app_data = context
        .pipeline("get-app-data")
        .with_config(cacheable_config())
        .build(endpoint_fn(move |scope: RequestScope, _req: ()| {
            let counter = counter.clone();
            async move {
                Ok::<_, AppError>(json!({
                    "subject": scope.identity.subject,
                    "path": scope.endpoint.key,
                    "call": counter.bump(),
                }))
            }
        }))
        .await
        .unwrap();

    let router = Router::new()
        .route("/user/app", get(app_data))
        .route("/reports", get(app_data))
        .with_state(TestState { get_app_data });

    secure_router(router, context)
}

fn request(path: &str, authorization: Option<String>) -> Request<Body> {
    let mut builder = Request::builder().uri(path);
    if let Some(value) = authorization {
        builder = builder.header("Authorization", value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_authenticated_request_reaches_endpoint() {
    let counter = Counter::default();
    let app = app(app_config(), counter.clone()).await;

    let response = app
        .oneshot(request("/user/app", Some(bearer("u1"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "subject": "u1", "path": "/user/app", "call": 1 })
    );
    assert_eq!(counter.calls(), 1);
}

#[tokio::test]
async fn test_missing_and_malformed_headers_are_rejected() {
    let counter = Counter::default();
    let app = app(app_config(), counter.clone()).await;

    let response = app.clone().oneshot(request("/user/app", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "ERR-001:authorization header is empty" })
    );

    let response = app
        .oneshot(request("/user/app", Some("Token abc".to_string())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(counter.calls(), 0);
}

#[tokio::test]
async fn test_unknown_kid_never_reaches_operation() {
    let counter = Counter::default();
    let app = app(app_config(), counter.clone()).await;

    let token = token_for("u1", "rotated-away");
    let response = app
        .oneshot(request("/user/app", Some(format!("Bearer {}", token))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "ERR-003:jwk key rotated-away not found" })
    );
    assert_eq!(counter.calls(), 0);
}

#[tokio::test]
async fn test_subject_without_role_is_forbidden() {
    let counter = Counter::default();
    let app = app(app_config(), counter.clone()).await;

    let response = app
        .oneshot(request("/user/app", Some(bearer("u9"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "ERR-102:user not authorised" })
    );
    assert_eq!(counter.calls(), 0);
}

#[tokio::test]
async fn test_route_authorization() {
    let counter = Counter::default();
    let mut config = app_config();
    config.server.route_authorization = true;
    let app = app(config, counter.clone()).await;

    let response = app
        .clone()
        .oneshot(request("/user/app", Some(bearer("u1"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // no route rule covers /reports
    let response = app
        .oneshot(request("/reports", Some(bearer("u1"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(counter.calls(), 1);
}

#[tokio::test]
async fn test_no_cache_header_over_http() {
    let counter = Counter::default();
    let app = app(app_config(), counter.clone()).await;

    let first = body_json(
        app.clone()
            .oneshot(request("/user/app", Some(bearer("u1"))))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(first["call"], 1);

    // let the background write land
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let cached = body_json(
        app.clone()
            .oneshot(request("/user/app", Some(bearer("u1"))))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(cached, first);

    let mut bypass = request("/user/app", Some(bearer("u1")));
    bypass
        .headers_mut()
        .insert("X-No-Cache", "true".parse().unwrap());
    let fresh = body_json(app.oneshot(bypass).await.unwrap()).await;
    assert_eq!(fresh["call"], 2);
    assert_eq!(counter.calls(), 2);
}
