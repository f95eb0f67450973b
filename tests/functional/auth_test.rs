//! Functional tests for HTTP Basic authentication

#[path = "../common/mod.rs"]
mod common;

use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        Request, StatusCode,
    },
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use sdapi_gateway::middleware::{auth::AuthLayer, credentials::Credentials};
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_app(list: Option<&str>) -> Router {
    let credentials = Credentials::from_option(list).unwrap();
    Router::new()
        .route("/test", axum::routing::get(|| async { "OK" }))
        .layer(AuthLayer::new(Arc::new(credentials)))
}

fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}

async fn status_with(app: Router, authorization: Option<String>) -> StatusCode {
    let mut builder = Request::builder().uri("/test");
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_auth_with_valid_credentials() {
    let app = create_test_app(Some("alice:secret,bob:hunter2"));
    assert_eq!(status_with(app.clone(), Some(basic("alice", "secret"))).await, StatusCode::OK);
    assert_eq!(status_with(app, Some(basic("bob", "hunter2"))).await, StatusCode::OK);
}

#[tokio::test]
async fn test_auth_with_wrong_password() {
    let app = create_test_app(Some("alice:secret"));
    assert_eq!(
        status_with(app, Some(basic("alice", "wrong"))).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_auth_with_unknown_user() {
    let app = create_test_app(Some("alice:secret"));
    assert_eq!(
        status_with(app, Some(basic("mallory", "secret"))).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_auth_without_header() {
    let app = create_test_app(Some("alice:secret"));
    assert_eq!(status_with(app, None).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_rejects_bearer_scheme() {
    let app = create_test_app(Some("alice:secret"));
    assert_eq!(
        status_with(app, Some("Bearer secret".to_string())).await,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_auth_disabled_when_not_configured() {
    let app = create_test_app(None);
    assert_eq!(status_with(app, None).await, StatusCode::OK);
}

#[tokio::test]
async fn test_rejection_carries_challenge_and_envelope() {
    let gateway = common::gateway_with(|settings, _| {
        settings.api.auth = Some("alice:secret".to_string());
    })
    .await;

    let (status, headers, body) =
        common::send(&gateway.app, common::get_request("/sdapi/v1/samplers")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers.get(WWW_AUTHENTICATE).unwrap(), "Basic");
    assert!(common::process_time(&headers) >= 0.0);
    assert_eq!(body["error"], "AuthenticationFailed");
    assert_eq!(body["body"], "");
    assert!(body["detail"].is_string());
    assert!(body["errors"].is_string());
}

#[tokio::test]
async fn test_authenticated_request_through_gateway() {
    let gateway = common::gateway_with(|settings, _| {
        settings.api.auth = Some("alice:secret".to_string());
    })
    .await;

    let request = Request::builder()
        .uri("/sdapi/v1/samplers")
        .header(AUTHORIZATION, basic("alice", "secret"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = common::send(&gateway.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));
}
