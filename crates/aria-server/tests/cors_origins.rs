//! CORS allow-list behavior on preflight requests.

use aria_server::{app, config::Config, AppState};
use aria_tools::{EmailRequest, ToolError, ToolSuite};
use aria_types::FeatureFlags;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

struct StubTools;

#[async_trait]
impl ToolSuite for StubTools {
    async fn weather(&self, city: &str) -> Result<String, ToolError> {
        Ok(format!("{}: clear", city))
    }
    async fn search(&self, query: &str) -> Result<String, ToolError> {
        Ok(format!("results for {}", query))
    }
    async fn send_email(&self, request: &EmailRequest) -> Result<String, ToolError> {
        Ok(format!("sent to {}", request.to))
    }
}

fn cors_app(extra_origins: &[&str]) -> Router {
    let mut config = Config::default();
    config.auth.token = "secret-token".to_string();
    config.cors.allowed_origins = extra_origins.iter().map(|s| s.to_string()).collect();

    let state = AppState::new(&config, Arc::new(StubTools), FeatureFlags::default());
    app(state, &config)
}

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/weather")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())
        .expect("request build failed")
}

#[tokio::test]
async fn builtin_localhost_origin_is_allowed() {
    let app = cors_app(&[]);
    let response = app
        .oneshot(preflight("http://localhost:3000"))
        .await
        .expect("request failed");

    assert_eq!(response.status(), StatusCode::OK);
    let allow_origin = response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .and_then(|v| v.to_str().ok());
    assert_eq!(allow_origin, Some("http://localhost:3000"));
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );
}

#[tokio::test]
async fn configured_extra_origin_is_allowed() {
    let app = cors_app(&["https://app.example.com"]);
    let response = app
        .oneshot(preflight("https://app.example.com"))
        .await
        .expect("request failed");

    let allow_origin = response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .and_then(|v| v.to_str().ok());
    assert_eq!(allow_origin, Some("https://app.example.com"));
}

#[tokio::test]
async fn unlisted_origin_gets_no_cors_grant() {
    let app = cors_app(&["https://app.example.com"]);
    let response = app
        .oneshot(preflight("https://evil.example.net"))
        .await
        .expect("request failed");

    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none(),
        "unlisted origins must not be granted"
    );
}

#[tokio::test]
async fn preflight_advertises_max_age() {
    let app = cors_app(&[]);
    let response = app
        .oneshot(preflight("http://localhost:3000"))
        .await
        .expect("request failed");

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_MAX_AGE)
            .and_then(|v| v.to_str().ok()),
        Some("3600")
    );
}
