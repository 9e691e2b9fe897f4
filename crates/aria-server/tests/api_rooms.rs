//! Room creation and LiveKit token issuance.

use aria_server::{app, config::Config, AppState};
use aria_tools::{EmailRequest, ToolError, ToolSuite};
use aria_types::FeatureFlags;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::net::SocketAddr;
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

fn rooms_app(with_livekit: bool) -> Router {
    let mut config = Config::default();
    config.auth.token = "secret-token".to_string();
    if with_livekit {
        config.livekit.url = "http://localhost:7880".to_string();
        config.livekit.api_key = "devkey".to_string();
        config.livekit.api_secret = "devsecret-devsecret-devsecret-00".to_string();
    }

    let state = AppState::new(&config, Arc::new(StubTools), FeatureFlags::default());
    app(state, &config)
}

fn with_ip(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.extension(ConnectInfo(
        "127.0.0.1:50000".parse::<SocketAddr>().expect("valid addr"),
    ))
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body read failed");
    serde_json::from_slice(&body).expect("non-JSON body")
}

#[tokio::test]
async fn create_room_returns_platform_format_name() {
    let app = rooms_app(true);
    let request = with_ip(Request::builder().method("POST").uri("/create-room"))
        .body(Body::empty())
        .expect("request build failed");
    let response = app.oneshot(request).await.expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    let room_name = json["room_name"].as_str().expect("room_name missing");
    assert!(room_name.starts_with("room-"));
    assert_eq!(room_name.len(), "room-".len() + 8);
    assert_eq!(json["livekit_url"], "http://localhost:7880");
}

#[tokio::test]
async fn token_requires_room_name() {
    let app = rooms_app(true);
    let request = with_ip(Request::builder().uri("/token"))
        .body(Body::empty())
        .expect("request build failed");
    let response = app.oneshot(request).await.expect("request failed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().contains("roomName"));
}

#[tokio::test]
async fn token_is_issued_with_default_identity() {
    let app = rooms_app(true);
    let request = with_ip(Request::builder().uri("/token?roomName=room-abc12345"))
        .body(Body::empty())
        .expect("request build failed");
    let response = app.oneshot(request).await.expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    let token = json["token"].as_str().expect("token missing");
    assert_eq!(token.split('.').count(), 3, "expected a JWT");
    let identity = json["identity"].as_str().expect("identity missing");
    assert!(identity.starts_with("user-"), "got identity {}", identity);
}

#[tokio::test]
async fn token_honors_explicit_identity() {
    let app = rooms_app(true);
    let request = with_ip(Request::builder().uri("/token?roomName=room-abc12345&identity=kai"))
        .body(Body::empty())
        .expect("request build failed");
    let response = app.oneshot(request).await.expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["identity"], "kai");
}

#[tokio::test]
async fn token_unavailable_without_livekit() {
    let app = rooms_app(false);
    let request = with_ip(Request::builder().uri("/token?roomName=room-abc12345"))
        .body(Body::empty())
        .expect("request build failed");
    let response = app.oneshot(request).await.expect("request failed");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
