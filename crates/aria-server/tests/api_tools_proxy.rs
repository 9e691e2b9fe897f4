//! The weather/search/email proxy endpoints: validation, single-call
//! dispatch, and upstream error mapping.

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
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

/// Tools with scriptable failures and call counters.
#[derive(Default)]
struct ScriptedTools {
    weather_calls: AtomicUsize,
    search_calls: AtomicUsize,
    email_calls: AtomicUsize,
    weather_error: Option<fn(&str) -> ToolError>,
}

#[async_trait]
impl ToolSuite for ScriptedTools {
    async fn weather(&self, city: &str) -> Result<String, ToolError> {
        self.weather_calls.fetch_add(1, Ordering::SeqCst);
        match self.weather_error {
            Some(make_error) => Err(make_error(city)),
            None => Ok(format!("{}: drizzle, 12°C, wind 14.0 km/h", city)),
        }
    }
    async fn search(&self, query: &str) -> Result<String, ToolError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("Top hit — everything about {}", query))
    }
    async fn send_email(&self, request: &EmailRequest) -> Result<String, ToolError> {
        self.email_calls.fetch_add(1, Ordering::SeqCst);
        if request.to == "broken@example.com" {
            return Err(ToolError::Upstream {
                service: "gmail",
                status: 500,
            });
        }
        Ok(format!("Email sent successfully to {}", request.to))
    }
}

fn proxy_app(tools: Arc<ScriptedTools>) -> Router {
    let mut config = Config::default();
    config.auth.token = "secret-token".to_string();
    config.rate_limit.capacity = 10_000.0;
    config.rate_limit.refill_rate = 10_000.0;

    let state = AppState::new(&config, tools, FeatureFlags::default());
    app(state, &config)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", "Bearer secret-token")
        .header("content-type", "application/json")
        .extension(ConnectInfo(
            "127.0.0.1:50000".parse::<SocketAddr>().expect("valid addr"),
        ))
        .body(Body::from(body.to_string()))
        .expect("request build failed")
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body read failed");
    serde_json::from_slice(&body).expect("non-JSON body")
}

#[tokio::test]
async fn weather_proxy_makes_exactly_one_call() {
    let tools = Arc::new(ScriptedTools::default());
    let app = proxy_app(tools.clone());

    let response = app
        .oneshot(post("/api/weather", json!({ "city": "Kisumu" })))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["city"], "Kisumu");
    assert!(json["report"].as_str().unwrap().contains("Kisumu"));
    assert_eq!(tools.weather_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_city_is_rejected_before_dispatch() {
    let tools = Arc::new(ScriptedTools::default());
    let app = proxy_app(tools.clone());

    let response = app
        .oneshot(post("/api/weather", json!({ "city": "   " })))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(tools.weather_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_city_maps_to_404() {
    let tools = Arc::new(ScriptedTools {
        weather_error: Some(|city| ToolError::NotFound(city.to_string())),
        ..ScriptedTools::default()
    });
    let app = proxy_app(tools);

    let response = app
        .oneshot(post("/api/weather", json!({ "city": "Atlantis" })))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upstream_weather_failure_maps_to_502_without_retry() {
    let tools = Arc::new(ScriptedTools {
        weather_error: Some(|_| ToolError::Upstream {
            service: "open-meteo",
            status: 503,
        }),
        ..ScriptedTools::default()
    });
    let app = proxy_app(tools.clone());

    let response = app
        .oneshot(post("/api/weather", json!({ "city": "Oslo" })))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        tools.weather_calls.load(Ordering::SeqCst),
        1,
        "the endpoint layer must not retry"
    );
}

#[tokio::test]
async fn search_proxy_echoes_query() {
    let tools = Arc::new(ScriptedTools::default());
    let app = proxy_app(tools.clone());

    let response = app
        .oneshot(post("/api/search", json!({ "query": "axum middleware" })))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["query"], "axum middleware");
    assert!(json["results"].as_str().unwrap().contains("axum middleware"));
    assert_eq!(tools.search_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn email_proxy_validates_then_sends_once() {
    let tools = Arc::new(ScriptedTools::default());
    let app = proxy_app(tools.clone());

    let response = app
        .clone()
        .oneshot(post(
            "/api/email",
            json!({ "to": "friend@example.com", "subject": "Hi", "message": "Hello!" }),
        ))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(tools.email_calls.load(Ordering::SeqCst), 1);

    let missing_subject = app
        .oneshot(post(
            "/api/email",
            json!({ "to": "friend@example.com", "subject": " ", "message": "Hello!" }),
        ))
        .await
        .expect("request failed");
    assert_eq!(missing_subject.status(), StatusCode::BAD_REQUEST);
    assert_eq!(tools.email_calls.load(Ordering::SeqCst), 1, "no dispatch on 400");
}

#[tokio::test]
async fn time_endpoint_is_public_and_honors_offset() {
    let tools = Arc::new(ScriptedTools::default());
    let app = proxy_app(tools);

    let request = Request::builder()
        .uri("/api/time?utc_offset_hours=9")
        .extension(ConnectInfo(
            "127.0.0.1:50001".parse::<SocketAddr>().expect("valid addr"),
        ))
        .body(Body::empty())
        .expect("request build failed");
    let response = app.oneshot(request).await.expect("request failed");
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    let time = json["time"].as_str().expect("time missing");
    assert!(time.contains("+0900"), "got {}", time);
}

#[tokio::test]
async fn email_upstream_failure_maps_to_502() {
    let tools = Arc::new(ScriptedTools::default());
    let app = proxy_app(tools);

    let response = app
        .oneshot(post(
            "/api/email",
            json!({ "to": "broken@example.com", "subject": "Hi", "message": "Hello!" }),
        ))
        .await
        .expect("request failed");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
