//! Proxy endpoints for the external tool connectors.
//!
//! Each handler performs auth (via the route layer), payload validation,
//! exactly one tool call, and returns JSON. Upstream failures surface as
//! 502 without retry.

use crate::api::ApiError;
use crate::AppState;
use aria_tools::{current_time, EmailRequest, TimeQuery};
use axum::{
    extract::{Extension, Query},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct WeatherRequest {
    pub city: String,
}

/// `POST /api/weather` — one weather lookup for a city.
pub async fn weather_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<WeatherRequest>,
) -> Result<Json<Value>, ApiError> {
    let city = payload.city.trim();
    if city.is_empty() {
        return Err(ApiError::BadRequest("city is required".to_string()));
    }

    let report = state.tools.weather(city).await.map_err(ApiError::from)?;

    Ok(Json(json!({ "city": city, "report": report })))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

/// `POST /api/search` — one web search.
pub async fn search_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<Value>, ApiError> {
    let query = payload.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query is required".to_string()));
    }

    let results = state.tools.search(query).await.map_err(ApiError::from)?;

    Ok(Json(json!({ "query": query, "results": results })))
}

/// `POST /api/email` — sends one email through the configured mailer.
pub async fn email_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<EmailRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.to.trim().is_empty() {
        return Err(ApiError::BadRequest("recipient is required".to_string()));
    }
    if payload.subject.trim().is_empty() {
        return Err(ApiError::BadRequest("subject is required".to_string()));
    }

    let confirmation = state
        .tools
        .send_email(&payload)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(json!({ "status": "sent", "detail": confirmation })))
}

#[derive(Debug, Deserialize)]
pub struct TimeParams {
    pub timezone: Option<String>,
    pub utc_offset_hours: Option<f64>,
}

/// `GET /api/time?timezone=...&utc_offset_hours=...` — current time, local
/// computation only.
///
/// Deployment defaults come from `DEFAULT_TIMEZONE` and
/// `DEFAULT_UTC_OFFSET_HOURS`, consulted when the request gives no usable
/// zone.
pub async fn time_handler(Query(params): Query<TimeParams>) -> Json<Value> {
    let query = TimeQuery {
        timezone: params.timezone,
        utc_offset_hours: params.utc_offset_hours,
        default_timezone: std::env::var("DEFAULT_TIMEZONE").ok(),
        default_utc_offset_hours: std::env::var("DEFAULT_UTC_OFFSET_HOURS")
            .ok()
            .and_then(|v| v.parse().ok()),
    };

    Json(json!({ "time": current_time(&query) }))
}
