//! Current-weather lookups.
//!
//! Primary provider is Open-Meteo (free, no API key): the city is geocoded
//! first, then current conditions are fetched for the coordinates. When the
//! primary chain fails, wttr.in's JSON endpoint is tried as a fallback.
//! Transient upstream statuses (429 and 5xx) are retried a bounded number of
//! times with capped, jittered backoff; everything else is a single attempt.

use crate::error::ToolError;
use serde_json::Value;
use std::time::Duration;

/// HTTP timeout for each weather request.
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Attempts per provider request (first try included).
const MAX_ATTEMPTS: u32 = 3;

/// Backoff ceiling between attempts.
const BACKOFF_CAP: Duration = Duration::from_secs(8);

const GEOCODE_BASE: &str = "https://geocoding-api.open-meteo.com";
const FORECAST_BASE: &str = "https://api.open-meteo.com";
const FALLBACK_BASE: &str = "https://wttr.in";

/// Weather lookup client.
#[derive(Debug, Clone)]
pub struct WeatherService {
    http: reqwest::Client,
    geocode_base: String,
    forecast_base: String,
    fallback_base: String,
    /// Unit of backoff time; scaled down in tests.
    backoff_unit: Duration,
}

impl Default for WeatherService {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherService {
    pub fn new() -> Self {
        Self::with_bases(GEOCODE_BASE, FORECAST_BASE, FALLBACK_BASE)
    }

    /// Builds a service pointed at alternate provider hosts.
    pub fn with_bases(
        geocode_base: impl Into<String>,
        forecast_base: impl Into<String>,
        fallback_base: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .user_agent(concat!("aria-tools/", env!("CARGO_PKG_VERSION"), " (weather)"))
                .build()
                .unwrap_or_default(),
            geocode_base: geocode_base.into(),
            forecast_base: forecast_base.into(),
            fallback_base: fallback_base.into(),
            backoff_unit: Duration::from_secs(1),
        }
    }

    /// Overrides the backoff unit. Tests use a millisecond unit so the
    /// transient-retry path completes quickly.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Returns a one-line current-weather summary for `city`.
    ///
    /// The summary always names the city. An unknown city yields
    /// [`ToolError::NotFound`]; an empty city yields
    /// [`ToolError::InvalidInput`].
    pub async fn current_weather(&self, city: &str) -> Result<String, ToolError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(ToolError::InvalidInput(
                "city is required to fetch weather".to_string(),
            ));
        }

        match self.open_meteo(city).await {
            Ok(summary) => Ok(summary),
            // An unknown city will not become known by asking another
            // provider; surface it directly.
            Err(ToolError::NotFound(city)) => Err(ToolError::NotFound(city)),
            Err(primary_err) => {
                tracing::warn!(
                    city = %city,
                    "primary weather provider failed: {}; falling back to wttr.in",
                    primary_err
                );
                self.wttr(city).await
            }
        }
    }

    /// Geocode the city, then fetch current conditions from Open-Meteo.
    async fn open_meteo(&self, city: &str) -> Result<String, ToolError> {
        let geo_url = format!(
            "{}/v1/search?name={}&count=1&language=en&format=json",
            self.geocode_base,
            urlencode(city)
        );
        let geo: Value = self.get_json("geocoding", &geo_url).await?;

        let results = geo.get("results").and_then(Value::as_array);
        let first = match results.and_then(|r| r.first()) {
            Some(entry) => entry,
            None => return Err(ToolError::NotFound(city.to_string())),
        };
        let lat = first
            .get("latitude")
            .and_then(Value::as_f64)
            .ok_or_else(|| ToolError::Parse("geocoding result missing latitude".to_string()))?;
        let lon = first
            .get("longitude")
            .and_then(Value::as_f64)
            .ok_or_else(|| ToolError::Parse("geocoding result missing longitude".to_string()))?;

        let weather_url = format!(
            "{}/v1/forecast?latitude={}&longitude={}&current_weather=true&timezone=auto",
            self.forecast_base, lat, lon
        );
        let wx: Value = self.get_json("open-meteo", &weather_url).await?;

        let current = wx
            .get("current_weather")
            .ok_or_else(|| ToolError::Parse("forecast missing current_weather".to_string()))?;
        let temp_c = current.get("temperature").and_then(Value::as_f64);
        let wind_kph = current.get("windspeed").and_then(Value::as_f64);
        let code = current.get("weathercode").and_then(Value::as_i64);

        let summary = format!(
            "{}: {}, {}°C, wind {} km/h",
            city,
            code.map_or_else(|| "conditions unavailable".to_string(), describe_wmo_code),
            temp_c.map_or_else(|| "?".to_string(), |t| format!("{:.0}", t)),
            wind_kph.map_or_else(|| "?".to_string(), |w| format!("{:.1}", w)),
        );
        tracing::info!(city = %city, "weather lookup succeeded");
        Ok(summary)
    }

    /// wttr.in fallback: one JSON call carrying the full current condition.
    async fn wttr(&self, city: &str) -> Result<String, ToolError> {
        let url = format!("{}/{}?format=j1", self.fallback_base, urlencode(city));
        let data: Value = self.get_json("wttr.in", &url).await?;

        let current = data
            .get("current_condition")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .ok_or_else(|| ToolError::Parse("wttr response missing current_condition".to_string()))?;

        let desc = current
            .get("weatherDesc")
            .and_then(Value::as_array)
            .and_then(|d| d.first())
            .and_then(|d| d.get("value"))
            .and_then(Value::as_str)
            .unwrap_or("N/A");
        let temp_c = current.get("temp_C").and_then(Value::as_str).unwrap_or("?");
        let feels_c = current
            .get("FeelsLikeC")
            .and_then(Value::as_str)
            .unwrap_or("?");
        let humidity = current
            .get("humidity")
            .and_then(Value::as_str)
            .unwrap_or("?");
        let wind_kph = current
            .get("windspeedKmph")
            .and_then(Value::as_str)
            .unwrap_or("?");

        Ok(format!(
            "{}: {}, {}°C (feels {}°C), humidity {}%, wind {} km/h",
            city, desc, temp_c, feels_c, humidity, wind_kph
        ))
    }

    /// Issues a GET with bounded retries on transient statuses and parses the
    /// JSON body.
    async fn get_json(&self, service: &'static str, url: &str) -> Result<Value, ToolError> {
        let mut last_status = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let response = self.http.get(url).send().await?;
            let status = response.status();

            if status.is_success() {
                let bytes = response.bytes().await?;
                return serde_json::from_slice(&bytes)
                    .map_err(|e| ToolError::Parse(format!("{}: {}", service, e)));
            }

            last_status = Some(status.as_u16());
            if !is_transient(status.as_u16()) || attempt == MAX_ATTEMPTS {
                break;
            }

            let delay = backoff_delay(attempt, self.backoff_unit);
            tracing::warn!(
                service,
                status = status.as_u16(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                "transient upstream status, retrying"
            );
            tokio::time::sleep(delay).await;
        }

        Err(ToolError::Upstream {
            service,
            status: last_status.unwrap_or(0),
        })
    }
}

/// Transient statuses worth one more attempt.
fn is_transient(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// `min(2^attempt + jitter, cap)`, expressed in `unit`s.
fn backoff_delay(attempt: u32, unit: Duration) -> Duration {
    let base = 2u32.saturating_pow(attempt) as f64 + rand::random::<f64>();
    let capped = (base * unit.as_secs_f64()).min(BACKOFF_CAP.as_secs_f64() * unit.as_secs_f64());
    Duration::from_secs_f64(capped)
}

/// Percent-encodes a path/query component.
fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Maps a WMO weather code to a short description.
fn describe_wmo_code(code: i64) -> String {
    let desc = match code {
        0 => "clear sky",
        1..=3 => "partly cloudy",
        45 | 48 => "fog",
        51..=57 => "drizzle",
        61..=67 => "rain",
        71..=77 => "snow",
        80..=82 => "rain showers",
        85 | 86 => "snow showers",
        95..=99 => "thunderstorm",
        _ => return format!("code {}", code),
    };
    desc.to_string()
}
