//! Authentication, rate limiting, and webhook verification.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::AppState;

/// Buckets idle longer than this are eligible for eviction.
const BUCKET_IDLE_TTL: Duration = Duration::from_secs(3600);

/// Map size that triggers opportunistic eviction inside the hot path.
const BUCKET_EVICTION_THRESHOLD: usize = 10_000;

/// Middleware to authenticate requests via `Authorization: Bearer`.
///
/// The bearer token is a shared secret configured at startup; comparison is
/// plain byte equality against that secret. A missing header, a non-Bearer
/// scheme, or a mismatched token all yield 401 regardless of the request
/// body.
pub async fn auth_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    // Owned copy so the header borrow does not outlive `req`.
    let presented: Option<String> = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    match presented {
        Some(token) if token.as_bytes() == state.auth_token.as_bytes() => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!(path = %req.uri().path(), "invalid agent token attempt");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => Err(StatusCode::UNAUTHORIZED),
    }
}

/// A single client's token bucket.
///
/// Tokens refill continuously at `refill_rate` per second, capped at
/// `capacity`; each admitted request consumes one token.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_rate: f64, now: Instant) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_rate,
            last_refill: now,
        }
    }

    /// Attempts to consume one token at time `now`.
    pub fn consume_at(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    fn idle_since(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_refill)
    }
}

/// In-memory rate limiter: one token bucket per client key.
///
/// Keys are bearer tokens when the request carries one, remote IPs
/// otherwise. State is process-local; nothing is coordinated across
/// replicas or survives a restart.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, TokenBucket>>>,
    capacity: f64,
    refill_rate: f64,
}

impl RateLimiter {
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            capacity,
            refill_rate,
        }
    }

    /// Check if a request from `key` is allowed right now.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    /// Check with an explicit clock, for deterministic tests.
    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // Lock poisoned by a panicked thread. Recover with the
                // poisoned state — refusing all requests over a stale counter
                // would be a self-inflicted denial of service.
                tracing::error!("rate limiter lock poisoned, recovering with stale state");
                poisoned.into_inner()
            }
        };

        // Opportunistic eviction to bound memory. Only idle buckets go;
        // active limits are preserved.
        if buckets.len() > BUCKET_EVICTION_THRESHOLD {
            buckets.retain(|_, bucket| bucket.idle_since(now) <= BUCKET_IDLE_TTL);
        }

        buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, self.refill_rate, now))
            .consume_at(now)
    }

    /// Evicts buckets idle longer than `ttl`. Called by the background
    /// maintenance task.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.idle_since(now) <= ttl);
        before - buckets.len()
    }

    /// Seconds a drained client should wait before trying again.
    pub fn retry_after_secs(&self) -> u64 {
        (1.0 / self.refill_rate).ceil().max(1.0) as u64
    }
}

/// Rate limiting middleware.
///
/// Keyed by bearer token when present, else by remote IP. Requests with
/// neither (no `ConnectInfo` injected) fail closed with 500 — that is a
/// deployment misconfiguration, not a client error.
pub async fn rate_limit_middleware(
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    let key = if let Some(token) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        format!("token:{}", token)
    } else if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        format!("ip:{}", addr.ip())
    } else {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    };

    if !state.rate_limiter.check(&key) {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
        if let Ok(value) =
            HeaderValue::from_str(&state.rate_limiter.retry_after_secs().to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return Ok(response);
    }

    Ok(next.run(req).await)
}

/// Outcome of webhook signature verification.
#[derive(Debug, PartialEq, Eq)]
pub enum SignatureCheck {
    Valid,
    /// No webhook secret is configured; deliveries cannot be verified.
    NotConfigured,
    /// The `X-Signature` header is absent.
    MissingSignature,
    /// The signature does not match the body.
    Invalid,
}

/// Verifies an HMAC-SHA256 webhook signature over the raw request body.
///
/// The expected header value is the lowercase hex digest of
/// `HMAC-SHA256(secret, body)`. Comparison runs in constant time via
/// `Mac::verify_slice`.
pub fn verify_webhook_signature(
    secret: &str,
    signature_header: Option<&str>,
    body: &[u8],
) -> SignatureCheck {
    if secret.is_empty() {
        return SignatureCheck::NotConfigured;
    }
    let Some(signature_hex) = signature_header else {
        return SignatureCheck::MissingSignature;
    };
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return SignatureCheck::Invalid;
    };

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    match mac.verify_slice(&signature) {
        Ok(()) => SignatureCheck::Valid,
        Err(_) => SignatureCheck::Invalid,
    }
}

/// Computes the hex signature a webhook sender should attach. Used by tests
/// and documented for integrating services.
pub fn sign_webhook_body(secret: &str, body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Builds the CORS layer from the configured origin allow-list.
///
/// Credentials require explicit origins, methods, and headers — wildcards
/// are rejected by the browser (and by tower-http) in that combination.
pub fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "skipping unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        .expose_headers([
            header::HeaderName::from_static("x-total-count"),
            header::HeaderName::from_static("x-page-count"),
        ])
        .max_age(Duration::from_secs(3600))
}
