//! API Middleware (Rate Limiting, Logging)

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::types::{ApiError, ApiResponse};
use crate::utils::constants::{DEFAULT_RATE_LIMIT_PER_MINUTE, RATE_LIMIT_WINDOW_SECS};

/// Fixed-window, in-memory rate limiter keyed by client
pub struct RateLimiter {
    /// Request counts per client key
    requests: DashMap<String, (u32, Instant)>,
    requests_per_window: AtomicU32,
    window_duration: Duration,
}

impl RateLimiter {
    pub fn new(requests_per_window: u32, window_duration: Duration) -> Self {
        Self {
            requests: DashMap::new(),
            requests_per_window: AtomicU32::new(requests_per_window),
            window_duration,
        }
    }

    /// Change the per-window allowance (applies to the next check)
    pub fn set_limit(&self, requests_per_window: u32) {
        self.requests_per_window
            .store(requests_per_window, Ordering::Relaxed);
    }

    /// Check if request is allowed, returns (allowed, remaining, reset_seconds)
    pub fn check(&self, key: &str) -> (bool, u32, u64) {
        let now = Instant::now();
        let limit = self.requests_per_window.load(Ordering::Relaxed);

        let mut entry = self.requests.entry(key.to_string()).or_insert((0, now));

        // Reset window if expired
        if now.duration_since(entry.1) > self.window_duration {
            entry.0 = 0;
            entry.1 = now;
        }

        let reset_secs = self
            .window_duration
            .saturating_sub(now.duration_since(entry.1))
            .as_secs();

        if entry.0 >= limit {
            return (false, 0, reset_secs);
        }

        entry.0 += 1;
        (true, limit - entry.0, reset_secs)
    }

    /// Drop entries whose window ended long ago
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.requests.len();
        self.requests
            .retain(|_, (_, started)| now.duration_since(*started) < self.window_duration * 2);
        before - self.requests.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(
            DEFAULT_RATE_LIMIT_PER_MINUTE,
            Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
        )
    }
}

// Global rate limiter instance
lazy_static::lazy_static! {
    pub static ref RATE_LIMITER: Arc<RateLimiter> = Arc::new(RateLimiter::default());
}

/// Periodically evict stale rate limiter entries
pub fn start_cleanup_task() {
    tokio::spawn(async {
        let mut interval = tokio::time::interval(Duration::from_secs(RATE_LIMIT_WINDOW_SECS));
        loop {
            interval.tick().await;
            let removed = RATE_LIMITER.cleanup();
            if removed > 0 {
                info!(removed, "Rate limiter cleanup");
            }
        }
    });
}

fn is_health_check(path: &str) -> bool {
    path == "/health" || path == "/api/v1/health"
}

/// Client key: API key header, else forwarded address
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-api-key")
        .or_else(|| headers.get("x-forwarded-for"))
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(headers: HeaderMap, request: Request, next: Next) -> Response {
    // Skip rate limiting for health check
    if is_health_check(request.uri().path()) {
        return next.run(request).await;
    }

    let rate_key = client_key(&headers);
    let (allowed, remaining, reset) = RATE_LIMITER.check(&rate_key);

    if !allowed {
        warn!(key = %rate_key, "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::error(ApiError::rate_limited(reset), 0.0)),
        )
            .into_response();
    }

    let mut response = next.run(request).await;

    // Add rate limit headers
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Remaining", remaining.into());
    headers.insert("X-RateLimit-Reset", reset.into());

    response
}

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}
