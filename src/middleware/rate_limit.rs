use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde_json::json;

pub const GLOBAL_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later";
pub const WEBHUNTER_LIMIT_MESSAGE: &str = "Too many Web-Hunter API requests, please try again later";

/// Checks between sweeps of fully replenished keys.
const PRUNE_EVERY: u64 = 4096;

/// Per-client-IP limiter allowing `max` requests per window.
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
    checks: Arc<AtomicU64>,
    max: u32,
    window_secs: u64,
    trust_proxy: bool,
    message: &'static str,
}

impl RateLimit {
    pub fn new(max: u32, window_secs: u64, message: &'static str) -> Self {
        let burst = NonZeroU32::new(max).unwrap_or(NonZeroU32::MIN);
        let window = Duration::from_secs(window_secs.max(1));
        // Replenish one cell every window/max; a full bucket holds `max`.
        let quota = Quota::with_period(window / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            checks: Arc::new(AtomicU64::new(0)),
            max: burst.get(),
            window_secs: window.as_secs(),
            trust_proxy: true,
            message,
        }
    }

    /// Whether `X-Forwarded-For` is honoured when keying requests.
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    pub fn check(&self, key: &str) -> bool {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune();
        }
        self.limiter.check_key(&key.to_string()).is_ok()
    }

    /// Drops keys whose bucket has refilled completely.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }

    fn rejection(&self) -> Response {
        let body = json!({
            "success": false,
            "error": "Rate limit exceeded",
            "message": self.message,
            "retryAfter": self.window_secs,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert("Retry-After", HeaderValue::from(self.window_secs));
        headers.insert("X-RateLimit-Limit", HeaderValue::from(self.max));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
        response
    }
}

/// Client address. With `trust_proxy` this is the last `X-Forwarded-For`
/// hop, the one our proxy appended; earlier hops are client supplied.
/// Falls back to the socket peer.
pub fn client_ip(request: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        let last_hop = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.rsplit(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = last_hop {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(State(limit): State<RateLimit>, request: Request, next: Next) -> Response {
    let ip = client_ip(&request, limit.trust_proxy);

    if !limit.check(&ip) {
        tracing::warn!(ip = %ip, path = %request.uri().path(), limit = limit.max, "Rate limit exceeded");
        return limit.rejection();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware::from_fn_with_state, routing::get, Router};
    use tower::ServiceExt;

    fn request(ip: &str) -> Request {
        Request::builder()
            .uri("/")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn keys_are_limited_independently() {
        let limit = RateLimit::new(2, 900, GLOBAL_LIMIT_MESSAGE);
        assert!(limit.check("10.0.0.1"));
        assert!(limit.check("10.0.0.1"));
        assert!(!limit.check("10.0.0.1"));
        assert!(limit.check("10.0.0.2"));
    }

    #[test]
    fn keys_on_the_hop_the_proxy_appended() {
        let req = request("203.0.113.9, 10.0.0.1");
        assert_eq!(client_ip(&req, true), "10.0.0.1");
        assert_eq!(client_ip(&request("198.51.100.7"), true), "198.51.100.7");
        assert_eq!(client_ip(&req, false), "unknown");

        let bare = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(client_ip(&bare, true), "unknown");
    }

    #[tokio::test]
    async fn rotating_forwarded_prefix_does_not_reset_the_limit() {
        let limit = RateLimit::new(2, 900, GLOBAL_LIMIT_MESSAGE);
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(limit, rate_limit_middleware));

        let mut statuses = Vec::new();
        for n in 0..3 {
            let forged = format!("192.0.2.{}, 10.0.0.1", n);
            statuses.push(app.clone().oneshot(request(&forged)).await.unwrap().status());
        }
        assert_eq!(statuses, vec![StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]);
    }

    #[test]
    fn prune_forgets_replenished_keys() {
        let limit = RateLimit::new(1, 1, GLOBAL_LIMIT_MESSAGE);
        for n in 0..50 {
            assert!(limit.check(&format!("192.0.2.{}", n)));
        }
        assert_eq!(limit.tracked_keys(), 50);

        limit.prune();
        assert_eq!(limit.tracked_keys(), 50);

        std::thread::sleep(Duration::from_millis(1100));
        limit.prune();
        assert_eq!(limit.tracked_keys(), 0);
        assert!(limit.check("192.0.2.1"));
    }

    #[tokio::test]
    async fn rejects_with_429_envelope() {
        let limit = RateLimit::new(1, 900, WEBHUNTER_LIMIT_MESSAGE);
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(limit, rate_limit_middleware));

        let first = app.clone().oneshot(request("198.51.100.7")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(request("198.51.100.7")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()["retry-after"], "900");

        let bytes = axum::body::to_bytes(second.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Rate limit exceeded");
        assert_eq!(body["message"], WEBHUNTER_LIMIT_MESSAGE);
        assert_eq!(body["retryAfter"], 900);
    }
}
