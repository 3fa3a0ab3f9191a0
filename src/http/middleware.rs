//! Rate limiting middleware.
//!
//! Sits in front of the routed handlers, derives a client key from the
//! peer address, and turns the limiter's decision into protocol-level
//! effects: a 429 with retry headers on denial, a remaining-quota header
//! on admission, and nothing at all for exempt paths.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::ratelimit::{now_ms, RateLimiter};

/// Header reporting the caller's remaining quota after an admitted check.
pub const REMAINING_HEADER: &str = "x-rate-limit-remaining";
/// Header hinting how long a denied caller should wait before retrying.
pub const RETRY_AFTER_HEADER: &str = "x-rate-limit-retry-after-seconds";

/// Shared state for the rate limiting middleware.
#[derive(Clone)]
pub struct RateLimitContext {
    limiter: Arc<RateLimiter>,
    exempt_paths: Arc<[String]>,
}

impl RateLimitContext {
    /// Create middleware state around a shared limiter.
    pub fn new(limiter: Arc<RateLimiter>, exempt_paths: Vec<String>) -> Self {
        Self {
            limiter,
            exempt_paths: exempt_paths.into(),
        }
    }

    fn is_exempt(&self, path: &str) -> bool {
        self.exempt_paths.iter().any(|exempt| exempt == path)
    }
}

/// Axum middleware enforcing the configured rate limit per client.
pub async fn rate_limit_middleware(
    State(context): State<RateLimitContext>,
    request: Request,
    next: Next,
) -> Response {
    // Exempt paths bypass the limiter entirely: no state mutation, no
    // rate limit headers.
    if context.is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let key = client_key(&request);
    let decision = context.limiter.check(&key, now_ms());

    if !decision.admitted {
        let retry_secs = decision
            .retry_after
            .map(|d| d.as_secs().max(1))
            .unwrap_or(60);
        debug!(client = %key, retry_secs, "Rejecting rate limited request");

        return (
            StatusCode::TOO_MANY_REQUESTS,
            [
                (REMAINING_HEADER, "0".to_string()),
                (RETRY_AFTER_HEADER, retry_secs.to_string()),
            ],
            "Too Many Requests",
        )
            .into_response();
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));
    response
}

/// Derive the rate limit key from the connection's peer address.
fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use crate::ratelimit::Algorithm;

    fn test_router(limiter: Arc<RateLimiter>) -> Router {
        let context = RateLimitContext::new(limiter, vec!["/internal".to_string()]);
        Router::new()
            .route("/", get(|| async { "OK" }))
            .route("/internal", get(|| async { "OK" }))
            .layer(axum::middleware::from_fn_with_state(
                context,
                rate_limit_middleware,
            ))
    }

    fn request(path: &str, ip: &str) -> http::Request<Body> {
        let mut request = http::Request::builder()
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let addr: SocketAddr = format!("{ip}:4000").parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[tokio::test]
    async fn test_admitted_requests_report_remaining() {
        let limiter = Arc::new(RateLimiter::new(Algorithm::Fixed, 10).unwrap());
        let router = test_router(limiter);

        for expected_remaining in (0..10).rev() {
            let response = router
                .clone()
                .oneshot(request("/", "127.0.0.1"))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers()[REMAINING_HEADER],
                expected_remaining.to_string().as_str()
            );
        }
    }

    #[tokio::test]
    async fn test_denied_request_gets_429_with_retry_hint() {
        let limiter = Arc::new(RateLimiter::new(Algorithm::Fixed, 2).unwrap());
        let router = test_router(limiter);

        for _ in 0..2 {
            let response = router
                .clone()
                .oneshot(request("/", "127.0.0.1"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = router
            .clone()
            .oneshot(request("/", "127.0.0.1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[REMAINING_HEADER], "0");
        let retry_secs: u64 = response.headers()[RETRY_AFTER_HEADER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(retry_secs > 0);
    }

    #[tokio::test]
    async fn test_exempt_path_bypasses_limiter() {
        let limiter = Arc::new(RateLimiter::new(Algorithm::Sliding, 2).unwrap());
        let router = test_router(Arc::clone(&limiter));

        for _ in 0..15 {
            let response = router
                .clone()
                .oneshot(request("/internal", "127.0.0.1"))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert!(!response.headers().contains_key(REMAINING_HEADER));
            assert!(!response.headers().contains_key(RETRY_AFTER_HEADER));
        }

        // The store never gained an entry for the exempt calls.
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_clients_are_limited_independently() {
        let limiter = Arc::new(RateLimiter::new(Algorithm::Fixed, 1).unwrap());
        let router = test_router(limiter);

        let first = router
            .clone()
            .oneshot(request("/", "10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let denied = router
            .clone()
            .oneshot(request("/", "10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);

        // A different peer address still has quota.
        let other = router
            .clone()
            .oneshot(request("/", "10.0.0.2"))
            .await
            .unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }
}
