//! HTTP server implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Json, Router};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use super::middleware::{rate_limit_middleware, RateLimitContext};
use crate::config::RateLimitingConfig;
use crate::error::{Result, TurnstileError};
use crate::ratelimit::{now_ms, RateLimiter};

/// HTTP server fronting the rate limiter.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// The rate limiter instance
    limiter: Arc<RateLimiter>,
    /// Rate limiting settings (exempt paths, sweep cadence)
    config: RateLimitingConfig,
}

impl HttpServer {
    /// Create a new HTTP server around a shared rate limiter.
    pub fn new(addr: SocketAddr, limiter: Arc<RateLimiter>, config: RateLimitingConfig) -> Self {
        Self {
            addr,
            limiter,
            config,
        }
    }

    /// Build the router with the rate limiting middleware applied.
    pub fn router(&self) -> Router {
        let context = RateLimitContext::new(
            Arc::clone(&self.limiter),
            self.config.exempt_paths.clone(),
        );

        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/internal", get(internal_handler))
            .layer(middleware::from_fn_with_state(
                context,
                rate_limit_middleware,
            ))
            .with_state(Arc::clone(&self.limiter))
    }

    /// Start the HTTP server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves. An
    /// idle-state sweep task runs alongside the server and stops with it.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.router();

        let sweep = tokio::spawn(sweep_idle_state(
            Arc::clone(&self.limiter),
            Duration::from_secs(self.config.sweep_interval_secs),
            Duration::from_secs(self.config.idle_ttl_secs),
        ));

        info!(
            addr = %self.addr,
            algorithm = %self.limiter.algorithm(),
            requests_per_minute = self.limiter.limit(),
            "Starting HTTP server"
        );

        let listener = TcpListener::bind(self.addr).await?;
        let result = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await;

        sweep.abort();

        result.map_err(|e| {
            error!(error = %e, "HTTP server failed");
            TurnstileError::Io(e)
        })
    }
}

/// Periodically evict window state for clients that have gone quiet.
async fn sweep_idle_state(limiter: Arc<RateLimiter>, interval: Duration, idle_ttl: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let evicted = limiter.sweep_idle(now_ms(), idle_ttl);
        if evicted > 0 {
            debug!(
                evicted,
                tracked = limiter.tracked_keys(),
                "Swept idle client state"
            );
        }
    }
}

/// Placeholder for the protected resource the limiter fronts.
async fn root_handler() -> impl IntoResponse {
    "OK"
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Management endpoint; exempt from rate limiting by default.
async fn internal_handler(State(limiter): State<Arc<RateLimiter>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "algorithm": limiter.algorithm().as_str(),
        "requests_per_minute": limiter.limit(),
        "tracked_keys": limiter.tracked_keys(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::ratelimit::Algorithm;

    fn test_server(limit: u32) -> HttpServer {
        let limiter = Arc::new(RateLimiter::new(Algorithm::Sliding, limit).unwrap());
        HttpServer::new(
            "127.0.0.1:0".parse().unwrap(),
            limiter,
            RateLimitingConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let router = test_server(10).router();

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_internal_endpoint_is_exempt() {
        let router = test_server(1).router();

        // Well past the limit, yet every call succeeds with no headers.
        for _ in 0..5 {
            let response = router
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/internal")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert!(!response
                .headers()
                .contains_key(super::super::REMAINING_HEADER));
        }
    }
}
