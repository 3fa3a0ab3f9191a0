//! HTTP server module: routing and the rate limiting middleware.

mod middleware;
mod server;

pub use middleware::{rate_limit_middleware, RateLimitContext, REMAINING_HEADER, RETRY_AFTER_HEADER};
pub use server::HttpServer;
