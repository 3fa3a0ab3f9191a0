//! Rate limiting logic and state management.

mod fixed;
mod limiter;
mod sliding;
mod store;

pub use fixed::FixedWindow;
pub use limiter::{Algorithm, Decision, RateLimiter};
pub use sliding::SlidingLog;
pub use store::WindowStore;

/// Length of the rate limit window for both algorithms, in milliseconds.
pub const WINDOW_LENGTH_MS: u64 = 60_000;

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Rate limit checks take an explicit timestamp so that tests can drive
/// the clock; production callers use this.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
