//! Core rate limiter implementation.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::fixed::FixedWindow;
use super::sliding::SlidingLog;
use super::store::WindowStore;
use super::WINDOW_LENGTH_MS;
use crate::error::{Result, TurnstileError};

/// Throttling algorithm selector.
///
/// Selected once at configuration time; dispatch inside the limiter is a
/// match over this closed set, and each variant owns its own state type.
/// Any unrecognized selector string deterministically falls back to
/// [`Algorithm::Sliding`], the safe default: a request is never failed
/// over a bad selector, and the fallback enforces the stricter of the
/// two guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Algorithm {
    /// Fixed window counter: discrete 60 second buckets.
    Fixed,
    /// Sliding window log: exact rolling 60 second interval.
    Sliding,
}

impl Algorithm {
    /// Canonical configuration string for this algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Fixed => "fixed",
            Algorithm::Sliding => "sliding",
        }
    }
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Sliding
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Algorithm {
    fn from(selector: String) -> Self {
        if selector.eq_ignore_ascii_case("fixed") {
            Algorithm::Fixed
        } else {
            if !selector.eq_ignore_ascii_case("sliding") {
                warn!(
                    selector = %selector,
                    "Unrecognized rate limit algorithm, falling back to sliding window"
                );
            }
            Algorithm::Sliding
        }
    }
}

impl From<Algorithm> for String {
    fn from(algorithm: Algorithm) -> Self {
        algorithm.as_str().to_string()
    }
}

impl FromStr for Algorithm {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Algorithm::from(s.to_string()))
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed.
    pub admitted: bool,
    /// Quota left after this check. Zero on every denial.
    pub remaining: u32,
    /// How long until a denied client can expect an admission; `None`
    /// on admitted checks.
    pub retry_after: Option<Duration>,
}

/// Per-client state for the selected algorithm.
#[derive(Debug)]
enum Backend {
    Fixed(WindowStore<FixedWindow>),
    Sliding(WindowStore<SlidingLog>),
}

/// The core rate limiter that manages per-client window state.
///
/// Thread-safe; shared across request handlers behind an `Arc`. Each
/// check runs as one critical section on the calling client's state, so
/// concurrent checks for one client serialize while distinct clients
/// proceed in parallel.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    backend: Backend,
}

impl RateLimiter {
    /// Create a rate limiter enforcing `requests_per_minute` with the
    /// given algorithm.
    ///
    /// A zero limit is a configuration error surfaced at startup, never
    /// per request.
    pub fn new(algorithm: Algorithm, requests_per_minute: u32) -> Result<Self> {
        if requests_per_minute == 0 {
            return Err(TurnstileError::Config(
                "requests_per_minute must be greater than zero".to_string(),
            ));
        }

        let backend = match algorithm {
            Algorithm::Fixed => Backend::Fixed(WindowStore::new()),
            Algorithm::Sliding => Backend::Sliding(WindowStore::new()),
        };

        Ok(Self {
            limit: requests_per_minute,
            backend,
        })
    }

    /// Run one admission check for `key` at `now_ms`.
    ///
    /// Exempt requests must bypass this call entirely; every invocation
    /// mutates the key's state.
    pub fn check(&self, key: &str, now_ms: u64) -> Decision {
        trace!(key, now_ms, "Checking rate limit");

        let decision = match &self.backend {
            Backend::Fixed(store) => {
                let state = store.get_or_create(key, || {
                    debug!(key, limit = self.limit, "Creating fixed window state");
                    FixedWindow::new(now_ms)
                });
                let mut window = state.lock();

                let admitted = window.admit(now_ms, self.limit);
                let retry_after = (!admitted).then(|| {
                    Duration::from_millis(window.resets_at().saturating_sub(now_ms))
                });
                Decision {
                    admitted,
                    remaining: window.remaining(self.limit),
                    retry_after,
                }
            }
            Backend::Sliding(store) => {
                let capacity = self.limit as usize;
                let state = store.get_or_create(key, || {
                    debug!(key, limit = self.limit, "Creating sliding window log");
                    SlidingLog::new(capacity)
                });
                let mut log = state.lock();

                let admitted = log.admit(now_ms, self.limit);
                let retry_after = if admitted {
                    None
                } else {
                    // The log opens up once its oldest entry ages out.
                    log.oldest().map(|oldest| {
                        Duration::from_millis(
                            (oldest + WINDOW_LENGTH_MS).saturating_sub(now_ms),
                        )
                    })
                };
                Decision {
                    admitted,
                    remaining: log.remaining(self.limit),
                    retry_after,
                }
            }
        };

        if !decision.admitted {
            debug!(key, "Rate limit exceeded");
        }
        decision
    }

    /// The configured requests-per-minute limit.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// The algorithm this limiter dispatches to.
    pub fn algorithm(&self) -> Algorithm {
        match self.backend {
            Backend::Fixed(_) => Algorithm::Fixed,
            Backend::Sliding(_) => Algorithm::Sliding,
        }
    }

    /// Number of clients with live window state.
    pub fn tracked_keys(&self) -> usize {
        match &self.backend {
            Backend::Fixed(store) => store.len(),
            Backend::Sliding(store) => store.len(),
        }
    }

    /// Drop state for clients idle longer than `idle_ttl`, returning the
    /// number of entries evicted.
    ///
    /// Bounds store growth under client churn; per-key admission
    /// semantics are unaffected because evicted state is reconstructed
    /// fresh on the next request, exactly as on first contact.
    pub fn sweep_idle(&self, now_ms: u64, idle_ttl: Duration) -> usize {
        let ttl_ms = idle_ttl.as_millis() as u64;
        let before = self.tracked_keys();

        match &self.backend {
            Backend::Fixed(store) => store.retain(|_, window| {
                now_ms.saturating_sub(window.window_start_ms()) < ttl_ms
            }),
            Backend::Sliding(store) => store.retain(|_, log| {
                log.newest()
                    .is_some_and(|ts| now_ms.saturating_sub(ts) < ttl_ms)
            }),
        }

        before.saturating_sub(self.tracked_keys())
    }
}
