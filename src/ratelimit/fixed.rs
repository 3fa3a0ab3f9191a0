//! Fixed window counter state.

use super::WINDOW_LENGTH_MS;

/// Per-client state for the fixed window counter algorithm.
///
/// Requests are counted against discrete, non-overlapping 60 second
/// windows anchored at the first request after the previous window
/// expired. A burst at the tail of one window followed by a burst at
/// the head of the next can briefly admit up to twice the limit across
/// the boundary; that imprecision is inherent to fixed windows and is
/// accepted behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedWindow {
    count: u32,
    window_start_ms: u64,
}

impl FixedWindow {
    /// Create state for a client first seen at `now_ms`.
    pub fn new(now_ms: u64) -> Self {
        Self {
            count: 0,
            window_start_ms: now_ms,
        }
    }

    /// Run one admission check at `now_ms` against `limit`.
    ///
    /// If the current window has expired the counter is reset and a new
    /// window starts at `now_ms`; the window start never moves backwards.
    /// Returns `true` and increments the counter if the request is
    /// admitted, `false` if the limit is exhausted.
    pub fn admit(&mut self, now_ms: u64, limit: u32) -> bool {
        if now_ms.saturating_sub(self.window_start_ms) >= WINDOW_LENGTH_MS {
            self.count = 0;
            self.window_start_ms = now_ms;
        }

        if self.count < limit {
            self.count += 1;
            true
        } else {
            false
        }
    }

    /// Quota left in the current window, evaluated after a check.
    pub fn remaining(&self, limit: u32) -> u32 {
        limit.saturating_sub(self.count)
    }

    /// When the current window expires and the counter resets.
    pub fn resets_at(&self) -> u64 {
        self.window_start_ms + WINDOW_LENGTH_MS
    }

    /// Start of the current window.
    pub fn window_start_ms(&self) -> u64 {
        self.window_start_ms
    }

    /// Requests counted in the current window.
    pub fn count(&self) -> u32 {
        self.count
    }
}
