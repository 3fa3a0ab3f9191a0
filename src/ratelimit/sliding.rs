//! Sliding window log state.

use super::WINDOW_LENGTH_MS;

/// Per-client log of recent request timestamps for the sliding window
/// log algorithm.
///
/// The log is a fixed-capacity ring buffer sized to the configured limit,
/// so memory per active client is bounded at `limit` timestamps. Entries
/// are appended at the tail in non-decreasing order and evicted from the
/// head once they age out of the rolling 60 second window, which makes
/// eviction a prefix scan that is amortized O(1) per check. Unlike the
/// fixed window counter this enforces the limit over *any* rolling
/// 60 second interval, with no boundary burst.
#[derive(Debug, Clone)]
pub struct SlidingLog {
    slots: Box<[u64]>,
    /// Next write position in `slots`.
    head: usize,
    /// Number of live entries; governs admission, not raw occupancy.
    len: usize,
}

impl SlidingLog {
    /// Create an empty log holding up to `capacity` timestamps.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "sliding log capacity must be positive");
        Self {
            slots: vec![0; capacity].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    /// Run one admission check at `now_ms` against `limit`.
    ///
    /// Evicts entries that have aged out of the window ending at
    /// `now_ms`, then admits and records the request if the surviving
    /// log is under the limit. A denied request leaves the log unchanged.
    pub fn admit(&mut self, now_ms: u64, limit: u32) -> bool {
        self.evict_older_than(now_ms.saturating_sub(WINDOW_LENGTH_MS));

        if (self.len as u32) < limit {
            self.push(now_ms);
            true
        } else {
            false
        }
    }

    /// Quota left in the rolling window, evaluated after a check.
    pub fn remaining(&self, limit: u32) -> u32 {
        limit.saturating_sub(self.len as u32)
    }

    /// Oldest live timestamp, if any.
    pub fn oldest(&self) -> Option<u64> {
        (self.len > 0).then(|| self.slots[self.oldest_index()])
    }

    /// Most recently recorded timestamp, if any.
    pub fn newest(&self) -> Option<u64> {
        let cap = self.slots.len();
        (self.len > 0).then(|| self.slots[(self.head + cap - 1) % cap])
    }

    /// Number of live entries in the log.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the log holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn oldest_index(&self) -> usize {
        let cap = self.slots.len();
        (self.head + cap - self.len) % cap
    }

    fn push(&mut self, now_ms: u64) {
        let cap = self.slots.len();
        self.slots[self.head] = now_ms;
        self.head = (self.head + 1) % cap;
        if self.len < cap {
            self.len += 1;
        }
    }

    fn evict_older_than(&mut self, threshold_ms: u64) {
        // Entries are ordered, so dropping the stale prefix is enough.
        while self.len > 0 && self.slots[self.oldest_index()] < threshold_ms {
            self.len -= 1;
        }
    }
}
