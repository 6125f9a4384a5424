//! Storage backends for usage records.

use std::time::Duration;

use tokio::time::Instant;

pub mod memory;

pub use memory::InMemoryStorage;

/// Consumption of one identity key within its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageRecord {
    /// Requests counted in the current window, denied ones included.
    pub count: u32,
    /// When the current window started.
    pub window_start: Instant,
}

impl UsageRecord {
    /// Whether the window has elapsed at `now`.
    pub fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }
}

/// Trait for usage storage backends.
///
/// Implementations must make [`UsageStorage::record_request`] atomic per key: two concurrent calls for the same
/// key must never observe the same count.
pub trait UsageStorage: Send + Sync {
    /// Counts one request for `key` and returns the record as written.
    ///
    /// The record is created on first use and reset when `window` has elapsed since it started.
    fn record_request(&self, key: &str, window: Duration) -> UsageRecord;

    /// Returns the record for `key` without creating or modifying it.
    fn get(&self, key: &str) -> Option<UsageRecord>;

    /// Removes every record whose window started at least `max_age` ago. Returns how many were removed.
    fn evict_older_than(&self, max_age: Duration) -> usize;

    /// Number of records currently held.
    fn len(&self) -> usize;

    /// Whether the store holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
