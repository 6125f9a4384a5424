//! In-memory usage storage.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use super::{UsageRecord, UsageStorage};

/// Process-local usage records keyed by identity.
///
/// Each key lives in a `DashMap` shard; the shard's write lock is held for the whole read-modify-write of
/// [`UsageStorage::record_request`], which makes increment-then-compare atomic per key on a multi-threaded runtime.
#[derive(Default)]
pub struct InMemoryStorage {
    records: DashMap<String, UsageRecord>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage instance.
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsageStorage for InMemoryStorage {
    fn record_request(&self, key: &str, window: Duration) -> UsageRecord {
        let now = Instant::now();

        let mut record = self.records.entry(key.to_string()).or_insert_with(|| {
            log::debug!("Creating usage record for key '{key}'");

            UsageRecord {
                count: 0,
                window_start: now,
            }
        });

        if record.is_expired(now, window) {
            log::debug!("Window elapsed for key '{key}' after {} requests, resetting", record.count);

            *record = UsageRecord {
                count: 0,
                window_start: now,
            };
        }

        record.count = record.count.saturating_add(1);

        *record
    }

    fn get(&self, key: &str) -> Option<UsageRecord> {
        self.records.get(key).map(|record| *record)
    }

    fn evict_older_than(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let before = self.records.len();

        self.records.retain(|_, record| !record.is_expired(now, max_age));

        before.saturating_sub(self.records.len())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
