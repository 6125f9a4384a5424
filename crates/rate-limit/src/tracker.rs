//! Fixed-window admission decisions.

use std::sync::Arc;

use config::{EvictionConfig, Identity};
use tokio::time::Instant;

use crate::{
    policy::QuotaPolicy,
    storage::{InMemoryStorage, UsageStorage},
};

/// Outcome of counting one request against an identity's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionResult {
    /// Whether the request fits in the current window.
    pub allowed: bool,
    /// Requests left in the current window, never negative.
    pub remaining: u32,
    /// The identity's class limit.
    pub limit: u32,
}

/// Read-only view of an identity's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageSnapshot {
    /// Requests left in the current window.
    pub remaining: u32,
    /// The identity's class limit.
    pub limit: u32,
}

/// Tracks consumption per identity over a fixed window with lazy reset.
///
/// The window starts with the first request of an identity and is only reset by the first request arriving after
/// it elapsed. Requests in the same window accumulate, so a burst straddling two windows can be admitted up to twice
/// the limit in a short interval.
pub struct UsageTracker<S = InMemoryStorage> {
    policy: Arc<QuotaPolicy>,
    storage: S,
    retain_windows: u32,
}

impl UsageTracker<InMemoryStorage> {
    /// Creates a tracker over a fresh in-memory store.
    pub fn in_memory(policy: Arc<QuotaPolicy>, eviction: &EvictionConfig) -> Self {
        Self::new(policy, InMemoryStorage::new(), eviction)
    }
}

impl<S: UsageStorage> UsageTracker<S> {
    /// Creates a tracker over the given store.
    pub fn new(policy: Arc<QuotaPolicy>, storage: S, eviction: &EvictionConfig) -> Self {
        Self {
            policy,
            storage,
            retain_windows: eviction.retain_windows.max(1),
        }
    }

    /// The policy limits are read from.
    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// Counts a request for `identity` and decides whether it is admitted.
    ///
    /// The count is stored whether or not the request is admitted, so an identity that keeps calling while over
    /// its limit keeps counting until the window rolls over.
    pub fn admit(&self, identity: &Identity) -> AdmissionResult {
        let limit = self.limit_for(identity);
        let key = identity.storage_key();

        let record = self.storage.record_request(&key, self.policy.window());
        let allowed = record.count <= limit;
        let remaining = limit.saturating_sub(record.count);

        log::debug!(
            "Admission for '{key}' ({}): count={}, limit={limit}, allowed={allowed}",
            identity.class,
            record.count
        );

        AdmissionResult {
            allowed,
            remaining,
            limit,
        }
    }

    /// Reports the remaining quota for `identity` without consuming any.
    ///
    /// A record whose window already elapsed counts as absent, since the next admission resets it.
    pub fn peek(&self, identity: &Identity) -> UsageSnapshot {
        let limit = self.limit_for(identity);

        let used = self
            .storage
            .get(&identity.storage_key())
            .filter(|record| !record.is_expired(Instant::now(), self.policy.window()))
            .map(|record| record.count)
            .unwrap_or(0);

        UsageSnapshot {
            remaining: limit.saturating_sub(used),
            limit,
        }
    }

    /// Drops records that can no longer influence an admission. Returns how many were removed.
    pub fn evict_stale(&self) -> usize {
        let max_age = self.policy.window().saturating_mul(self.retain_windows);
        let removed = self.storage.evict_older_than(max_age);

        if removed > 0 {
            log::debug!(
                "Evicted {removed} stale usage records, {} remaining",
                self.storage.len()
            );
        }

        removed
    }

    /// Number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.storage.len()
    }

    fn limit_for(&self, identity: &Identity) -> u32 {
        // Classes are validated at startup and at token verification, so this is a misconfiguration.
        // Failing closed keeps an unknown class from bypassing quotas.
        self.policy.limit_for(&identity.class).unwrap_or_else(|| {
            log::warn!("No quota limit for class '{}', denying request", identity.class);
            0
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{num::NonZeroU32, time::Duration};

    use config::{IdentityClass, QuotaConfig};

    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn tracker() -> UsageTracker {
        let mut config = QuotaConfig::default();
        config.window = HOUR;
        config
            .limits
            .insert(IdentityClass::new("user"), NonZeroU32::new(3).unwrap());

        UsageTracker::in_memory(Arc::new(QuotaPolicy::new(&config)), &config.eviction)
    }

    fn user(id: &str) -> Identity {
        Identity::principal(id, IdentityClass::new("user"))
    }

    #[tokio::test(start_paused = true)]
    async fn admits_up_to_limit_with_decreasing_remaining() {
        let tracker = tracker();
        let guest = Identity::guest("203.0.113.7");

        let remaining: Vec<_> = (0..5)
            .map(|_| {
                let result = tracker.admit(&guest);
                assert!(result.allowed);
                assert_eq!(result.limit, 5);
                result.remaining
            })
            .collect();

        assert_eq!(remaining, vec![4, 3, 2, 1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn request_over_limit_is_denied() {
        let tracker = tracker();
        let guest = Identity::guest("203.0.113.7");

        for _ in 0..5 {
            tracker.admit(&guest);
        }

        let result = tracker.admit(&guest);

        assert_eq!(
            result,
            AdmissionResult {
                allowed: false,
                remaining: 0,
                limit: 5,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn denied_requests_still_count() {
        let tracker = tracker();
        let alice = user("alice");

        for _ in 0..10 {
            tracker.admit(&alice);
        }

        let record = tracker.storage.get(&alice.storage_key()).unwrap();
        assert_eq!(record.count, 10);
        assert_eq!(tracker.peek(&alice).remaining, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn window_rollover_resets_after_denial_streak() {
        let tracker = tracker();
        let alice = user("alice");

        for _ in 0..8 {
            tracker.admit(&alice);
        }
        assert!(!tracker.admit(&alice).allowed);

        tokio::time::advance(HOUR).await;
        let result = tracker.admit(&alice);

        assert!(result.allowed);
        assert_eq!(result.remaining, 2);
        assert_eq!(tracker.storage.get(&alice.storage_key()).unwrap().count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn window_does_not_slide() {
        let tracker = tracker();
        let alice = user("alice");

        tracker.admit(&alice);
        tokio::time::advance(HOUR - Duration::from_secs(1)).await;

        // Still inside the first window: two more fit, the fourth does not.
        assert!(tracker.admit(&alice).allowed);
        assert!(tracker.admit(&alice).allowed);
        assert!(!tracker.admit(&alice).allowed);

        // One second later the whole window resets, even though the last requests were just now.
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(tracker.admit(&alice).allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn peek_never_mutates() {
        let tracker = tracker();
        let alice = user("alice");

        assert_eq!(tracker.peek(&alice), UsageSnapshot { remaining: 3, limit: 3 });
        assert_eq!(tracker.tracked_identities(), 0);

        tracker.admit(&alice);

        for _ in 0..10 {
            assert_eq!(tracker.peek(&alice), UsageSnapshot { remaining: 2, limit: 3 });
        }

        assert_eq!(tracker.admit(&alice).remaining, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn peek_treats_elapsed_window_as_fresh() {
        let tracker = tracker();
        let alice = user("alice");

        for _ in 0..3 {
            tracker.admit(&alice);
        }
        tokio::time::advance(HOUR).await;

        assert_eq!(tracker.peek(&alice).remaining, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn guests_and_principals_are_independent() {
        let tracker = tracker();
        let guest = Identity::guest("alice");
        let alice = user("alice");

        for _ in 0..6 {
            tracker.admit(&guest);
        }
        assert!(!tracker.admit(&guest).allowed);

        let result = tracker.admit(&alice);
        assert!(result.allowed);
        assert_eq!(result.remaining, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_class_fails_closed() {
        let tracker = tracker();
        let stranger = Identity::principal("x", IdentityClass::new("enterprise"));

        let result = tracker.admit(&stranger);

        assert!(!result.allowed);
        assert_eq!(result.limit, 0);
        assert_eq!(result.remaining, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_keeps_recent_windows() {
        let tracker = tracker();

        tracker.admit(&user("old"));
        tokio::time::advance(HOUR).await;
        tracker.admit(&user("recent"));
        tokio::time::advance(HOUR).await;

        assert_eq!(tracker.evict_stale(), 1);
        assert_eq!(tracker.tracked_identities(), 1);
        assert_eq!(tracker.peek(&user("recent")).remaining, 3);
    }
}
