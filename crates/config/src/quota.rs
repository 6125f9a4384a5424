//! Quota configuration structures.

use std::{collections::BTreeMap, num::NonZeroU32, time::Duration};

use duration_str::deserialize_duration;
use serde::Deserialize;

use crate::IdentityClass;

const DEFAULT_GUEST_LIMIT: NonZeroU32 = NonZeroU32::new(5).unwrap();
const DEFAULT_USER_LIMIT: NonZeroU32 = NonZeroU32::new(20).unwrap();

/// Request quotas per identity class over a shared window.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuotaConfig {
    /// Length of the fixed window shared by all classes.
    #[serde(deserialize_with = "deserialize_duration")]
    pub window: Duration,
    /// Maximum number of requests per window, by class.
    pub limits: BTreeMap<IdentityClass, NonZeroU32>,
    /// Removal of usage records that can no longer affect an admission decision.
    pub eviction: EvictionConfig,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        let limits = [
            (IdentityClass::guest(), DEFAULT_GUEST_LIMIT),
            (IdentityClass::new("user"), DEFAULT_USER_LIMIT),
        ]
        .into_iter()
        .collect();

        Self {
            window: Duration::from_secs(3600),
            limits,
            eviction: EvictionConfig::default(),
        }
    }
}

/// Configuration for dropping stale usage records.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvictionConfig {
    /// Whether the background sweep runs at all.
    pub enabled: bool,
    /// A record is dropped once its window started at least this many windows ago.
    pub retain_windows: u32,
    /// How often the sweep runs.
    #[serde(deserialize_with = "deserialize_duration")]
    pub sweep_interval: Duration,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retain_windows: 2,
            sweep_interval: Duration::from_secs(300),
        }
    }
}
