//! Static quota lookup.

use std::{collections::BTreeMap, num::NonZeroU32, time::Duration};

use config::{IdentityClass, QuotaConfig};

/// Maximum requests per window for each identity class.
///
/// Loaded once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    window: Duration,
    limits: BTreeMap<IdentityClass, NonZeroU32>,
}

impl QuotaPolicy {
    /// Builds the policy from the validated quota configuration.
    pub fn new(config: &QuotaConfig) -> Self {
        Self {
            window: config.window,
            limits: config.limits.clone(),
        }
    }

    /// The limit for a class, or `None` if the class was never configured.
    pub fn limit_for(&self, class: &IdentityClass) -> Option<u32> {
        self.limits.get(class).map(|limit| limit.get())
    }

    /// Whether the class has a configured limit.
    pub fn covers(&self, class: &IdentityClass) -> bool {
        self.limits.contains_key(class)
    }

    /// The window length shared by all classes.
    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Renders a window length for messages, e.g. `hour`, `2 hours` or `90 seconds`.
pub fn describe_window(window: Duration) -> String {
    let secs = window.as_secs();

    let (count, unit) = match secs {
        0 => return format!("{}ms", window.as_millis()),
        s if s % 86_400 == 0 => (s / 86_400, "day"),
        s if s % 3_600 == 0 => (s / 3_600, "hour"),
        s if s % 60 == 0 => (s / 60, "minute"),
        s => (s, "second"),
    };

    if count == 1 {
        unit.to_string()
    } else {
        format!("{count} {unit}s")
    }
}
