//! Matching of gray release configs against a device

use chrono::{DateTime, Utc};

use crate::models::gray::{DeviceGrayStatus, GrayReleaseConfig, GrayRule, GrayStrategy};
use crate::utils::hash_bucket;

impl GrayRule {
    /// The device's value for this dimension is one of the accepted values
    pub fn matches(&self, device: &DeviceGrayStatus) -> bool {
        self.dimension
            .value_of(device)
            .map_or(false, |value| self.values.iter().any(|v| v == value))
    }
}

impl GrayStrategy {
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        self.start_at.map_or(true, |start| now >= start) && self.end_at.map_or(true, |end| now < end)
    }

    /// Inside the window and the node's stable bucket falls under the weight
    pub fn admits(&self, node_id: &str, now: DateTime<Utc>) -> bool {
        self.in_window(now) && hash_bucket(node_id) < self.weight.min(100)
    }
}

/// All rules match; an empty rule list never does
pub fn rules_match(rules: &[GrayRule], device: &DeviceGrayStatus) -> bool {
    !rules.is_empty() && rules.iter().all(|rule| rule.matches(device))
}

/// No strategies admit everyone, otherwise one of them has to
pub fn strategies_admit(strategies: &[GrayStrategy], node_id: &str, now: DateTime<Utc>) -> bool {
    strategies.is_empty() || strategies.iter().any(|s| s.admits(node_id, now))
}

pub fn config_matches(config: &GrayReleaseConfig, device: &DeviceGrayStatus, now: DateTime<Utc>) -> bool {
    rules_match(&config.rules, device) && strategies_admit(&config.strategies, &device.node_id, now)
}

/// Version of the first matching config; `configs` must be newest first
pub fn select_version<'a>(
    configs: &'a [GrayReleaseConfig],
    device: &DeviceGrayStatus,
    now: DateTime<Utc>,
) -> Option<&'a str> {
    configs
        .iter()
        .find(|config| config_matches(config, device, now))
        .map(|config| config.version.as_str())
}
