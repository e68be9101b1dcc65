//! Gray release models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device attribute a gray rule targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Isp,
    Region,
    Province,
    #[serde(alias = "dataCenter")]
    Datacenter,
    /// Any unrecognised name, never matches a device
    #[serde(other)]
    Unknown,
}

impl Dimension {
    /// Value of this dimension on `device`, `None` for `Unknown`
    pub fn value_of<'a>(&self, device: &'a DeviceGrayStatus) -> Option<&'a str> {
        match self {
            Dimension::Isp => Some(&device.isp),
            Dimension::Region => Some(&device.region),
            Dimension::Province => Some(&device.province),
            Dimension::Datacenter => Some(&device.data_center),
            Dimension::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrayRule {
    pub dimension: Dimension,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Weighted, optionally time-boxed admission of a config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrayStrategy {
    /// Share of devices admitted, 0 to 100
    pub weight: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrayConfigStatus {
    #[default]
    Active,
    Completed,
}

/// Targeting rules exposing `version` to a subset of the fleet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrayReleaseConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub project_id: String,
    pub environment: String,
    pub version: String,
    #[serde(default)]
    pub rules: Vec<GrayRule>,
    #[serde(default)]
    pub strategies: Vec<GrayStrategy>,
    pub status: GrayConfigStatus,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub creator: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating or updating a gray release config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrayConfigInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub rules: Vec<GrayRule>,
    #[serde(default)]
    pub strategies: Vec<GrayStrategy>,
    #[serde(default)]
    pub status: Option<GrayConfigStatus>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub creator: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceReleaseState {
    Gray,
    Released,
    #[default]
    Normal,
}

/// Current version and attributes of one device in a project/environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceGrayStatus {
    pub node_id: String,
    #[serde(default)]
    pub node_name: String,
    pub project_id: String,
    #[serde(default)]
    pub project_name: String,
    pub environment: String,
    #[serde(default)]
    pub current_version: String,
    #[serde(default)]
    pub isp: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub data_center: String,
    #[serde(default)]
    pub status: DeviceReleaseState,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Devices on one version, broken down by dimension value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrayReleaseStats {
    pub version: String,
    pub device_count: usize,
    pub by_dimension: BTreeMap<String, usize>,
}

/// Filter over device statuses, unset fields match anything
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub project_id: Option<String>,
    pub environment: Option<String>,
    pub isp: Option<Vec<String>>,
    pub region: Option<Vec<String>>,
    pub province: Option<Vec<String>>,
    pub data_center: Option<Vec<String>>,
    pub node_ids: Option<Vec<String>>,
}

impl DeviceFilter {
    pub fn scope(project_id: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            environment: Some(environment.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, device: &DeviceGrayStatus) -> bool {
        fn member(set: &Option<Vec<String>>, value: &str) -> bool {
            set.as_ref().map_or(true, |values| values.iter().any(|v| v == value))
        }

        self.project_id
            .as_deref()
            .map_or(true, |p| p == device.project_id)
            && self
                .environment
                .as_deref()
                .map_or(true, |e| e == device.environment)
            && member(&self.isp, &device.isp)
            && member(&self.region, &device.region)
            && member(&self.province, &device.province)
            && member(&self.data_center, &device.data_center)
            && member(&self.node_ids, &device.node_id)
    }
}
