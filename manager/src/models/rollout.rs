//! Canary release and config deployment models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::gray::DeviceFilter;

/// Group of devices a canary is fanned out to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "camelCase")]
pub enum CanaryTarget {
    Operator(Vec<String>),
    Region(Vec<String>),
    Province(Vec<String>),
    DataCenter(Vec<String>),
    Nodes(Vec<String>),
}

impl CanaryTarget {
    /// Device filter selecting this group inside a project/environment
    pub fn to_filter(&self, project_id: &str, environment: &str) -> DeviceFilter {
        let mut filter = DeviceFilter::scope(project_id, environment);
        match self {
            CanaryTarget::Operator(values) => filter.isp = Some(values.clone()),
            CanaryTarget::Region(values) => filter.region = Some(values.clone()),
            CanaryTarget::Province(values) => filter.province = Some(values.clone()),
            CanaryTarget::DataCenter(values) => filter.data_center = Some(values.clone()),
            CanaryTarget::Nodes(ids) => filter.node_ids = Some(ids.clone()),
        }
        filter
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CanaryTarget::Operator(v)
            | CanaryTarget::Region(v)
            | CanaryTarget::Province(v)
            | CanaryTarget::DataCenter(v)
            | CanaryTarget::Nodes(v) => v.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanaryStatus {
    #[default]
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryRelease {
    pub id: String,
    pub project_id: String,
    pub environment: String,
    pub history_id: String,
    pub version: String,
    pub target: CanaryTarget,
    pub status: CanaryStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub device_count: usize,
}

/// Payload for creating a canary release
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanaryInput {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub history_id: String,
    #[serde(default)]
    pub version: String,
    pub target: CanaryTarget,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigDeploymentStatus {
    #[default]
    Deployed,
}

/// One config version applied to one node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDeployment {
    pub id: String,
    pub node_id: String,
    pub project_id: String,
    pub environment: String,
    pub history_id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary_id: Option<String>,
    pub status: ConfigDeploymentStatus,
    pub deployed_at: DateTime<Utc>,
}
