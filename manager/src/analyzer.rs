//! Fleet version consistency: per-version counts and drift detection

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::ManagerError;
use crate::store::RolloutStore;

/// How versions are bucketed before looking for drift
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftPolicy {
    /// `2.3.0` and `2.4.1` share bucket `2`
    #[default]
    Major,
    /// `2.3.0` and `2.3.7` share bucket `2.3`
    MajorMinor,
}

impl DriftPolicy {
    fn segments(self) -> usize {
        match self {
            DriftPolicy::Major => 1,
            DriftPolicy::MajorMinor => 2,
        }
    }

    pub fn bucket(self, version: &str) -> String {
        version
            .split('.')
            .take(self.segments())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl FromStr for DriftPolicy {
    type Err = ManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "major" => Ok(DriftPolicy::Major),
            "major_minor" | "major-minor" => Ok(DriftPolicy::MajorMinor),
            other => Err(ManagerError::ValidationError(format!(
                "unknown drift policy: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for DriftPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftPolicy::Major => write!(f, "major"),
            DriftPolicy::MajorMinor => write!(f, "major_minor"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionStat {
    pub version: String,
    pub device_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInconsistency {
    pub bucket: String,
    pub versions: Vec<String>,
    pub device_count: usize,
    pub node_ids: Vec<String>,
}

#[derive(Default)]
struct Bucket {
    versions: BTreeSet<String>,
    node_ids: BTreeSet<String>,
    device_count: usize,
}

pub struct VersionAnalyzer {
    store: Arc<dyn RolloutStore>,
}

impl VersionAnalyzer {
    pub fn new(store: Arc<dyn RolloutStore>) -> Self {
        Self { store }
    }

    /// Deployed device count per version, sorted by version
    pub async fn get_version_stats(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Vec<VersionStat>, ManagerError> {
        let counts = self
            .store
            .count_deployments_by_version(project_id, environment)
            .await?;
        Ok(counts
            .into_iter()
            .map(|(version, device_count)| VersionStat {
                version,
                device_count,
            })
            .collect())
    }

    /// Buckets holding more than one distinct version
    pub async fn get_version_inconsistencies(
        &self,
        project_id: &str,
        environment: &str,
        policy: DriftPolicy,
    ) -> Result<Vec<VersionInconsistency>, ManagerError> {
        let deployments = self
            .store
            .list_config_deployments(project_id, environment)
            .await?;

        let mut buckets: BTreeMap<String, Bucket> = BTreeMap::new();
        for deployment in deployments {
            let bucket = buckets.entry(policy.bucket(&deployment.version)).or_default();
            bucket.versions.insert(deployment.version);
            bucket.node_ids.insert(deployment.node_id);
            bucket.device_count += 1;
        }

        Ok(buckets
            .into_iter()
            .filter(|(_, b)| b.versions.len() > 1)
            .map(|(key, b)| VersionInconsistency {
                bucket: key,
                versions: b.versions.into_iter().collect(),
                device_count: b.device_count,
                node_ids: b.node_ids.into_iter().collect(),
            })
            .collect())
    }
}
