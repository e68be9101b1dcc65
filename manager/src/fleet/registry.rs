//! In-process registry of nodes, their binaries and rollout progress

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use tracing::{debug, info};

use crate::models::node::{NodeBin, NodeInfo, ProgressRecord};

/// Node liveness, installed binary checksums and progress reports
#[derive(Default)]
pub struct NodeRegistry {
    nodes: RwLock<HashMap<String, NodeInfo>>,
    // node_id -> bin_name -> checksum
    bins: RwLock<HashMap<String, HashMap<String, NodeBin>>>,
    // (node_name, bin_name) -> latest report
    progress: RwLock<HashMap<(String, String), ProgressRecord>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or refresh a node, returns the stored record
    pub fn register_node(
        &self,
        node_id: &str,
        cpu_arch: &str,
        os_release: &str,
        node_name: &str,
        bin_proxy_version: &str,
    ) -> NodeInfo {
        let node = NodeInfo {
            node_id: node_id.to_string(),
            cpu_arch: cpu_arch.to_string(),
            os_release: os_release.to_string(),
            node_name: node_name.to_string(),
            bin_proxy_version: bin_proxy_version.to_string(),
            last_seen: Utc::now(),
        };

        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        if nodes.insert(node_id.to_string(), node.clone()).is_none() {
            info!("Registered node {} ({})", node_id, node_name);
        } else {
            debug!("Keepalive from node {}", node_id);
        }
        node
    }

    pub fn get_node(&self, node_id: &str) -> Option<NodeInfo> {
        let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        nodes.get(node_id).cloned()
    }

    pub fn nodes_count(&self) -> usize {
        let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        nodes.len()
    }

    pub fn record_bin(&self, node_id: &str, bin_name: &str, sha256sum: &str) -> NodeBin {
        let bin = NodeBin {
            sha256sum: sha256sum.to_string(),
            updated_at: Utc::now(),
        };
        let mut bins = self.bins.write().unwrap_or_else(|e| e.into_inner());
        bins.entry(node_id.to_string())
            .or_default()
            .insert(bin_name.to_string(), bin.clone());
        debug!("Node {} reported {} at {}", node_id, bin_name, sha256sum);
        bin
    }

    pub fn node_bin(&self, node_id: &str, bin_name: &str) -> Option<NodeBin> {
        let bins = self.bins.read().unwrap_or_else(|e| e.into_inner());
        bins.get(node_id).and_then(|b| b.get(bin_name)).cloned()
    }

    /// Number of distinct binaries reported across the fleet
    pub fn bins_count(&self) -> usize {
        let bins = self.bins.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<&String> = bins.values().flat_map(|b| b.keys()).collect();
        names.sort();
        names.dedup();
        names.len()
    }

    /// Keep the latest progress report per node and binary
    pub fn record_progress(&self, record: ProgressRecord) {
        info!(
            "Progress from {} for {}: {} (target {})",
            record.node_name, record.bin_name, record.status, record.target_hash
        );
        let key = (record.node_name.clone(), record.bin_name.clone());
        let mut progress = self.progress.write().unwrap_or_else(|e| e.into_inner());
        progress.insert(key, record);
    }

    pub fn progress_for(&self, bin_name: &str) -> Vec<ProgressRecord> {
        let progress = self.progress.read().unwrap_or_else(|e| e.into_inner());
        let mut records: Vec<ProgressRecord> = progress
            .values()
            .filter(|r| r.bin_name == bin_name)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.node_name.cmp(&b.node_name));
        records
    }
}
