//! Cluster routing for `role = hub` (spec.md §4.9): pick a node by
//! load/capacity and forward the spawn; `standalone` bypasses this
//! entirely and `node` only reports its own health upward.

use dashmap::DashMap;
use kernel_core::{KernelError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// A node is considered offline once this long has passed since its last
/// health report.
const OFFLINE_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeHealth {
    pub node_id: String,
    pub endpoint: String,
    pub load: u32,
    pub capacity: u32,
}

struct NodeEntry {
    health: NodeHealth,
    last_seen_unix_ms: AtomicI64,
}

/// Held by a hub: every known node's last-reported load/capacity.
pub struct NodeRegistry {
    nodes: DashMap<String, NodeEntry>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self { nodes: DashMap::new() }
    }

    /// Records (or refreshes) a node's health report. `now_unix_ms` is
    /// passed in by the caller rather than read from the clock here, so
    /// this stays trivially testable.
    pub fn report_health(&self, health: NodeHealth, now_unix_ms: i64) {
        self.nodes.insert(health.node_id.clone(), NodeEntry { health, last_seen_unix_ms: AtomicI64::new(now_unix_ms) });
    }

    fn is_online(&self, entry: &NodeEntry, now_unix_ms: i64) -> bool {
        let age_ms = now_unix_ms - entry.last_seen_unix_ms.load(Ordering::SeqCst);
        age_ms >= 0 && age_ms < OFFLINE_AFTER.as_millis() as i64
    }

    /// Picks the online node with the lowest `load / capacity` ratio
    /// (spec.md: "pick a node using load/capacity"). A node at full
    /// capacity (`load >= capacity`) is never chosen.
    pub fn pick_node(&self, now_unix_ms: i64) -> Result<String> {
        self.nodes
            .iter()
            .filter(|e| self.is_online(e.value(), now_unix_ms))
            .filter(|e| e.value().health.load < e.value().health.capacity)
            .min_by(|a, b| {
                let ratio = |h: &NodeHealth| h.load as f64 / h.capacity.max(1) as f64;
                ratio(&a.value().health).partial_cmp(&ratio(&b.value().health)).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|e| e.key().clone())
            .ok_or_else(|| KernelError::SandboxUnavailable("no online cluster node has spare capacity".into()))
    }

    pub fn list(&self, now_unix_ms: i64) -> Vec<(NodeHealth, bool)> {
        self.nodes.iter().map(|e| (e.value().health.clone(), self.is_online(e.value(), now_unix_ms))).collect()
    }

    pub fn endpoint(&self, node_id: &str) -> Option<String> {
        self.nodes.get(node_id).map(|e| e.value().health.endpoint.clone())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Forwards a spawn request to the chosen node's HTTP control plane.
/// Kept deliberately thin: the wire shape this posts is the same
/// `process.spawn` command body the WS protocol accepts, just delivered
/// over a plain REST hop hub-to-node instead of hub-to-client.
pub async fn forward_spawn(client: &reqwest::Client, endpoint: &str, config: &serde_json::Value) -> Result<serde_json::Value> {
    let url = format!("{}/api/cluster/spawn", endpoint.trim_end_matches('/'));
    let resp = client.post(&url).json(config).send().await.map_err(|e| KernelError::NetworkError(format!("Network error: {e}")))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(KernelError::NetworkError(format!("HTTP {}", status.as_u16())));
    }
    resp.json().await.map_err(|e| KernelError::NetworkError(format!("Network error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_least_loaded_node() {
        let registry = NodeRegistry::new();
        registry.report_health(NodeHealth { node_id: "a".into(), endpoint: "http://a".into(), load: 8, capacity: 10 }, 1000);
        registry.report_health(NodeHealth { node_id: "b".into(), endpoint: "http://b".into(), load: 1, capacity: 10 }, 1000);
        assert_eq!(registry.pick_node(1000).unwrap(), "b");
    }

    #[test]
    fn stale_nodes_are_skipped() {
        let registry = NodeRegistry::new();
        registry.report_health(NodeHealth { node_id: "a".into(), endpoint: "http://a".into(), load: 1, capacity: 10 }, 1000);
        let now = 1000 + OFFLINE_AFTER.as_millis() as i64 + 1;
        assert!(registry.pick_node(now).is_err());
    }

    #[test]
    fn full_capacity_nodes_are_never_chosen() {
        let registry = NodeRegistry::new();
        registry.report_health(NodeHealth { node_id: "a".into(), endpoint: "http://a".into(), load: 10, capacity: 10 }, 1000);
        assert!(registry.pick_node(1000).is_err());
    }
}
