use std::collections::BTreeMap;

use fmesh_core::NodeEntry;
use serde::Serialize;

/// Latest aggregated snapshot of the mesh, keyed by node IP.
///
/// Replaced wholesale on every snapshot: the server's view is
/// authoritative, so nothing is merged across updates.
#[derive(Debug, Default, Serialize)]
pub struct ClusterView {
    updated_at: u32,
    nodes: BTreeMap<String, NodeEntry>,
}

impl ClusterView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the view with a fresh set of entries. Duplicate IPs within
    /// one snapshot keep the last occurrence.
    pub fn replace(&mut self, timestamp: u32, entries: Vec<NodeEntry>) {
        self.updated_at = timestamp;
        self.nodes = entries
            .into_iter()
            .map(|entry| (entry.ip.clone(), entry))
            .collect();
    }

    pub fn get(&self, ip: &str) -> Option<&NodeEntry> {
        self.nodes.get(ip)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Server timestamp of the snapshot currently held
    pub fn updated_at(&self) -> u32 {
        self.updated_at
    }
}
