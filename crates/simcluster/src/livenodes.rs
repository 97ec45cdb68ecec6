//! Live node membership
//!
//! Tracks which node ids are currently live and maintains the matching
//! markers in the state store: an ephemeral `/live_nodes/<node>` entry per
//! live node, an ephemeral node-added marker when the autoscaling
//! configuration subscribes to node-added events, and a durable node-lost
//! marker (cleared elsewhere) when it subscribes to node-lost events.

use std::collections::BTreeSet;

use parking_lot::RwLock;
use rand::Rng;

use crate::autoscaling::{AutoScalingConfig, TriggerEventType};
use crate::metadata::NodeId;
use crate::statestore::{paths, StateStore};

#[derive(Debug, Default)]
pub struct LiveNodeSet {
    nodes: RwLock<BTreeSet<NodeId>>,
}

impl LiveNodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes.read().contains(node)
    }

    pub fn get(&self) -> BTreeSet<NodeId> {
        self.nodes.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn clear(&self) {
        self.nodes.write().clear();
    }

    /// Add the node and create its ephemeral markers. Returns false if the
    /// node was already live.
    pub fn register(&self, store: &StateStore, cfg: &AutoScalingConfig, node: &str) -> bool {
        let added = self.nodes.write().insert(node.to_string());
        store.create_ephemeral(&format!("{}/{}", paths::LIVE_NODES, node), node);
        if cfg.has_trigger_for(TriggerEventType::NodeAdded) {
            store.create_ephemeral(&format!("{}/{}", paths::NODE_ADDED, node), node);
        }
        added
    }

    /// Remove the node, drop its ephemeral markers, and write the durable
    /// node-lost marker when subscribed. Returns false if the node was not
    /// live.
    pub fn unregister(&self, store: &StateStore, cfg: &AutoScalingConfig, node: &str) -> bool {
        let removed = self.nodes.write().remove(node);
        store.remove_ephemerals_of(node);
        if cfg.has_trigger_for(TriggerEventType::NodeLost) {
            store.make_path(&format!("{}/{}", paths::NODE_LOST, node));
        }
        removed
    }

    /// Pick one of the live nodes at random.
    pub fn pick_random<R: Rng>(&self, rng: &mut R) -> Option<NodeId> {
        let nodes = self.nodes.read();
        if nodes.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..nodes.len());
        nodes.iter().nth(idx).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_register_creates_markers() {
        let store = StateStore::new();
        let cfg = AutoScalingConfig::new().with_trigger(TriggerEventType::NodeAdded);
        let live = LiveNodeSet::new();

        assert!(live.register(&store, &cfg, "n1"));
        assert!(!live.register(&store, &cfg, "n1"));
        assert!(store.has_data("/live_nodes/n1"));
        assert!(store.has_data("/autoscaling/nodeAdded/n1"));
    }

    #[test]
    fn test_unregister_writes_node_lost_marker() {
        let store = StateStore::new();
        let cfg = AutoScalingConfig::new().with_trigger(TriggerEventType::NodeLost);
        let live = LiveNodeSet::new();

        live.register(&store, &cfg, "n1");
        assert!(live.unregister(&store, &cfg, "n1"));
        assert!(!store.has_data("/live_nodes/n1"));
        // durable marker survives the owner
        assert!(store.has_data("/autoscaling/nodeLost/n1"));
    }

    #[test]
    fn test_pick_random_is_seed_stable() {
        let store = StateStore::new();
        let cfg = AutoScalingConfig::new();
        let live = LiveNodeSet::new();
        for n in ["n1", "n2", "n3"] {
            live.register(&store, &cfg, n);
        }

        let a = live.pick_random(&mut StdRng::seed_from_u64(7));
        let b = live.pick_random(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert!(a.is_some());
    }
}
