//! Immutable, queryable view of the simulated cluster
//!
//! A [`ClusterSnapshot`] is a pure function of the replica registry and the
//! property stores at build time. All maps are `BTreeMap` so iteration order
//! is stable and snapshots can be compared by value.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::replica::{ReplicaRecord, ReplicaState, ReplicaType, LEADER_PROP, STATE_PROP};
use super::shard::{ShardRange, ShardState, PARENT_PROP, RANGE_PROP, SHARD_STATE_PROP};
use super::NodeId;

/// Snapshot format version.
pub const CLUSTER_STATE_FORMAT: u32 = 1;

/// Collection property naming the placement policy.
pub const POLICY_PROP: &str = "policy";
/// Collection property holding the NRT replication factor.
pub const REPLICATION_FACTOR_PROP: &str = "replicationFactor";
/// Collection property holding the TLOG replica count.
pub const TLOG_REPLICAS_PROP: &str = "tlogReplicas";
/// Collection property holding the PULL replica count.
pub const PULL_REPLICAS_PROP: &str = "pullReplicas";

/// Point-in-time view of one replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaView {
    pub name: String,
    pub core: String,
    pub node: NodeId,
    pub replica_type: ReplicaType,
    pub state: ReplicaState,
    pub leader: bool,
    /// Remaining replica properties (simulated metrics etc).
    pub properties: BTreeMap<String, Value>,
}

impl ReplicaView {
    pub fn from_record(record: &ReplicaRecord) -> Self {
        let mut properties = record.properties.clone();
        properties.remove(STATE_PROP);
        properties.remove(LEADER_PROP);
        Self {
            name: record.name.clone(),
            core: record.core.clone(),
            node: record.node.clone(),
            replica_type: record.replica_type,
            state: record.state(),
            leader: record.is_leader(),
            properties,
        }
    }
}

/// Point-in-time view of one shard and its replicas.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShardView {
    pub name: String,
    pub properties: BTreeMap<String, Value>,
    pub replicas: BTreeMap<String, ReplicaView>,
}

impl ShardView {
    pub fn state(&self) -> ShardState {
        self.properties
            .get(SHARD_STATE_PROP)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn range(&self) -> Option<ShardRange> {
        self.properties
            .get(RANGE_PROP)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }

    /// Parent shard name, present on sub-shards created by a split.
    pub fn parent(&self) -> Option<&str> {
        self.properties.get(PARENT_PROP).and_then(|v| v.as_str())
    }

    /// The replica currently carrying the leader flag, if any.
    pub fn leader(&self) -> Option<&ReplicaView> {
        self.replicas.values().find(|r| r.leader)
    }
}

/// Point-in-time view of one collection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollectionView {
    pub name: String,
    pub properties: BTreeMap<String, Value>,
    pub shards: BTreeMap<String, ShardView>,
}

impl CollectionView {
    pub fn shard(&self, name: &str) -> Option<&ShardView> {
        self.shards.get(name)
    }

    /// Find a replica by name anywhere in the collection.
    pub fn replica(&self, name: &str) -> Option<(&ShardView, &ReplicaView)> {
        self.shards
            .values()
            .find_map(|s| s.replicas.values().find(|r| r.name == name).map(|r| (s, r)))
    }

    pub fn policy(&self) -> Option<&str> {
        self.properties.get(POLICY_PROP).and_then(|v| v.as_str())
    }

    fn usize_prop(&self, key: &str) -> Option<usize> {
        self.properties.get(key).and_then(|v| v.as_u64()).map(|v| v as usize)
    }

    /// NRT replication factor (defaults to 1).
    pub fn replication_factor(&self) -> usize {
        self.usize_prop(REPLICATION_FACTOR_PROP).unwrap_or(1)
    }

    pub fn tlog_replicas(&self) -> usize {
        self.usize_prop(TLOG_REPLICAS_PROP).unwrap_or(0)
    }

    pub fn pull_replicas(&self) -> usize {
        self.usize_prop(PULL_REPLICAS_PROP).unwrap_or(0)
    }
}

/// Immutable value describing the whole simulated cluster.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub format: u32,
    pub live_nodes: BTreeSet<NodeId>,
    pub collections: BTreeMap<String, CollectionView>,
}

impl ClusterSnapshot {
    pub fn collection(&self, name: &str) -> Option<&CollectionView> {
        self.collections.get(name)
    }

    /// Number of replicas hosted on `node` across all collections.
    pub fn replicas_on(&self, node: &str) -> usize {
        self.collections
            .values()
            .flat_map(|c| c.shards.values())
            .flat_map(|s| s.replicas.values())
            .filter(|r| r.node == node)
            .count()
    }
}
