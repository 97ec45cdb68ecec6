//! Replica record definitions

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::NodeId;

/// Property key holding a replica's lifecycle state.
pub const STATE_PROP: &str = "state";
/// Property key holding the leader flag.
pub const LEADER_PROP: &str = "leader";
/// Property key of the default simulated index-size metric.
pub const INDEX_SIZE_PROP: &str = "core.indexSize";
/// Metric value seeded on every newly created replica.
pub const DEFAULT_INDEX_SIZE_BYTES: u64 = 123_450_000;

/// Replica type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplicaType {
    /// Near-real-time replica; maintains its own index and can lead.
    Nrt,
    /// Transaction-log replica; can lead.
    Tlog,
    /// Pull replica; never leads.
    Pull,
}

impl ReplicaType {
    /// Single-letter tag used in generated core names.
    pub fn letter(&self) -> char {
        match self {
            ReplicaType::Nrt => 'n',
            ReplicaType::Tlog => 't',
            ReplicaType::Pull => 'p',
        }
    }
}

impl Default for ReplicaType {
    fn default() -> Self {
        Self::Nrt
    }
}

impl std::fmt::Display for ReplicaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicaType::Nrt => write!(f, "NRT"),
            ReplicaType::Tlog => write!(f, "TLOG"),
            ReplicaType::Pull => write!(f, "PULL"),
        }
    }
}

impl FromStr for ReplicaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NRT" => Ok(ReplicaType::Nrt),
            "TLOG" => Ok(ReplicaType::Tlog),
            "PULL" => Ok(ReplicaType::Pull),
            other => Err(format!("unknown replica type: {}", other)),
        }
    }
}

/// Replica lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaState {
    Down,
    Recovering,
    Active,
}

impl std::fmt::Display for ReplicaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicaState::Down => write!(f, "down"),
            ReplicaState::Recovering => write!(f, "recovering"),
            ReplicaState::Active => write!(f, "active"),
        }
    }
}

impl FromStr for ReplicaState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "down" => Ok(ReplicaState::Down),
            "recovering" => Ok(ReplicaState::Recovering),
            "active" => Ok(ReplicaState::Active),
            other => Err(format!("unknown replica state: {}", other)),
        }
    }
}

/// One physical copy of a shard, hosted on exactly one node.
///
/// The property bag carries the lifecycle state, the leader flag, and any
/// simulated metrics applied through the admin surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaRecord {
    /// Core name, globally unique across the registry.
    pub core: String,
    /// Replica name, unique within its shard.
    pub name: String,
    /// Owning collection.
    pub collection: String,
    /// Owning shard.
    pub shard: String,
    /// Replica type.
    pub replica_type: ReplicaType,
    /// Hosting node.
    pub node: NodeId,
    /// Mutable attribute bag (state, leader flag, metrics).
    pub properties: BTreeMap<String, Value>,
}

impl ReplicaRecord {
    pub fn new(
        core: impl Into<String>,
        name: impl Into<String>,
        collection: impl Into<String>,
        shard: impl Into<String>,
        replica_type: ReplicaType,
        node: impl Into<NodeId>,
    ) -> Self {
        Self {
            core: core.into(),
            name: name.into(),
            collection: collection.into(),
            shard: shard.into(),
            replica_type,
            node: node.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> ReplicaState {
        self.properties
            .get(STATE_PROP)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(ReplicaState::Down)
    }

    pub fn set_state(&mut self, state: ReplicaState) {
        self.properties
            .insert(STATE_PROP.to_string(), Value::String(state.to_string()));
    }

    pub fn is_leader(&self) -> bool {
        self.properties
            .get(LEADER_PROP)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Set or clear the leader flag. Returns true if the flag changed.
    pub fn set_leader(&mut self, leader: bool) -> bool {
        if leader {
            self.properties
                .insert(LEADER_PROP.to_string(), Value::Bool(true))
                != Some(Value::Bool(true))
        } else {
            self.properties.remove(LEADER_PROP).is_some()
        }
    }
}
