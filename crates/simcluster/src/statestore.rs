//! Simulated distributed state store
//!
//! A path-addressed key/value store standing in for the coordination service
//! of a real cluster. Writes are version-checked (optimistic concurrency),
//! and entries can be created as ephemerals scoped to an owner id so that
//! removing the owner drops all of its markers at once.
//!
//! Documents written by the simulator:
//! - `/clusterstate.json`: the aggregate cluster-state tree
//! - `/clusterprops.json`: cluster-wide properties
//! - `/live_nodes/<node>`: one ephemeral marker per live node
//! - `/autoscaling/nodeAdded/<node>`: ephemeral, when subscribed
//! - `/autoscaling/nodeLost/<node>`: durable, when subscribed

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde_json::Value;

/// Well-known document paths.
pub mod paths {
    pub const CLUSTER_STATE: &str = "/clusterstate.json";
    pub const CLUSTER_PROPS: &str = "/clusterprops.json";
    pub const LIVE_NODES: &str = "/live_nodes";
    pub const NODE_ADDED: &str = "/autoscaling/nodeAdded";
    pub const NODE_LOST: &str = "/autoscaling/nodeLost";
}

/// State store error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Optimistic write raced with a concurrent update.
    #[error("version conflict at {path}: expected {expected}, found {actual}")]
    VersionConflict {
        path: String,
        expected: i64,
        actual: i64,
    },

    #[error("no data at {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A document value together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedData {
    pub data: Value,
    pub version: i64,
}

#[derive(Debug, Clone)]
struct Entry {
    data: Value,
    version: i64,
    /// Ephemeral owner id; `None` for durable entries.
    owner: Option<String>,
}

/// In-memory path-based store with versioned writes and ephemeral entries.
#[derive(Debug, Default)]
pub struct StateStore {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a durable empty entry if the path does not exist yet.
    pub fn make_path(&self, path: &str) {
        self.entries.write().entry(path.to_string()).or_insert(Entry {
            data: Value::Null,
            version: 0,
            owner: None,
        });
    }

    /// Create an ephemeral entry owned by `owner`, replacing any previous
    /// entry at that path.
    pub fn create_ephemeral(&self, path: &str, owner: &str) {
        self.entries.write().insert(
            path.to_string(),
            Entry {
                data: Value::Null,
                version: 0,
                owner: Some(owner.to_string()),
            },
        );
    }

    pub fn has_data(&self, path: &str) -> bool {
        self.entries.read().contains_key(path)
    }

    pub fn get_data(&self, path: &str) -> Option<VersionedData> {
        self.entries.read().get(path).map(|e| VersionedData {
            data: e.data.clone(),
            version: e.version,
        })
    }

    /// Write `data` at `path`, expecting the current version to be
    /// `expected`. An expected version of `-1` skips the check and creates
    /// the entry when absent. Returns the new version.
    pub fn set_data(&self, path: &str, data: Value, expected: i64) -> Result<i64, StoreError> {
        let mut entries = self.entries.write();
        match entries.get_mut(path) {
            Some(entry) => {
                if expected != -1 && entry.version != expected {
                    return Err(StoreError::VersionConflict {
                        path: path.to_string(),
                        expected,
                        actual: entry.version,
                    });
                }
                entry.data = data;
                entry.version += 1;
                Ok(entry.version)
            }
            None => {
                if expected != -1 {
                    return Err(StoreError::NotFound(path.to_string()));
                }
                entries.insert(
                    path.to_string(),
                    Entry {
                        data,
                        version: 0,
                        owner: None,
                    },
                );
                Ok(0)
            }
        }
    }

    pub fn remove(&self, path: &str) {
        self.entries.write().remove(path);
    }

    /// Names of the direct children under `parent`.
    pub fn list_children(&self, parent: &str) -> Vec<String> {
        let prefix = format!("{}/", parent.trim_end_matches('/'));
        self.entries
            .read()
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(|rest| rest.to_string())
            .collect()
    }

    /// Drop every ephemeral entry owned by `owner`.
    pub fn remove_ephemerals_of(&self, owner: &str) {
        self.entries
            .write()
            .retain(|_, e| e.owner.as_deref() != Some(owner));
    }
}
