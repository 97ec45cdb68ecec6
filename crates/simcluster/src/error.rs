//! Simulator error types

use crate::statestore::StoreError;

/// Result alias used across the simulator.
pub type SimResult<T> = Result<T, SimError>;

/// Simulator error
///
/// Validation errors indicate misuse of the simulation API and surface
/// synchronously to the caller; they are never retried.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Core name already exists somewhere in the registry.
    #[error("duplicate core name '{core}': already hosted on node {node}")]
    DuplicateCore { core: String, node: String },

    /// Target node is not in the live set.
    #[error("node {0} is not live")]
    NodeNotLive(String),

    /// Node is already a member of the live set.
    #[error("node {0} already exists")]
    NodeAlreadyExists(String),

    /// A required replica field is absent or inconsistent.
    #[error("invalid replica: {0}")]
    MissingField(String),

    /// No replica with that name in the given scope.
    #[error("replica {name} not found in {scope}")]
    ReplicaNotFound { scope: String, name: String },

    /// Hosted-replica counter would underflow.
    #[error("unexpected hosted replica count on node {0}: counter would go negative")]
    ResourceAccounting(String),

    #[error("collection {0} does not exist")]
    CollectionNotFound(String),

    #[error("shard {shard} does not exist in collection {collection}")]
    ShardNotFound { collection: String, shard: String },

    /// No live nodes available for replica placement.
    #[error("no live nodes available for replica placement")]
    NoLiveNodes,

    /// Optimistic write against the state store lost the race.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0} is not supported by the simulated cluster")]
    Unsupported(&'static str),
}
