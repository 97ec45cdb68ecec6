//! Cluster metadata definitions
//!
//! Core data structures for replicas, shards, and the derived cluster
//! snapshot.

mod replica;
mod shard;
mod snapshot;

pub use replica::{
    ReplicaRecord, ReplicaState, ReplicaType, DEFAULT_INDEX_SIZE_BYTES, INDEX_SIZE_PROP,
    LEADER_PROP, STATE_PROP,
};
pub use shard::{ShardRange, ShardState, PARENT_PROP, RANGE_PROP, SHARD_STATE_PROP};
pub use snapshot::{
    ClusterSnapshot, CollectionView, ReplicaView, ShardView, CLUSTER_STATE_FORMAT, POLICY_PROP,
    PULL_REPLICAS_PROP, REPLICATION_FACTOR_PROP, TLOG_REPLICAS_PROP,
};

/// Node identifier
pub type NodeId = String;
