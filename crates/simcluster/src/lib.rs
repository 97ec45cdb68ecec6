//! simcluster - deterministic in-process cluster simulator
//!
//! Simulates a distributed cluster's topology and leadership state so that
//! cluster-management logic (replica placement, shard splitting, node churn,
//! leader failover) can be exercised without a real network or storage tier.
//!
//! # Features
//! - authoritative in-memory registry of nodes, collections, shards, replicas
//! - derived-state snapshot cache with skip-unchanged persistence
//! - asynchronous, throttled per-shard leader election
//! - per-collection virtual-time delays on lifecycle operations
//!
//! # Usage Example
//! ```ignore
//! use simcluster::{CreateCollectionRequest, SimClusterConfig, SimClusterStateProvider};
//!
//! let cluster = SimClusterStateProvider::new(SimClusterConfig::default());
//! cluster.sim_add_node("node1").await?;
//! cluster.sim_create_collection(CreateCollectionRequest::new("orders", 2, 3)).await?;
//! cluster.quiesce().await;
//! ```

pub mod autoscaling;
pub mod clock;
pub mod delay;
pub mod election;
pub mod error;
pub mod livenodes;
pub mod metadata;
pub mod mutator;
pub mod ops;
pub mod placement;
pub mod provider;
pub mod registry;
pub mod router;
pub mod statestore;
pub mod throttle;

// Re-export commonly used types
pub use error::{SimError, SimResult};
pub use ops::{AddReplicaRequest, CreateCollectionRequest, MoveReplicaRequest};
pub use provider::{ClusterStateProvider, SimClusterStateProvider};

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimClusterConfig {
    /// Cluster name (informational).
    pub cluster_name: String,
    /// Virtual time a restored node's replicas spend recovering.
    pub recovery_delay_ms: u64,
    /// Global minimum interval between leader-election passes.
    pub leader_throttle_ms: u64,
    /// Seed for the simulation RNG.
    pub seed: u64,
}

impl Default for SimClusterConfig {
    fn default() -> Self {
        Self {
            cluster_name: "default".to_string(),
            recovery_delay_ms: 1000,
            leader_throttle_ms: 5000,
            seed: 0,
        }
    }
}
