//! Replica placement policy
//!
//! The simulator never decides replica locations itself; it asks a
//! [`PlacementPolicy`] for (node, shard, type) assignments and releases the
//! returned session when done.

use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::metadata::{ClusterSnapshot, NodeId, ReplicaType};

/// A request for replica positions.
#[derive(Debug, Clone)]
pub struct PlacementRequest {
    pub collection: String,
    /// Shards needing replicas, in creation order.
    pub shards: Vec<String>,
    /// Replica counts per shard, by type.
    pub nrt_replicas: usize,
    pub tlog_replicas: usize,
    pub pull_replicas: usize,
}

/// One assignment produced by the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaPosition {
    pub shard: String,
    pub node: NodeId,
    pub replica_type: ReplicaType,
    /// Ordinal of this position within its shard, starting at 0.
    pub index: usize,
}

/// Releasable handle wrapping the computed positions. Callers must release
/// the session once the positions have been consumed.
#[derive(Debug)]
pub struct PlacementSession {
    positions: Vec<ReplicaPosition>,
    released: bool,
}

impl PlacementSession {
    pub fn new(positions: Vec<ReplicaPosition>) -> Self {
        Self {
            positions,
            released: false,
        }
    }

    pub fn positions(&self) -> &[ReplicaPosition] {
        &self.positions
    }

    pub fn release(mut self) -> Vec<ReplicaPosition> {
        self.released = true;
        std::mem::take(&mut self.positions)
    }
}

impl Drop for PlacementSession {
    fn drop(&mut self) {
        if !self.released {
            debug!("placement session dropped without release");
        }
    }
}

/// Placement policy evaluator.
pub trait PlacementPolicy: Send + Sync {
    /// Compute replica positions for `request` given the current cluster
    /// state and live nodes.
    fn assign(
        &self,
        snapshot: &ClusterSnapshot,
        live_nodes: &[NodeId],
        request: &PlacementRequest,
    ) -> SimResult<PlacementSession>;
}

/// Default policy: spread replicas over the least-loaded live nodes,
/// round-robin, with a deterministic tie-break on node id.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastLoadedPlacement;

impl PlacementPolicy for LeastLoadedPlacement {
    fn assign(
        &self,
        snapshot: &ClusterSnapshot,
        live_nodes: &[NodeId],
        request: &PlacementRequest,
    ) -> SimResult<PlacementSession> {
        if live_nodes.is_empty() {
            return Err(SimError::NoLiveNodes);
        }

        let mut candidates: Vec<&NodeId> = live_nodes.iter().collect();
        candidates.sort_by_key(|n| (snapshot.replicas_on(n), (*n).clone()));

        let per_shard = [
            (ReplicaType::Nrt, request.nrt_replicas),
            (ReplicaType::Tlog, request.tlog_replicas),
            (ReplicaType::Pull, request.pull_replicas),
        ];

        let mut positions = Vec::new();
        let mut cursor = 0usize;
        for shard in &request.shards {
            let mut index = 0usize;
            for (replica_type, count) in per_shard {
                for _ in 0..count {
                    let node = candidates[cursor % candidates.len()].clone();
                    cursor += 1;
                    positions.push(ReplicaPosition {
                        shard: shard.clone(),
                        node,
                        replica_type,
                        index,
                    });
                    index += 1;
                }
            }
        }

        debug!(
            "placed {} replicas for collection {}",
            positions.len(),
            request.collection
        );
        Ok(PlacementSession::new(positions))
    }
}
