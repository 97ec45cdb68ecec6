//! Simulated leader election
//!
//! Lifecycle operations submit affected collections over a channel; a single
//! worker drains the channel, honoring one global minimum-interval throttle
//! between passes. A pass is a no-op for any shard that already has a leader
//! on a live node. Election failures never propagate into the operation that
//! triggered them; the worker logs them and moves on.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::error::SimResult;
use crate::metadata::{NodeId, ReplicaState, ReplicaType};
use crate::provider::{CoreState, SimClusterStateProvider};

/// One election request: the collections touched by an operation.
#[derive(Debug)]
pub(crate) struct ElectionRequest {
    pub(crate) collections: BTreeSet<String>,
    /// Persist the snapshot even when no leader changed.
    pub(crate) save_state: bool,
}

/// Outcome of electing one shard's leader.
#[derive(Debug, Clone, Copy, Default)]
struct ShardElection {
    /// A leader flag was set or cleared.
    leader_changed: bool,
    /// Any replica record was mutated (flags or down-marking).
    mutated: bool,
}

pub(crate) fn spawn_election_worker(
    provider: Arc<SimClusterStateProvider>,
    mut rx: mpsc::UnboundedReceiver<ElectionRequest>,
) {
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            provider.leader_throttle.minimum_wait_between_actions().await;
            provider.leader_throttle.mark_attempting_action();
            match provider
                .run_leader_election(&request.collections, request.save_state)
                .await
            {
                Ok(changed) => {
                    debug!(
                        "election pass over {:?} done, leaders changed: {}",
                        request.collections, changed
                    );
                }
                Err(e) => {
                    warn!("leader election failed: {}", e);
                }
            }
            provider.election_done();
        }
    });
}

impl SimClusterStateProvider {
    /// Run one election pass over the given collections. Returns whether any
    /// leader assignment changed.
    pub(crate) async fn run_leader_election(
        &self,
        collections: &BTreeSet<String>,
        save_state: bool,
    ) -> SimResult<bool> {
        let mut state = self.core.lock().await;
        let live = self.live_nodes.get();

        let mut leader_changed = false;
        let mut mutated = false;
        for collection in collections {
            let mut shards = state.registry.shards_of(collection);
            if let Some(props) = state.shard_props.get(collection) {
                shards.extend(props.keys().cloned());
            }
            for shard in shards {
                let outcome = elect_shard_leader(&mut state, &live, collection, &shard);
                leader_changed |= outcome.leader_changed;
                mutated |= outcome.mutated;
            }
        }

        if leader_changed || save_state {
            self.save_cluster_state_locked(&state)?;
        } else if mutated {
            self.invalidate_cached_state();
        }
        Ok(leader_changed)
    }
}

/// Elect a leader for one shard, if it needs one.
fn elect_shard_leader(
    state: &mut CoreState,
    live: &BTreeSet<NodeId>,
    collection: &str,
    shard: &str,
) -> ShardElection {
    let ids = state.registry.shard_replica_ids(collection, shard);
    if ids.is_empty() {
        return ShardElection::default();
    }

    let has_live_leader = ids.iter().any(|id| {
        let replica = state.registry.get(*id).expect("indexed replica exists");
        replica.is_leader() && live.contains(&replica.node)
    });
    if has_live_leader {
        trace!("{}/{} already has a leader", collection, shard);
        return ShardElection::default();
    }

    let mut outcome = ShardElection::default();
    let mut candidates = Vec::new();
    for id in &ids {
        let replica = state.registry.get_mut(*id).expect("indexed replica exists");
        if replica.set_leader(false) {
            outcome.leader_changed = true;
            outcome.mutated = true;
        }
        if live.contains(&replica.node) {
            candidates.push(*id);
        } else if replica.state() != ReplicaState::Down {
            replica.set_state(ReplicaState::Down);
            outcome.mutated = true;
        }
    }

    if candidates.is_empty() {
        warn!("no live replicas for {}/{}, leaving leaderless", collection, shard);
        return outcome;
    }

    let winner = candidates.iter().copied().find(|id| {
        state.registry.get(*id).expect("indexed replica exists").replica_type != ReplicaType::Pull
    });
    let Some(winner) = winner else {
        warn!(
            "no electable replica type for {}/{}, leaving leaderless",
            collection, shard
        );
        return outcome;
    };

    let replica = state.registry.get_mut(winner).expect("indexed replica exists");
    replica.set_leader(true);
    info!(
        "elected new leader for {}/{}: {} on {}",
        collection, shard, replica.name, replica.node
    );
    outcome.leader_changed = true;
    outcome.mutated = true;
    outcome
}
