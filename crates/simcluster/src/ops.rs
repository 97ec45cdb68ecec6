//! Lifecycle operations
//!
//! The externally-invoked operations that mutate the simulated cluster:
//! node churn, replica add/remove/move, collection and shard lifecycle, and
//! property/metric writes. Each operation runs under the shared mutation
//! lock, applies its configured virtual-time delay, invalidates the snapshot
//! cache, and submits affected collections for leader election.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::delay::OpKind;
use crate::error::{SimError, SimResult};
use crate::metadata::{
    ClusterSnapshot, NodeId, ReplicaRecord, ReplicaState, ReplicaType, ShardState,
    DEFAULT_INDEX_SIZE_BYTES, INDEX_SIZE_PROP, PARENT_PROP, RANGE_PROP, SHARD_STATE_PROP,
};
use crate::mutator::ClusterStateMutator;
use crate::placement::PlacementRequest;
use crate::provider::{CoreState, SimClusterStateProvider};

/// Request to create a collection.
#[derive(Debug, Clone)]
pub struct CreateCollectionRequest {
    pub name: String,
    pub num_shards: usize,
    /// NRT replicas per shard.
    pub replication_factor: usize,
    pub tlog_replicas: usize,
    pub pull_replicas: usize,
    /// Placement policy name recorded on the collection.
    pub policy: Option<String>,
    /// Additional collection properties.
    pub properties: BTreeMap<String, Value>,
}

impl CreateCollectionRequest {
    pub fn new(name: impl Into<String>, num_shards: usize, replication_factor: usize) -> Self {
        Self {
            name: name.into(),
            num_shards,
            replication_factor,
            tlog_replicas: 0,
            pull_replicas: 0,
            policy: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    pub fn with_replica_types(mut self, tlog: usize, pull: usize) -> Self {
        self.tlog_replicas = tlog;
        self.pull_replicas = pull;
        self
    }
}

/// Request to add one replica, letting the placement policy pick the node
/// when none is given.
#[derive(Debug, Clone)]
pub struct AddReplicaRequest {
    pub collection: String,
    pub shard: String,
    pub replica_type: ReplicaType,
    pub node: Option<NodeId>,
}

/// Request to move a replica to another node.
#[derive(Debug, Clone)]
pub struct MoveReplicaRequest {
    pub collection: String,
    /// Replica name to move.
    pub replica: String,
    pub target_node: NodeId,
}

impl SimClusterStateProvider {
    // ---------- node churn ----------

    /// Add a new node to the cluster.
    pub async fn sim_add_node(&self, node: &str) -> SimResult<()> {
        if self.live_nodes.contains(node) {
            return Err(SimError::NodeAlreadyExists(node.to_string()));
        }
        let cfg = self.autoscaling.read().clone();
        self.live_nodes.register(&self.store, &cfg, node);
        let mut state = self.core.lock().await;
        state.hosted.entry(node.to_string()).or_insert(0);
        self.invalidate_cached_state();
        info!("added node {}", node);
        Ok(())
    }

    /// Remove a node, as when a node is lost. Its replicas are marked DOWN
    /// but not deleted. Returns whether the node was live.
    pub async fn sim_remove_node(&self, node: &str) -> bool {
        let mut state = self.core.lock().await;
        let mut affected = BTreeSet::new();
        state.registry.for_each_on_node_mut(node, |replica| {
            replica.set_state(ReplicaState::Down);
            affected.insert(replica.collection.clone());
        });
        let cfg = self.autoscaling.read().clone();
        let removed = self.live_nodes.unregister(&self.store, &cfg, node);
        state.hosted.remove(node);
        self.invalidate_cached_state();
        drop(state);

        if !affected.is_empty() {
            self.submit_election(affected, true);
        }
        info!("removed node {}", node);
        removed
    }

    /// Restore a previously removed node, simulating a short replica
    /// recovery. Returns whether any replicas were restored.
    pub async fn sim_restore_node(&self, node: &str) -> bool {
        let cfg = self.autoscaling.read().clone();
        self.live_nodes.register(&self.store, &cfg, node);

        let mut affected = BTreeSet::new();
        {
            let mut state = self.core.lock().await;
            state.registry.for_each_on_node_mut(node, |replica| {
                replica.set_state(ReplicaState::Recovering);
                affected.insert(replica.collection.clone());
            });
            self.invalidate_cached_state();
        }

        self.clock.sleep(self.config.recovery_delay_ms).await;

        {
            let mut state = self.core.lock().await;
            state.registry.for_each_on_node_mut(node, |replica| {
                replica.set_state(ReplicaState::Active);
            });
            let count = state.registry.count_on_node(node);
            state.hosted.insert(node.to_string(), count);
            self.invalidate_cached_state();
        }

        info!("restored node {} ({} collections affected)", node, affected.len());
        if affected.is_empty() {
            false
        } else {
            self.submit_election(affected, true);
            true
        }
    }

    // ---------- replicas ----------

    /// Add a fully specified replica to a node.
    pub async fn sim_add_replica(
        &self,
        node: &str,
        record: ReplicaRecord,
        run_election: bool,
    ) -> SimResult<()> {
        let mut state = self.core.lock().await;
        self.add_replica_locked(&mut state, node, record, run_election)
            .await
    }

    /// Add a replica, filling in the node from the placement policy when the
    /// request leaves it open.
    pub async fn sim_add_replica_assigned(&self, request: AddReplicaRequest) -> SimResult<()> {
        let snapshot = self.cluster_state().await;
        if snapshot.collection(&request.collection).is_none() {
            return Err(SimError::CollectionNotFound(request.collection));
        }

        let node = match request.node {
            Some(node) => node,
            None => {
                let live: Vec<NodeId> = self.live_nodes.get().into_iter().collect();
                let placement_request = PlacementRequest {
                    collection: request.collection.clone(),
                    shards: vec![request.shard.clone()],
                    nrt_replicas: usize::from(request.replica_type == ReplicaType::Nrt),
                    tlog_replicas: usize::from(request.replica_type == ReplicaType::Tlog),
                    pull_replicas: usize::from(request.replica_type == ReplicaType::Pull),
                };
                let session = self
                    .placement
                    .assign(&snapshot, &live, &placement_request)?;
                let mut positions = session.release();
                if positions.is_empty() {
                    return Err(SimError::NoLiveNodes);
                }
                positions.remove(0).node
            }
        };

        let mut state = self.core.lock().await;
        let seq = state.next_replica_seq(&request.collection);
        let core = format!(
            "{}_{}_replica_{}{}",
            request.collection,
            request.shard,
            request.replica_type.letter(),
            seq
        );
        let record = ReplicaRecord::new(
            core,
            format!("core_node{}", seq),
            request.collection,
            request.shard,
            request.replica_type,
            node.clone(),
        );
        self.add_replica_locked(&mut state, &node, record, true).await
    }

    pub(crate) async fn add_replica_locked(
        &self,
        state: &mut CoreState,
        node: &str,
        mut record: ReplicaRecord,
        run_election: bool,
    ) -> SimResult<()> {
        if record.core.is_empty() {
            return Err(SimError::MissingField("missing core name".to_string()));
        }
        if record.name.is_empty() {
            return Err(SimError::MissingField("missing replica name".to_string()));
        }
        if record.node.is_empty() {
            return Err(SimError::MissingField("missing node".to_string()));
        }
        if record.node != node {
            return Err(SimError::MissingField(format!(
                "replica node {} does not match target node {}",
                record.node, node
            )));
        }
        if let Some(existing) = state.registry.find_by_core(&record.core) {
            return Err(SimError::DuplicateCore {
                core: record.core.clone(),
                node: existing.node.clone(),
            });
        }
        if !self.live_nodes.contains(node) {
            return Err(SimError::NodeNotLive(node.to_string()));
        }

        self.op_delay(state, &record.collection, OpKind::AddReplica).await;

        record.set_state(ReplicaState::Active);
        record
            .properties
            .insert(INDEX_SIZE_PROP.to_string(), json!(DEFAULT_INDEX_SIZE_BYTES));
        let collection = record.collection.clone();
        debug!("adding replica {} ({}) on {}", record.name, record.core, node);
        state.registry.insert(record)?;
        self.invalidate_cached_state();
        *state.hosted.entry(node.to_string()).or_insert(0) += 1;

        if run_election {
            self.submit_election([collection], true);
        }
        Ok(())
    }

    /// Remove a replica by name from a node.
    pub async fn sim_remove_replica(&self, node: &str, replica_name: &str) -> SimResult<()> {
        let mut state = self.core.lock().await;
        let Some(record) = state.registry.remove_on_node(node, replica_name) else {
            return Err(SimError::ReplicaNotFound {
                scope: format!("node {}", node),
                name: replica_name.to_string(),
            });
        };

        self.op_delay(&state, &record.collection, OpKind::DeleteReplica).await;
        self.invalidate_cached_state();

        if self.live_nodes.contains(node) {
            let counter = state.hosted.entry(node.to_string()).or_insert(0);
            if *counter == 0 {
                return Err(SimError::ResourceAccounting(node.to_string()));
            }
            *counter -= 1;
        }
        debug!("removed replica {} from {}", replica_name, node);
        self.submit_election([record.collection], true);
        Ok(())
    }

    /// Move a replica to another node: add the new copy without election,
    /// then remove the old one with election. Deliberately not atomic, the
    /// shard transiently has an extra and then a missing replica, as in a
    /// real two-phase migration.
    pub async fn sim_move_replica(&self, request: MoveReplicaRequest) -> SimResult<()> {
        let snapshot = self.cluster_state().await;
        let coll = snapshot
            .collection(&request.collection)
            .ok_or_else(|| SimError::CollectionNotFound(request.collection.clone()))?;
        let (shard, replica) = coll.replica(&request.replica).ok_or_else(|| {
            SimError::ReplicaNotFound {
                scope: format!("collection {}", request.collection),
                name: request.replica.clone(),
            }
        })?;
        let source_node = replica.node.clone();
        let shard_name = shard.name.clone();
        let replica_type = replica.replica_type;

        {
            let mut state = self.core.lock().await;
            self.op_delay(&state, &request.collection, OpKind::MoveReplica).await;

            let seq = state.next_replica_seq(&request.collection);
            let core = format!(
                "{}_{}_replica_{}{}",
                request.collection,
                shard_name,
                replica_type.letter(),
                seq
            );
            let record = ReplicaRecord::new(
                core,
                format!("core_node{}", seq),
                request.collection.clone(),
                shard_name.clone(),
                replica_type,
                request.target_node.clone(),
            );
            debug!(
                "moving replica {}/{} from {} to {}",
                request.collection, request.replica, source_node, request.target_node
            );
            self.add_replica_locked(&mut state, &request.target_node, record, false)
                .await?;
        }

        self.sim_remove_replica(&source_node, &request.replica).await
    }

    // ---------- collections ----------

    /// Create a collection, asking the placement policy for replica
    /// positions. Reports success without change when it already exists.
    pub async fn sim_create_collection(&self, request: CreateCollectionRequest) -> SimResult<()> {
        let snapshot = self.cluster_state().await;
        let Some(descriptor) =
            ClusterStateMutator::create_collection(&snapshot, &request, self.router.as_ref())
        else {
            warn!("collection {} already exists", request.name);
            return Ok(());
        };
        let live: Vec<NodeId> = self.live_nodes.get().into_iter().collect();

        let mut state = self.core.lock().await;
        state.delays.seed_collection(&request.name);
        self.op_delay(&state, &request.name, OpKind::Create).await;

        let placement_request = PlacementRequest {
            collection: request.name.clone(),
            shards: descriptor.shards.iter().map(|s| s.name.clone()).collect(),
            nrt_replicas: request.replication_factor,
            tlog_replicas: request.tlog_replicas,
            pull_replicas: request.pull_replicas,
        };
        let session = self.placement.assign(&snapshot, &live, &placement_request)?;
        let positions = session.release();

        for (ordinal, position) in positions.iter().enumerate() {
            let seq = state.next_replica_seq(&request.name);
            let core = format!(
                "{}_{}_replica_{}{}",
                request.name,
                position.shard,
                position.replica_type.letter(),
                ordinal + 1
            );
            let record = ReplicaRecord::new(
                core,
                format!("core_node{}", seq),
                request.name.clone(),
                position.shard.clone(),
                position.replica_type,
                position.node.clone(),
            );
            self.add_replica_locked(&mut state, &position.node, record, false)
                .await?;
        }

        state
            .collection_props
            .insert(request.name.clone(), descriptor.properties);
        let shard_map = state.shard_props.entry(request.name.clone()).or_default();
        for shard in descriptor.shards {
            shard_map.insert(shard.name.clone(), shard.properties);
        }
        self.invalidate_cached_state();
        drop(state);

        info!(
            "created collection {} with {} shards, {} replicas",
            request.name,
            request.num_shards,
            positions.len()
        );
        self.submit_election([request.name], true);
        Ok(())
    }

    /// Delete a collection: all property entries and every replica.
    pub async fn sim_delete_collection(&self, collection: &str) -> SimResult<()> {
        let mut state = self.core.lock().await;
        self.op_delay(&state, collection, OpKind::Delete).await;

        state.collection_props.remove(collection);
        state.shard_props.remove(collection);
        state.delays.remove_collection(collection);

        let removed = state.registry.remove_collection(collection);
        for record in &removed {
            if self.live_nodes.contains(&record.node) {
                let counter = state.hosted.entry(record.node.clone()).or_insert(0);
                if *counter == 0 {
                    return Err(SimError::ResourceAccounting(record.node.clone()));
                }
                *counter -= 1;
            }
        }
        info!("deleted collection {} ({} replicas)", collection, removed.len());
        self.save_cluster_state_locked(&state)?;
        Ok(())
    }

    /// Remove every collection and reset all hosted counters.
    pub async fn sim_delete_all_collections(&self) -> SimResult<()> {
        let mut state = self.core.lock().await;
        state.registry.clear();
        state.collection_props.clear();
        state.shard_props.clear();
        for counter in state.hosted.values_mut() {
            *counter = 0;
        }
        self.save_cluster_state_locked(&state)?;
        Ok(())
    }

    // ---------- shards ----------

    /// Create a new, empty shard and replicate it per the collection's
    /// replica counts. Reports success without change when it already exists.
    pub async fn sim_create_shard(&self, collection: &str, shard: &str) -> SimResult<()> {
        let snapshot = self.cluster_state().await;
        let coll = snapshot
            .collection(collection)
            .ok_or_else(|| SimError::CollectionNotFound(collection.to_string()))?;
        let Some(descriptor) = ClusterStateMutator::create_shard(&snapshot, collection, shard)
        else {
            warn!("shard {}/{} already exists", collection, shard);
            return Ok(());
        };
        let nrt = coll.replication_factor();
        let tlog = coll.tlog_replicas();
        let pull = coll.pull_replicas();
        let live: Vec<NodeId> = self.live_nodes.get().into_iter().collect();

        let mut state = self.core.lock().await;
        self.op_delay(&state, collection, OpKind::CreateShard).await;

        let props = state
            .shard_props
            .entry(collection.to_string())
            .or_default()
            .entry(shard.to_string())
            .or_default();
        props.clear();
        for (key, value) in descriptor.properties {
            if key != RANGE_PROP && key != "replicas" {
                props.insert(key, value);
            }
        }

        let placement_request = PlacementRequest {
            collection: collection.to_string(),
            shards: vec![shard.to_string()],
            nrt_replicas: nrt,
            tlog_replicas: tlog,
            pull_replicas: pull,
        };
        let session = self.placement.assign(&snapshot, &live, &placement_request)?;
        let positions = session.release();
        for (ordinal, position) in positions.iter().enumerate() {
            let seq = state.next_replica_seq(collection);
            let core = format!(
                "{}_{}_replica_{}{}",
                collection,
                position.shard,
                position.replica_type.letter(),
                ordinal + 1
            );
            let record = ReplicaRecord::new(
                core,
                format!("core_node{}", seq),
                collection.to_string(),
                position.shard.clone(),
                position.replica_type,
                position.node.clone(),
            );
            self.add_replica_locked(&mut state, &position.node, record, false)
                .await?;
        }
        self.invalidate_cached_state();
        drop(state);

        info!("created shard {}/{} with {} replicas", collection, shard, positions.len());
        self.submit_election([collection.to_string()], true);
        Ok(())
    }

    /// Split a shard in two. The parent is marked inactive but retained; the
    /// sub-shards partition its hash range and replicate at the parent's
    /// replica count.
    pub async fn sim_split_shard(
        &self,
        collection: &str,
        shard: Option<&str>,
        split_key: Option<&str>,
    ) -> SimResult<()> {
        let snapshot = self.cluster_state().await;
        let coll = snapshot
            .collection(collection)
            .ok_or_else(|| SimError::CollectionNotFound(collection.to_string()))?;

        let parent_name = match shard {
            Some(name) => {
                coll.shard(name).ok_or_else(|| SimError::ShardNotFound {
                    collection: collection.to_string(),
                    shard: name.to_string(),
                })?;
                name.to_string()
            }
            None => {
                let key = split_key.ok_or_else(|| {
                    SimError::MissingField("shard name or split key required".to_string())
                })?;
                let hash = self.router.key_hash(key);
                coll.shards
                    .values()
                    .filter(|s| s.state() == ShardState::Active)
                    .find(|s| s.range().map(|r| r.contains(hash)).unwrap_or(false))
                    .map(|s| s.name.clone())
                    .ok_or_else(|| SimError::ShardNotFound {
                        collection: collection.to_string(),
                        shard: format!("<key {}>", key),
                    })?
            }
        };
        let parent = coll.shard(&parent_name).expect("parent shard resolved");
        let parent_range = parent.range().unwrap_or_else(|| self.router.full_range());
        let replica_count = parent.replicas.len();

        let sub_ranges = self.router.split(&parent_range, 2);
        let sub_names = self.router.sub_shard_names(&parent_name, 2);
        let live: Vec<NodeId> = self.live_nodes.get().into_iter().collect();

        let mut state = self.core.lock().await;
        self.op_delay(&state, collection, OpKind::SplitShard).await;

        let shards = state.shard_props.entry(collection.to_string()).or_default();
        shards
            .entry(parent_name.clone())
            .or_default()
            .insert(
                SHARD_STATE_PROP.to_string(),
                json!(ShardState::Inactive.to_string()),
            );
        for (name, range) in sub_names.iter().zip(&sub_ranges) {
            let props = shards.entry(name.clone()).or_default();
            props.insert(RANGE_PROP.to_string(), json!(range.to_string()));
            props.insert(PARENT_PROP.to_string(), json!(parent_name.clone()));
            props.insert(
                SHARD_STATE_PROP.to_string(),
                json!(ShardState::Active.to_string()),
            );
        }

        // Sub-shard replicas are always requested as NRT at the parent's
        // replica count; the parent's actual type mix is not forwarded.
        let placement_request = PlacementRequest {
            collection: collection.to_string(),
            shards: sub_names.clone(),
            nrt_replicas: replica_count,
            tlog_replicas: 0,
            pull_replicas: 0,
        };
        let session = self.placement.assign(&snapshot, &live, &placement_request)?;
        for position in session.release() {
            let seq = state.next_replica_seq(collection);
            let core = format!("{}_{}_replica{}", collection, position.shard, position.index);
            let record = ReplicaRecord::new(
                core,
                format!("core_node{}", seq),
                collection.to_string(),
                position.shard.clone(),
                position.replica_type,
                position.node.clone(),
            );
            self.add_replica_locked(&mut state, &position.node, record, false)
                .await?;
        }
        self.invalidate_cached_state();
        drop(state);

        info!(
            "split shard {}/{} into {:?}",
            collection, parent_name, sub_names
        );
        self.submit_election([collection.to_string()], true);
        Ok(())
    }

    /// Delete a shard: its properties and every replica belonging to it.
    pub async fn sim_delete_shard(&self, collection: &str, shard: &str) -> SimResult<()> {
        let snapshot = self.cluster_state().await;
        let coll = snapshot
            .collection(collection)
            .ok_or_else(|| SimError::CollectionNotFound(collection.to_string()))?;
        if coll.shard(shard).is_none() {
            return Err(SimError::ShardNotFound {
                collection: collection.to_string(),
                shard: shard.to_string(),
            });
        }

        let mut state = self.core.lock().await;
        self.op_delay(&state, collection, OpKind::DeleteShard).await;

        if let Some(shards) = state.shard_props.get_mut(collection) {
            shards.remove(shard);
        }
        let removed = state.registry.remove_shard(collection, shard);
        self.invalidate_cached_state();
        info!("deleted shard {}/{} ({} replicas)", collection, shard, removed.len());
        Ok(())
    }

    // ---------- properties and metrics ----------

    /// Replace the whole cluster property bag.
    pub async fn sim_set_cluster_properties(
        &self,
        properties: BTreeMap<String, Value>,
    ) -> SimResult<()> {
        let mut state = self.core.lock().await;
        state.cluster_props = properties;
        self.save_cluster_properties_locked(&state)
    }

    /// Set or remove (when `value` is None) one cluster property.
    pub async fn sim_set_cluster_property(
        &self,
        key: &str,
        value: Option<Value>,
    ) -> SimResult<()> {
        let mut state = self.core.lock().await;
        match value {
            Some(value) => {
                state.cluster_props.insert(key.to_string(), value);
            }
            None => {
                state.cluster_props.remove(key);
            }
        }
        self.save_cluster_properties_locked(&state)
    }

    /// Replace (or remove, when None) a collection's property bag.
    pub async fn sim_set_collection_properties(
        &self,
        collection: &str,
        properties: Option<BTreeMap<String, Value>>,
    ) -> SimResult<()> {
        let mut state = self.core.lock().await;
        match properties {
            Some(properties) => {
                state
                    .collection_props
                    .insert(collection.to_string(), properties);
            }
            None => {
                state.collection_props.remove(collection);
            }
        }
        self.save_cluster_state_locked(&state)?;
        Ok(())
    }

    /// Set or remove one collection property.
    pub async fn sim_set_collection_property(
        &self,
        collection: &str,
        key: &str,
        value: Option<Value>,
    ) -> SimResult<()> {
        let mut state = self.core.lock().await;
        let props = state
            .collection_props
            .entry(collection.to_string())
            .or_default();
        match value {
            Some(value) => {
                props.insert(key.to_string(), value);
            }
            None => {
                props.remove(key);
            }
        }
        self.save_cluster_state_locked(&state)?;
        Ok(())
    }

    /// Replace a shard's property bag (cleared when `properties` is None).
    pub async fn sim_set_shard_properties(
        &self,
        collection: &str,
        shard: &str,
        properties: Option<BTreeMap<String, Value>>,
    ) -> SimResult<()> {
        let mut state = self.core.lock().await;
        let props = state
            .shard_props
            .entry(collection.to_string())
            .or_default()
            .entry(shard.to_string())
            .or_default();
        props.clear();
        if let Some(properties) = properties {
            props.extend(properties);
        }
        self.save_cluster_state_locked(&state)?;
        Ok(())
    }

    /// Broadcast a metric value to every replica of a collection.
    pub async fn sim_set_collection_value(
        &self,
        collection: &str,
        key: &str,
        value: Option<Value>,
        divide_evenly: bool,
    ) -> SimResult<()> {
        self.sim_set_shard_value(collection, None, key, value, divide_evenly)
            .await
    }

    /// Broadcast a metric value to every replica of a collection, or of one
    /// shard when given. Numeric values are divided evenly across the
    /// matched replicas when requested; a None value removes the key.
    pub async fn sim_set_shard_value(
        &self,
        collection: &str,
        shard: Option<&str>,
        key: &str,
        value: Option<Value>,
        divide_evenly: bool,
    ) -> SimResult<()> {
        let mut state = self.core.lock().await;
        let ids = state.registry.collection_replica_ids(collection, shard);
        if ids.is_empty() {
            return Err(SimError::CollectionNotFound(collection.to_string()));
        }

        let value = match value {
            Some(v) if divide_evenly && v.is_number() => {
                let divided = v.as_f64().unwrap_or(0.0) / ids.len() as f64;
                Some(json!(divided))
            }
            other => other,
        };

        for id in ids {
            let replica = state.registry.get_mut(id).expect("indexed replica exists");
            match &value {
                Some(v) => {
                    replica.properties.insert(key.to_string(), v.clone());
                }
                None => {
                    replica.properties.remove(key);
                }
            }
        }
        self.invalidate_cached_state();
        Ok(())
    }

    /// Override per-collection operation delays.
    pub async fn sim_set_op_delays(&self, collection: &str, overrides: HashMap<OpKind, u64>) {
        let mut state = self.core.lock().await;
        state.delays.set_delays(collection, overrides);
    }

    // ---------- whole-cluster reset ----------

    /// Initialize the simulator from an existing snapshot. Replicas placed
    /// on nodes absent from the snapshot's live set are dropped.
    pub async fn sim_set_cluster_state(&self, initial: &ClusterSnapshot) -> SimResult<()> {
        let mut state = self.core.lock().await;
        state.registry.clear();
        state.collection_props.clear();
        state.shard_props.clear();
        state.replica_seq.clear();
        state.hosted.clear();

        let cfg = self.autoscaling.read().clone();
        for node in self.live_nodes.get() {
            self.store.remove_ephemerals_of(&node);
        }
        self.live_nodes.clear();
        for node in &initial.live_nodes {
            self.live_nodes.register(&self.store, &cfg, node);
            state.hosted.insert(node.clone(), 0);
        }

        for (coll_name, coll) in &initial.collections {
            state
                .collection_props
                .insert(coll_name.clone(), coll.properties.clone());
            state.delays.seed_collection(coll_name);
            for (shard_name, shard) in &coll.shards {
                state
                    .shard_props
                    .entry(coll_name.clone())
                    .or_default()
                    .insert(shard_name.clone(), shard.properties.clone());
                for (replica_name, replica) in &shard.replicas {
                    if !initial.live_nodes.contains(&replica.node) {
                        continue;
                    }
                    let mut record = ReplicaRecord::new(
                        replica.core.clone(),
                        replica_name.clone(),
                        coll_name.clone(),
                        shard_name.clone(),
                        replica.replica_type,
                        replica.node.clone(),
                    );
                    record.properties = replica.properties.clone();
                    record.set_state(replica.state);
                    if replica.leader {
                        record.set_leader(true);
                    }
                    state.registry.insert(record)?;
                    *state.hosted.entry(replica.node.clone()).or_insert(0) += 1;
                }
            }
        }
        self.save_cluster_state_locked(&state)?;
        info!(
            "cluster state initialized: {} live nodes, {} collections",
            initial.live_nodes.len(),
            initial.collections.len()
        );
        Ok(())
    }
}
