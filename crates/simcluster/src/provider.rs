//! Simulated cluster-state provider
//!
//! Owns the authoritative mutable cluster state behind a single mutation
//! lock, the derived-snapshot cache, and the read surface exposed to
//! cluster-management logic under test. Lifecycle operations live in
//! [`crate::ops`], leader election in [`crate::election`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex as SyncMutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex, Notify};
use tracing::info;

use crate::autoscaling::AutoScalingConfig;
use crate::clock::SimClock;
use crate::delay::{OpKind, OperationDelays};
use crate::election::ElectionRequest;
use crate::error::SimResult;
use crate::livenodes::LiveNodeSet;
use crate::metadata::{
    ClusterSnapshot, CollectionView, NodeId, ReplicaRecord, ReplicaView, ShardView,
    CLUSTER_STATE_FORMAT, POLICY_PROP,
};
use crate::placement::{LeastLoadedPlacement, PlacementPolicy};
use crate::registry::ReplicaRegistry;
use crate::router::{HashRouter, ShardRouter};
use crate::statestore::{paths, StateStore};
use crate::throttle::ActionThrottle;
use crate::SimClusterConfig;

/// Read surface of the simulated cluster (the standard provider contract).
#[async_trait]
pub trait ClusterStateProvider: Send + Sync {
    /// Current cluster snapshot.
    async fn cluster_state(&self) -> Arc<ClusterSnapshot>;

    /// Currently live node ids.
    async fn live_nodes(&self) -> BTreeSet<NodeId>;

    /// State of one collection, if it exists.
    async fn collection_state(&self, collection: &str) -> Option<CollectionView>;

    /// The global cluster property bag.
    async fn cluster_properties(&self) -> BTreeMap<String, Value>;

    /// The placement policy name configured for a collection.
    async fn policy_name_for_collection(&self, collection: &str) -> Option<String>;

    /// Alias resolution. Not supported by the simulation.
    fn resolve_alias(&self, alias: &str) -> SimResult<Vec<String>>;
}

/// Mutable cluster state. Guarded by the shared mutation lock so every
/// structural or property mutation appears atomic to readers.
pub(crate) struct CoreState {
    pub(crate) registry: ReplicaRegistry,
    pub(crate) cluster_props: BTreeMap<String, Value>,
    pub(crate) collection_props: BTreeMap<String, BTreeMap<String, Value>>,
    /// collection -> shard -> property bag
    pub(crate) shard_props: BTreeMap<String, BTreeMap<String, BTreeMap<String, Value>>>,
    pub(crate) delays: OperationDelays,
    /// Advisory hosted-replica counters, per live node. Never negative.
    pub(crate) hosted: HashMap<NodeId, u64>,
    /// Per-collection sequence feeding generated core/replica names.
    pub(crate) replica_seq: HashMap<String, u64>,
}

impl CoreState {
    fn new() -> Self {
        Self {
            registry: ReplicaRegistry::new(),
            cluster_props: BTreeMap::new(),
            collection_props: BTreeMap::new(),
            shard_props: BTreeMap::new(),
            delays: OperationDelays::default(),
            hosted: HashMap::new(),
            replica_seq: HashMap::new(),
        }
    }

    pub(crate) fn next_replica_seq(&mut self, collection: &str) -> u64 {
        let seq = self.replica_seq.entry(collection.to_string()).or_insert(0);
        *seq += 1;
        *seq
    }
}

/// Build the immutable snapshot from current registry + property content.
/// Shards that only have properties and collections that only have
/// properties stay visible.
pub(crate) fn build_snapshot(state: &CoreState, live_nodes: BTreeSet<NodeId>) -> ClusterSnapshot {
    let mut collections: BTreeMap<String, CollectionView> = BTreeMap::new();

    for record in state.registry.iter() {
        let coll = collections
            .entry(record.collection.clone())
            .or_insert_with(|| CollectionView {
                name: record.collection.clone(),
                ..Default::default()
            });
        let shard = coll
            .shards
            .entry(record.shard.clone())
            .or_insert_with(|| ShardView {
                name: record.shard.clone(),
                ..Default::default()
            });
        shard
            .replicas
            .insert(record.name.clone(), ReplicaView::from_record(record));
    }

    for (coll_name, shards) in &state.shard_props {
        let coll = collections
            .entry(coll_name.clone())
            .or_insert_with(|| CollectionView {
                name: coll_name.clone(),
                ..Default::default()
            });
        for (shard_name, props) in shards {
            let shard = coll
                .shards
                .entry(shard_name.clone())
                .or_insert_with(|| ShardView {
                    name: shard_name.clone(),
                    ..Default::default()
                });
            shard.properties = props.clone();
        }
    }

    for (coll_name, props) in &state.collection_props {
        let coll = collections
            .entry(coll_name.clone())
            .or_insert_with(|| CollectionView {
                name: coll_name.clone(),
                ..Default::default()
            });
        coll.properties = props.clone();
    }

    ClusterSnapshot {
        format: CLUSTER_STATE_FORMAT,
        live_nodes,
        collections,
    }
}

/// Simulated cluster-state provider.
pub struct SimClusterStateProvider {
    pub(crate) config: SimClusterConfig,
    pub(crate) clock: Arc<SimClock>,
    pub(crate) store: Arc<StateStore>,
    pub(crate) placement: Arc<dyn PlacementPolicy>,
    pub(crate) router: Arc<dyn ShardRouter>,
    pub(crate) autoscaling: RwLock<AutoScalingConfig>,
    pub(crate) live_nodes: LiveNodeSet,
    pub(crate) core: Mutex<CoreState>,

    cached: RwLock<Option<Arc<ClusterSnapshot>>>,
    saved_state: SyncMutex<Option<Arc<ClusterSnapshot>>>,
    saved_props: SyncMutex<Option<BTreeMap<String, Value>>>,

    election_tx: mpsc::UnboundedSender<ElectionRequest>,
    election_pending: AtomicUsize,
    election_idle: Notify,
    pub(crate) leader_throttle: Arc<ActionThrottle>,

    rng: SyncMutex<StdRng>,
}

impl SimClusterStateProvider {
    /// Create a provider with the default placement policy and router.
    pub fn new(config: SimClusterConfig) -> Arc<Self> {
        Self::with_collaborators(
            config,
            Arc::new(LeastLoadedPlacement),
            Arc::new(HashRouter),
        )
    }

    /// Create a provider with explicit placement and routing collaborators.
    pub fn with_collaborators(
        config: SimClusterConfig,
        placement: Arc<dyn PlacementPolicy>,
        router: Arc<dyn ShardRouter>,
    ) -> Arc<Self> {
        let clock = Arc::new(SimClock::new());
        let leader_throttle = Arc::new(ActionThrottle::new(
            "leader",
            config.leader_throttle_ms,
            clock.clone(),
        ));
        let (election_tx, election_rx) = mpsc::unbounded_channel();
        let seed = config.seed;

        let provider = Arc::new(Self {
            config,
            clock,
            store: Arc::new(StateStore::new()),
            placement,
            router,
            autoscaling: RwLock::new(AutoScalingConfig::default()),
            live_nodes: LiveNodeSet::new(),
            core: Mutex::new(CoreState::new()),
            cached: RwLock::new(None),
            saved_state: SyncMutex::new(None),
            saved_props: SyncMutex::new(None),
            election_tx,
            election_pending: AtomicUsize::new(0),
            election_idle: Notify::new(),
            leader_throttle,
            rng: SyncMutex::new(StdRng::seed_from_u64(seed)),
        });

        crate::election::spawn_election_worker(provider.clone(), election_rx);
        info!("simulated cluster '{}' initialized", provider.config.cluster_name);
        provider
    }

    /// The virtual clock driving all simulated delays.
    pub fn clock(&self) -> Arc<SimClock> {
        self.clock.clone()
    }

    /// The backing state store.
    pub fn store(&self) -> Arc<StateStore> {
        self.store.clone()
    }

    /// Replace the active autoscaling configuration.
    pub fn sim_set_autoscaling_config(&self, cfg: AutoScalingConfig) {
        *self.autoscaling.write() = cfg;
    }

    /// Reset the leader-election throttle.
    pub fn sim_reset_leader_throttle(&self) {
        self.leader_throttle.reset();
    }

    // ---------- snapshot cache ----------

    pub(crate) fn invalidate_cached_state(&self) {
        *self.cached.write() = None;
    }

    fn publish(&self, snapshot: ClusterSnapshot) -> Arc<ClusterSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.cached.write() = Some(snapshot.clone());
        snapshot
    }

    /// Current snapshot. Rebuilds lazily under the mutation lock when the
    /// cache was invalidated.
    pub async fn cluster_state(&self) -> Arc<ClusterSnapshot> {
        if let Some(snapshot) = self.cached.read().clone() {
            return snapshot;
        }
        let state = self.core.lock().await;
        self.snapshot_locked(&state)
    }

    /// Snapshot while already holding the mutation lock.
    pub(crate) fn snapshot_locked(&self, state: &CoreState) -> Arc<ClusterSnapshot> {
        if let Some(snapshot) = self.cached.read().clone() {
            return snapshot;
        }
        self.publish(build_snapshot(state, self.live_nodes.get()))
    }

    /// Rebuild and persist the snapshot document. The write is skipped when
    /// the snapshot is value-equal to the last persisted one; otherwise it is
    /// a compare-and-swap on the stored version.
    pub(crate) fn save_cluster_state_locked(
        &self,
        state: &CoreState,
    ) -> SimResult<Arc<ClusterSnapshot>> {
        self.invalidate_cached_state();
        let snapshot = self.publish(build_snapshot(state, self.live_nodes.get()));

        let mut saved = self.saved_state.lock();
        if saved.as_deref() == Some(snapshot.as_ref()) {
            return Ok(snapshot);
        }
        let data = serde_json::to_value(snapshot.as_ref())
            .map_err(|e| crate::statestore::StoreError::Serialization(e.to_string()))?;
        let version = self
            .store
            .get_data(paths::CLUSTER_STATE)
            .map(|d| d.version)
            .unwrap_or(-1);
        self.store.set_data(paths::CLUSTER_STATE, data, version)?;
        *saved = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Persist the cluster-properties document (same skip + CAS discipline).
    pub(crate) fn save_cluster_properties_locked(&self, state: &CoreState) -> SimResult<()> {
        let mut saved = self.saved_props.lock();
        if saved.as_ref() == Some(&state.cluster_props) {
            return Ok(());
        }
        let data = serde_json::to_value(&state.cluster_props)
            .map_err(|e| crate::statestore::StoreError::Serialization(e.to_string()))?;
        let version = self
            .store
            .get_data(paths::CLUSTER_PROPS)
            .map(|d| d.version)
            .unwrap_or(-1);
        self.store.set_data(paths::CLUSTER_PROPS, data, version)?;
        *saved = Some(state.cluster_props.clone());
        Ok(())
    }

    /// Apply the configured virtual-time delay for `op` on `collection`.
    pub(crate) async fn op_delay(&self, state: &CoreState, collection: &str, op: OpKind) {
        if let Some(ms) = state.delays.delay_for(collection, op) {
            self.clock.sleep(ms).await;
        }
    }

    // ---------- election scheduling ----------

    /// Fire-and-forget submission of affected collections to the elector.
    pub(crate) fn submit_election<I: IntoIterator<Item = String>>(
        &self,
        collections: I,
        save_state: bool,
    ) {
        let collections: BTreeSet<String> = collections.into_iter().collect();
        if collections.is_empty() {
            return;
        }
        self.election_pending.fetch_add(1, Ordering::SeqCst);
        let request = ElectionRequest {
            collections,
            save_state,
        };
        if self.election_tx.send(request).is_err() {
            self.election_pending.fetch_sub(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn election_done(&self) {
        if self.election_pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.election_idle.notify_waiters();
        }
    }

    /// Wait until every submitted election request has been processed.
    pub async fn quiesce(&self) {
        loop {
            let notified = self.election_idle.notified();
            tokio::pin!(notified);
            // register interest before checking, so a wakeup between the
            // check and the await is not lost
            notified.as_mut().enable();
            if self.election_pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    // ---------- reads ----------

    /// Replicas currently hosted on a node.
    pub async fn sim_get_replica_infos(&self, node: &str) -> Vec<ReplicaRecord> {
        let state = self.core.lock().await;
        state.registry.on_node(node).into_iter().cloned().collect()
    }

    /// Advisory hosted-replica counter of a node (zero when unknown).
    pub async fn sim_hosted_replica_count(&self, node: &str) -> u64 {
        let state = self.core.lock().await;
        state.hosted.get(node).copied().unwrap_or(0)
    }

    /// Existing collection names, including collections that only have
    /// properties and no replicas yet.
    pub async fn sim_list_collections(&self) -> Vec<String> {
        let state = self.core.lock().await;
        let mut names = state.registry.collections();
        names.extend(state.collection_props.keys().cloned());
        names.into_iter().collect()
    }

    /// One of the live nodes, picked with the seeded simulation RNG.
    pub fn sim_get_random_node(&self) -> Option<NodeId> {
        let mut rng = self.rng.lock();
        self.live_nodes.pick_random(&mut *rng)
    }
}

#[async_trait]
impl ClusterStateProvider for SimClusterStateProvider {
    async fn cluster_state(&self) -> Arc<ClusterSnapshot> {
        SimClusterStateProvider::cluster_state(self).await
    }

    async fn live_nodes(&self) -> BTreeSet<NodeId> {
        self.live_nodes.get()
    }

    async fn collection_state(&self, collection: &str) -> Option<CollectionView> {
        SimClusterStateProvider::cluster_state(self)
            .await
            .collection(collection)
            .cloned()
    }

    async fn cluster_properties(&self) -> BTreeMap<String, Value> {
        let state = self.core.lock().await;
        state.cluster_props.clone()
    }

    async fn policy_name_for_collection(&self, collection: &str) -> Option<String> {
        let state = self.core.lock().await;
        state
            .collection_props
            .get(collection)
            .and_then(|props| props.get(POLICY_PROP))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    fn resolve_alias(&self, _alias: &str) -> SimResult<Vec<String>> {
        Err(crate::error::SimError::Unsupported("resolveAlias"))
    }
}
