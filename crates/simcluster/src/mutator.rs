//! Collection-state mutators
//!
//! Build the property-level descriptors for new collections and shards.
//! Creation is a no-op (None) when the target already exists; the caller
//! reports success without change.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::metadata::{
    ClusterSnapshot, ShardState, POLICY_PROP, PULL_REPLICAS_PROP, RANGE_PROP,
    REPLICATION_FACTOR_PROP, SHARD_STATE_PROP, TLOG_REPLICAS_PROP,
};
use crate::ops::CreateCollectionRequest;
use crate::router::ShardRouter;

/// Property bag of one shard to be created.
#[derive(Debug, Clone)]
pub struct ShardDescriptor {
    pub name: String,
    pub properties: BTreeMap<String, Value>,
}

/// Property bags of a collection and its initial shards.
#[derive(Debug, Clone)]
pub struct CollectionDescriptor {
    pub name: String,
    pub properties: BTreeMap<String, Value>,
    pub shards: Vec<ShardDescriptor>,
}

pub struct ClusterStateMutator;

impl ClusterStateMutator {
    /// Descriptor for a new collection: `num_shards` active shards named
    /// `shard1..shardN`, each owning an equal partition of the full hash
    /// range. Returns None when the collection already exists.
    pub fn create_collection(
        snapshot: &ClusterSnapshot,
        request: &CreateCollectionRequest,
        router: &dyn ShardRouter,
    ) -> Option<CollectionDescriptor> {
        if snapshot.collection(&request.name).is_some() {
            return None;
        }

        let mut properties = request.properties.clone();
        properties.insert(
            REPLICATION_FACTOR_PROP.to_string(),
            json!(request.replication_factor),
        );
        properties.insert(TLOG_REPLICAS_PROP.to_string(), json!(request.tlog_replicas));
        properties.insert(PULL_REPLICAS_PROP.to_string(), json!(request.pull_replicas));
        if let Some(policy) = &request.policy {
            properties.insert(POLICY_PROP.to_string(), json!(policy));
        }

        let ranges = router.split(&router.full_range(), request.num_shards);
        let shards = ranges
            .into_iter()
            .enumerate()
            .map(|(i, range)| {
                let mut props = BTreeMap::new();
                props.insert(
                    SHARD_STATE_PROP.to_string(),
                    json!(ShardState::Active.to_string()),
                );
                props.insert(RANGE_PROP.to_string(), json!(range.to_string()));
                ShardDescriptor {
                    name: format!("shard{}", i + 1),
                    properties: props,
                }
            })
            .collect();

        Some(CollectionDescriptor {
            name: request.name.clone(),
            properties,
            shards,
        })
    }

    /// Descriptor for one new, empty shard. Created shards start active and
    /// own no hash range until data migration assigns one. Returns None when
    /// the shard already exists.
    pub fn create_shard(
        snapshot: &ClusterSnapshot,
        collection: &str,
        shard: &str,
    ) -> Option<ShardDescriptor> {
        if snapshot
            .collection(collection)
            .map(|c| c.shard(shard).is_some())
            .unwrap_or(false)
        {
            return None;
        }
        let mut props = BTreeMap::new();
        props.insert(
            SHARD_STATE_PROP.to_string(),
            json!(ShardState::Active.to_string()),
        );
        Some(ShardDescriptor {
            name: shard.to_string(),
            properties: props,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::HashRouter;

    fn request(name: &str, shards: usize, rf: usize) -> CreateCollectionRequest {
        CreateCollectionRequest {
            name: name.to_string(),
            num_shards: shards,
            replication_factor: rf,
            tlog_replicas: 0,
            pull_replicas: 0,
            policy: None,
            properties: BTreeMap::new(),
        }
    }

    #[test]
    fn test_collection_descriptor_partitions_full_range() {
        let snapshot = ClusterSnapshot::default();
        let desc =
            ClusterStateMutator::create_collection(&snapshot, &request("orders", 2, 3), &HashRouter)
                .unwrap();

        assert_eq!(desc.shards.len(), 2);
        assert_eq!(desc.shards[0].name, "shard1");
        assert_eq!(desc.shards[1].name, "shard2");
        let first = desc.shards[0].properties.get(RANGE_PROP).unwrap();
        assert_eq!(first.as_str().unwrap(), "80000000-ffffffff");
        assert_eq!(
            desc.properties.get(REPLICATION_FACTOR_PROP).unwrap(),
            &json!(3)
        );
    }

    #[test]
    fn test_existing_collection_is_a_noop() {
        let mut snapshot = ClusterSnapshot::default();
        snapshot
            .collections
            .insert("orders".to_string(), Default::default());
        assert!(ClusterStateMutator::create_collection(
            &snapshot,
            &request("orders", 2, 3),
            &HashRouter
        )
        .is_none());
    }
}
