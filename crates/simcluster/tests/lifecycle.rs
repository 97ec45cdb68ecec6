//! Per-operation integration tests for the simulated cluster.

mod common;

use std::collections::BTreeMap;
use std::collections::HashMap;

use serde_json::json;

use common::cluster_with_nodes;
use simcluster::delay::OpKind;
use simcluster::metadata::{ReplicaRecord, ReplicaType};
use simcluster::statestore::paths;
use simcluster::{
    AddReplicaRequest, ClusterStateProvider, CreateCollectionRequest, MoveReplicaRequest, SimError,
};

#[tokio::test]
async fn test_create_collection_places_replicas() {
    let cluster = cluster_with_nodes(3).await;
    cluster
        .sim_create_collection(CreateCollectionRequest::new("orders", 2, 3))
        .await
        .unwrap();
    cluster.quiesce().await;

    let snapshot = cluster.cluster_state().await;
    let coll = snapshot.collection("orders").unwrap();
    assert_eq!(coll.shards.len(), 2);
    let total: usize = coll.shards.values().map(|s| s.replicas.len()).sum();
    assert_eq!(total, 6);

    // round-robin placement puts one replica of each shard on each node
    for node in ["node1", "node2", "node3"] {
        assert_eq!(snapshot.replicas_on(node), 2);
        assert_eq!(cluster.sim_hosted_replica_count(node).await, 2);
    }

    // CREATE (500) plus six ADDREPLICA delays (500 each), all virtual
    assert_eq!(cluster.clock().now_ms(), 3500);
}

#[tokio::test]
async fn test_create_existing_collection_is_a_noop() {
    let cluster = cluster_with_nodes(3).await;
    cluster
        .sim_create_collection(CreateCollectionRequest::new("orders", 2, 3))
        .await
        .unwrap();
    cluster
        .sim_create_collection(CreateCollectionRequest::new("orders", 4, 1))
        .await
        .unwrap();
    cluster.quiesce().await;

    let snapshot = cluster.cluster_state().await;
    let coll = snapshot.collection("orders").unwrap();
    assert_eq!(coll.shards.len(), 2);
    assert_eq!(coll.replication_factor(), 3);
}

#[tokio::test]
async fn test_duplicate_core_fails_before_any_mutation() {
    let cluster = cluster_with_nodes(2).await;
    cluster
        .sim_create_collection(CreateCollectionRequest::new("orders", 1, 1))
        .await
        .unwrap();
    cluster.quiesce().await;

    let snapshot = cluster.cluster_state().await;
    let existing = snapshot
        .collection("orders")
        .unwrap()
        .shards
        .values()
        .next()
        .unwrap()
        .replicas
        .values()
        .next()
        .unwrap()
        .core
        .clone();

    let record = ReplicaRecord::new(
        existing,
        "core_node99",
        "orders",
        "shard1",
        ReplicaType::Nrt,
        "node2",
    );
    let err = cluster
        .sim_add_replica("node2", record, true)
        .await
        .unwrap_err();
    assert!(matches!(err, SimError::DuplicateCore { .. }));

    cluster.quiesce().await;
    assert!(cluster.sim_get_replica_infos("node2").await.is_empty());
    assert_eq!(cluster.sim_hosted_replica_count("node2").await, 0);
}

#[tokio::test]
async fn test_add_replica_validations() {
    let cluster = cluster_with_nodes(1).await;

    let wrong_node = ReplicaRecord::new(
        "core1",
        "core_node1",
        "orders",
        "shard1",
        ReplicaType::Nrt,
        "node2",
    );
    let err = cluster
        .sim_add_replica("node1", wrong_node, false)
        .await
        .unwrap_err();
    assert!(matches!(err, SimError::MissingField(_)));

    let missing_core =
        ReplicaRecord::new("", "core_node1", "orders", "shard1", ReplicaType::Nrt, "node1");
    let err = cluster
        .sim_add_replica("node1", missing_core, false)
        .await
        .unwrap_err();
    assert!(matches!(err, SimError::MissingField(_)));

    let dead_node = ReplicaRecord::new(
        "core1",
        "core_node1",
        "orders",
        "shard1",
        ReplicaType::Nrt,
        "node9",
    );
    let err = cluster
        .sim_add_replica("node9", dead_node, false)
        .await
        .unwrap_err();
    assert!(matches!(err, SimError::NodeNotLive(_)));
}

#[tokio::test]
async fn test_add_replica_assigned_picks_a_node() {
    let cluster = cluster_with_nodes(2).await;
    cluster
        .sim_create_collection(CreateCollectionRequest::new("orders", 1, 1))
        .await
        .unwrap();
    cluster.quiesce().await;

    cluster
        .sim_add_replica_assigned(AddReplicaRequest {
            collection: "orders".to_string(),
            shard: "shard1".to_string(),
            replica_type: ReplicaType::Tlog,
            node: None,
        })
        .await
        .unwrap();
    cluster.quiesce().await;

    let snapshot = cluster.cluster_state().await;
    let shard = snapshot.collection("orders").unwrap().shard("shard1").unwrap();
    assert_eq!(shard.replicas.len(), 2);
    assert!(shard
        .replicas
        .values()
        .any(|r| r.replica_type == ReplicaType::Tlog));

    let err = cluster
        .sim_add_replica_assigned(AddReplicaRequest {
            collection: "nope".to_string(),
            shard: "shard1".to_string(),
            replica_type: ReplicaType::Nrt,
            node: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SimError::CollectionNotFound(_)));
}

#[tokio::test]
async fn test_remove_replica() {
    let cluster = cluster_with_nodes(2).await;
    cluster
        .sim_create_collection(CreateCollectionRequest::new("orders", 1, 2))
        .await
        .unwrap();
    cluster.quiesce().await;

    let victim = cluster.sim_get_replica_infos("node1").await[0].clone();
    cluster
        .sim_remove_replica("node1", &victim.name)
        .await
        .unwrap();
    cluster.quiesce().await;

    assert!(cluster.sim_get_replica_infos("node1").await.is_empty());
    assert_eq!(cluster.sim_hosted_replica_count("node1").await, 0);

    // the remaining replica leads the shard
    let snapshot = cluster.cluster_state().await;
    let shard = snapshot.collection("orders").unwrap().shard("shard1").unwrap();
    assert_eq!(shard.replicas.len(), 1);
    assert!(shard.leader().is_some());

    let err = cluster
        .sim_remove_replica("node1", &victim.name)
        .await
        .unwrap_err();
    assert!(matches!(err, SimError::ReplicaNotFound { .. }));
}

#[tokio::test]
async fn test_move_replica() {
    let cluster = cluster_with_nodes(3).await;
    cluster
        .sim_create_collection(CreateCollectionRequest::new("orders", 1, 2))
        .await
        .unwrap();
    cluster.quiesce().await;

    // replicas land on node1 and node2; move node1's to node3
    let moved = cluster.sim_get_replica_infos("node1").await[0].clone();
    cluster
        .sim_move_replica(MoveReplicaRequest {
            collection: "orders".to_string(),
            replica: moved.name.clone(),
            target_node: "node3".to_string(),
        })
        .await
        .unwrap();
    cluster.quiesce().await;

    let snapshot = cluster.cluster_state().await;
    let shard = snapshot.collection("orders").unwrap().shard("shard1").unwrap();
    assert_eq!(shard.replicas.len(), 2);
    assert!(!shard.replicas.contains_key(&moved.name));
    assert_eq!(snapshot.replicas_on("node1"), 0);
    assert_eq!(snapshot.replicas_on("node3"), 1);
    assert!(shard.leader().is_some());

    let err = cluster
        .sim_move_replica(MoveReplicaRequest {
            collection: "orders".to_string(),
            replica: "core_node99".to_string(),
            target_node: "node2".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SimError::ReplicaNotFound { .. }));
}

#[tokio::test]
async fn test_create_shard_uses_collection_replica_counts() {
    let cluster = cluster_with_nodes(3).await;
    cluster
        .sim_create_collection(CreateCollectionRequest::new("orders", 1, 2))
        .await
        .unwrap();
    cluster.quiesce().await;

    cluster.sim_create_shard("orders", "shard_extra").await.unwrap();
    cluster.quiesce().await;

    let snapshot = cluster.cluster_state().await;
    let shard = snapshot
        .collection("orders")
        .unwrap()
        .shard("shard_extra")
        .unwrap();
    assert_eq!(shard.replicas.len(), 2);
    // created shards own no hash range until migration assigns one
    assert!(shard.range().is_none());
    assert!(shard.leader().is_some());

    // existing shard is a no-op
    cluster.sim_create_shard("orders", "shard_extra").await.unwrap();
    cluster.quiesce().await;
    let snapshot = cluster.cluster_state().await;
    assert_eq!(
        snapshot
            .collection("orders")
            .unwrap()
            .shard("shard_extra")
            .unwrap()
            .replicas
            .len(),
        2
    );

    let err = cluster.sim_create_shard("nope", "shard1").await.unwrap_err();
    assert!(matches!(err, SimError::CollectionNotFound(_)));
}

#[tokio::test]
async fn test_delete_shard() {
    let cluster = cluster_with_nodes(2).await;
    cluster
        .sim_create_collection(CreateCollectionRequest::new("orders", 2, 1))
        .await
        .unwrap();
    cluster.quiesce().await;

    cluster.sim_delete_shard("orders", "shard2").await.unwrap();

    let snapshot = cluster.cluster_state().await;
    let coll = snapshot.collection("orders").unwrap();
    assert!(coll.shard("shard2").is_none());
    assert!(coll.shard("shard1").is_some());

    let err = cluster.sim_delete_shard("orders", "shard2").await.unwrap_err();
    assert!(matches!(err, SimError::ShardNotFound { .. }));
}

#[tokio::test]
async fn test_delete_collection_clears_everything() {
    let cluster = cluster_with_nodes(3).await;
    cluster
        .sim_create_collection(CreateCollectionRequest::new("orders", 2, 3))
        .await
        .unwrap();
    cluster.quiesce().await;

    cluster.sim_delete_collection("orders").await.unwrap();

    let snapshot = cluster.cluster_state().await;
    assert!(snapshot.collection("orders").is_none());
    assert!(cluster.sim_list_collections().await.is_empty());
    for node in ["node1", "node2", "node3"] {
        assert_eq!(cluster.sim_hosted_replica_count(node).await, 0);
        assert!(cluster.sim_get_replica_infos(node).await.is_empty());
    }
}

#[tokio::test]
async fn test_delete_all_collections() {
    let cluster = cluster_with_nodes(2).await;
    for name in ["orders", "logs"] {
        cluster
            .sim_create_collection(CreateCollectionRequest::new(name, 1, 2))
            .await
            .unwrap();
    }
    cluster.quiesce().await;

    cluster.sim_delete_all_collections().await.unwrap();
    let snapshot = cluster.cluster_state().await;
    assert!(snapshot.collections.is_empty());
    assert_eq!(cluster.sim_hosted_replica_count("node1").await, 0);
}

#[tokio::test]
async fn test_cluster_properties_are_persisted() {
    let cluster = cluster_with_nodes(1).await;
    cluster
        .sim_set_cluster_property("maxCoresPerNode", Some(json!(8)))
        .await
        .unwrap();

    let props = ClusterStateProvider::cluster_properties(cluster.as_ref()).await;
    assert_eq!(props.get("maxCoresPerNode"), Some(&json!(8)));

    let doc = cluster.store().get_data(paths::CLUSTER_PROPS).unwrap();
    assert_eq!(doc.data.get("maxCoresPerNode"), Some(&json!(8)));

    cluster
        .sim_set_cluster_property("maxCoresPerNode", None)
        .await
        .unwrap();
    let props = ClusterStateProvider::cluster_properties(cluster.as_ref()).await;
    assert!(props.is_empty());
}

#[tokio::test]
async fn test_collection_metric_divided_evenly() {
    let cluster = cluster_with_nodes(3).await;
    cluster
        .sim_create_collection(CreateCollectionRequest::new("orders", 2, 3))
        .await
        .unwrap();
    cluster.quiesce().await;

    cluster
        .sim_set_collection_value("orders", "docCount", Some(json!(600)), true)
        .await
        .unwrap();

    let snapshot = cluster.cluster_state().await;
    for shard in snapshot.collection("orders").unwrap().shards.values() {
        for replica in shard.replicas.values() {
            assert_eq!(replica.properties.get("docCount"), Some(&json!(100.0)));
        }
    }

    // None removes the key; a single shard can be targeted
    cluster
        .sim_set_shard_value("orders", Some("shard1"), "docCount", None, false)
        .await
        .unwrap();
    let snapshot = cluster.cluster_state().await;
    let coll = snapshot.collection("orders").unwrap();
    for replica in coll.shard("shard1").unwrap().replicas.values() {
        assert!(replica.properties.get("docCount").is_none());
    }
    for replica in coll.shard("shard2").unwrap().replicas.values() {
        assert!(replica.properties.get("docCount").is_some());
    }

    let err = cluster
        .sim_set_collection_value("nope", "docCount", Some(json!(1)), false)
        .await
        .unwrap_err();
    assert!(matches!(err, SimError::CollectionNotFound(_)));
}

#[tokio::test]
async fn test_op_delay_overrides() {
    let cluster = cluster_with_nodes(1).await;
    cluster
        .sim_create_collection(CreateCollectionRequest::new("orders", 1, 1))
        .await
        .unwrap();
    cluster.quiesce().await;
    let before = cluster.clock().now_ms();

    cluster
        .sim_set_op_delays("orders", HashMap::from([(OpKind::Delete, 0)]))
        .await;
    cluster.sim_delete_collection("orders").await.unwrap();
    assert_eq!(cluster.clock().now_ms(), before);
}

#[tokio::test]
async fn test_policy_name_and_alias_resolution() {
    let cluster = cluster_with_nodes(2).await;
    cluster
        .sim_create_collection(
            CreateCollectionRequest::new("orders", 1, 1).with_policy("spread"),
        )
        .await
        .unwrap();
    cluster.quiesce().await;

    assert_eq!(
        cluster.policy_name_for_collection("orders").await,
        Some("spread".to_string())
    );
    assert_eq!(cluster.policy_name_for_collection("nope").await, None);

    let err = cluster.resolve_alias("orders-alias").unwrap_err();
    assert!(matches!(err, SimError::Unsupported(_)));
}

#[tokio::test]
async fn test_node_lifecycle_basics() {
    let cluster = cluster_with_nodes(1).await;
    let err = cluster.sim_add_node("node1").await.unwrap_err();
    assert!(matches!(err, SimError::NodeAlreadyExists(_)));

    // unknown node was never live
    assert!(!cluster.sim_remove_node("node9").await);

    // restoring a node with no replicas reports nothing restored
    assert!(!cluster.sim_restore_node("node9").await);
    assert!(ClusterStateProvider::live_nodes(cluster.as_ref())
        .await
        .contains("node9"));
}

#[tokio::test]
async fn test_random_node_is_seed_stable() {
    let a = cluster_with_nodes(5).await;
    let b = cluster_with_nodes(5).await;
    assert_eq!(a.sim_get_random_node(), b.sim_get_random_node());
    assert!(a.sim_get_random_node().is_some());
}

#[tokio::test]
async fn test_set_cluster_state_resets_the_simulator() {
    let cluster = cluster_with_nodes(3).await;
    cluster
        .sim_create_collection(CreateCollectionRequest::new("orders", 2, 2))
        .await
        .unwrap();
    cluster.quiesce().await;
    let snapshot = cluster.cluster_state().await;

    let other = cluster_with_nodes(0).await;
    other.sim_set_cluster_state(&snapshot).await.unwrap();

    let rebuilt = other.cluster_state().await;
    assert_eq!(rebuilt.live_nodes, snapshot.live_nodes);
    assert_eq!(rebuilt.collections, snapshot.collections);
    assert_eq!(other.sim_hosted_replica_count("node1").await, snapshot.replicas_on("node1") as u64);
}

#[tokio::test]
async fn test_empty_collections_and_shards_stay_visible() {
    let cluster = cluster_with_nodes(1).await;
    cluster
        .sim_set_collection_properties("ghost", Some(BTreeMap::from([(
            "configName".to_string(),
            json!("conf1"),
        )])))
        .await
        .unwrap();
    cluster
        .sim_set_shard_properties("ghost", "shard1", None)
        .await
        .unwrap();

    let snapshot = cluster.cluster_state().await;
    let coll = snapshot.collection("ghost").unwrap();
    assert_eq!(coll.properties.get("configName"), Some(&json!("conf1")));
    assert!(coll.shard("shard1").unwrap().replicas.is_empty());
    assert!(cluster.sim_list_collections().await.contains(&"ghost".to_string()));
}
