//! Shared test fixtures

use std::sync::Arc;

use simcluster::{SimClusterConfig, SimClusterStateProvider};

/// A fresh simulated cluster with `count` live nodes named `node1..nodeN`.
pub async fn cluster_with_nodes(count: usize) -> Arc<SimClusterStateProvider> {
    let cluster = SimClusterStateProvider::new(SimClusterConfig::default());
    for i in 1..=count {
        cluster
            .sim_add_node(&format!("node{}", i))
            .await
            .expect("node added");
    }
    cluster
}
