//! Simulation scenario entry point

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use simcluster::{CreateCollectionRequest, SimClusterConfig, SimClusterStateProvider};

/// simcluster - deterministic cluster topology simulator
#[derive(Parser, Debug)]
#[command(name = "simcluster")]
#[command(about = "Run a node-churn scenario against a simulated cluster")]
struct Args {
    /// Number of nodes to start with
    #[arg(long, default_value = "3")]
    nodes: usize,

    /// Collection name
    #[arg(long, default_value = "orders")]
    collection: String,

    /// Number of shards
    #[arg(long, default_value = "2")]
    shards: usize,

    /// Replication factor
    #[arg(long, default_value = "3")]
    replication: usize,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting simulated cluster...");
    let cluster = SimClusterStateProvider::new(SimClusterConfig::default());

    for i in 1..=args.nodes {
        cluster.sim_add_node(&format!("node{}", i)).await?;
    }

    cluster
        .sim_create_collection(CreateCollectionRequest::new(
            &args.collection,
            args.shards,
            args.replication,
        ))
        .await?;
    cluster.quiesce().await;

    let snapshot = cluster.cluster_state().await;
    let coll = snapshot
        .collection(&args.collection)
        .expect("collection was created");
    info!(
        "Collection {} ready: {} shards, {} replicas",
        args.collection,
        coll.shards.len(),
        coll.shards.values().map(|s| s.replicas.len()).sum::<usize>()
    );
    for shard in coll.shards.values() {
        let leader = shard.leader().map(|r| r.node.as_str()).unwrap_or("-");
        info!("  {}: leader on {}", shard.name, leader);
    }

    // Kill the first node and watch leadership move
    info!("Removing node1...");
    cluster.sim_remove_node("node1").await;
    cluster.quiesce().await;

    let snapshot = cluster.cluster_state().await;
    let coll = snapshot.collection(&args.collection).expect("still present");
    for shard in coll.shards.values() {
        let leader = shard.leader().map(|r| r.node.as_str()).unwrap_or("-");
        info!("  {}: leader on {}", shard.name, leader);
    }

    info!("Restoring node1...");
    let restored = cluster.sim_restore_node("node1").await;
    cluster.quiesce().await;
    info!("node1 restored, replicas recovered: {}", restored);

    info!(
        "Scenario complete at virtual time {}ms",
        cluster.clock().now_ms()
    );
    Ok(())
}
