//! Hash-range routing
//!
//! Maps keys onto the signed 32-bit hash ring and partitions shard ranges
//! during a split.

use crate::metadata::ShardRange;

/// Range-partitioning collaborator used by shard splitting.
pub trait ShardRouter: Send + Sync {
    /// The range covering the whole hash ring.
    fn full_range(&self) -> ShardRange {
        ShardRange::full()
    }

    /// Hash a routing key onto the ring.
    fn key_hash(&self, key: &str) -> i32;

    /// Partition `parent` into `parts` contiguous sub-ranges.
    fn split(&self, parent: &ShardRange, parts: usize) -> Vec<ShardRange> {
        parent.partition(parts)
    }

    /// Names of the sub-shards created when splitting `parent`.
    fn sub_shard_names(&self, parent: &str, parts: usize) -> Vec<String> {
        (0..parts).map(|i| format!("{}_{}", parent, i)).collect()
    }
}

/// Default router: FNV-1a key hashing over the full ring.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashRouter;

impl ShardRouter for HashRouter {
    fn key_hash(&self, key: &str) -> i32 {
        const FNV_OFFSET: u32 = 0x811c_9dc5;
        const FNV_PRIME: u32 = 0x0100_0193;
        let mut hash = FNV_OFFSET;
        for b in key.as_bytes() {
            hash ^= *b as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash as i32
    }
}
