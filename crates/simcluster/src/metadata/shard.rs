//! Shard state and hash-range definitions

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Shard property key holding the lifecycle state.
pub const SHARD_STATE_PROP: &str = "state";
/// Shard property key holding the hash range (hex `min-max`).
pub const RANGE_PROP: &str = "range";
/// Shard property key holding the parent shard's name after a split.
pub const PARENT_PROP: &str = "parent";

/// Shard lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardState {
    /// Serving reads and writes.
    Active,
    /// Retained after a split but no longer serving.
    Inactive,
}

impl Default for ShardState {
    fn default() -> Self {
        Self::Active
    }
}

impl std::fmt::Display for ShardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShardState::Active => write!(f, "active"),
            ShardState::Inactive => write!(f, "inactive"),
        }
    }
}

impl FromStr for ShardState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ShardState::Active),
            "inactive" => Ok(ShardState::Inactive),
            other => Err(format!("unknown shard state: {}", other)),
        }
    }
}

/// Hash range [min, max] on the signed 32-bit ring, both ends inclusive.
///
/// Rendered as hex `min-max`, e.g. `80000000-7fffffff` for the full ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRange {
    pub min: i32,
    pub max: i32,
}

impl ShardRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// The full hash ring.
    pub fn full() -> Self {
        Self {
            min: i32::MIN,
            max: i32::MAX,
        }
    }

    pub fn contains(&self, hash: i32) -> bool {
        hash >= self.min && hash <= self.max
    }

    /// Split into `parts` contiguous sub-ranges covering this range exactly.
    pub fn partition(&self, parts: usize) -> Vec<ShardRange> {
        assert!(parts > 0, "parts must be positive");
        let span = (self.max as i64) - (self.min as i64) + 1;
        let step = span / parts as i64;
        let mut ranges = Vec::with_capacity(parts);
        let mut lo = self.min as i64;
        for i in 0..parts {
            let hi = if i == parts - 1 {
                self.max as i64
            } else {
                lo + step - 1
            };
            ranges.push(ShardRange::new(lo as i32, hi as i32));
            lo = hi + 1;
        }
        ranges
    }
}

impl std::fmt::Display for ShardRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}-{:x}", self.min as u32, self.max as u32)
    }
}

impl FromStr for ShardRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (min, max) = s
            .split_once('-')
            .ok_or_else(|| format!("malformed range: {}", s))?;
        let min = u32::from_str_radix(min, 16).map_err(|e| e.to_string())? as i32;
        let max = u32::from_str_radix(max, 16).map_err(|e| e.to_string())? as i32;
        Ok(ShardRange::new(min, max))
    }
}
