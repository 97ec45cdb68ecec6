//! Per-collection operation delays
//!
//! Every lifecycle operation can be slowed down by a configurable amount of
//! virtual time, per collection and per operation kind. A collection's table
//! is seeded from the global defaults when the collection is created.

use std::collections::HashMap;

/// Lifecycle operation kinds that can carry a simulated delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Create,
    Delete,
    AddReplica,
    DeleteReplica,
    MoveReplica,
    CreateShard,
    SplitShard,
    DeleteShard,
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OpKind::Create => "CREATE",
            OpKind::Delete => "DELETE",
            OpKind::AddReplica => "ADDREPLICA",
            OpKind::DeleteReplica => "DELETEREPLICA",
            OpKind::MoveReplica => "MOVEREPLICA",
            OpKind::CreateShard => "CREATESHARD",
            OpKind::SplitShard => "SPLITSHARD",
            OpKind::DeleteShard => "DELETESHARD",
        };
        write!(f, "{}", name)
    }
}

/// Default and per-collection delay tables, in milliseconds of virtual time.
#[derive(Debug, Clone)]
pub struct OperationDelays {
    defaults: HashMap<OpKind, u64>,
    per_collection: HashMap<String, HashMap<OpKind, u64>>,
}

impl Default for OperationDelays {
    fn default() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert(OpKind::Create, 500);
        defaults.insert(OpKind::Delete, 5000);
        defaults.insert(OpKind::AddReplica, 500);
        defaults.insert(OpKind::DeleteReplica, 5000);
        defaults.insert(OpKind::MoveReplica, 5000);
        defaults.insert(OpKind::CreateShard, 5000);
        defaults.insert(OpKind::SplitShard, 5000);
        defaults.insert(OpKind::DeleteShard, 5000);
        Self {
            defaults,
            per_collection: HashMap::new(),
        }
    }
}

impl OperationDelays {
    /// Copy the default table for a newly created collection.
    pub fn seed_collection(&mut self, collection: &str) {
        self.per_collection
            .entry(collection.to_string())
            .or_default()
            .extend(self.defaults.iter().map(|(k, v)| (*k, *v)));
    }

    pub fn remove_collection(&mut self, collection: &str) {
        self.per_collection.remove(collection);
    }

    pub fn clear(&mut self) {
        self.per_collection.clear();
    }

    /// The delay configured for `op` on `collection`, if any. Collections
    /// with no table (never seeded) have no delays.
    pub fn delay_for(&self, collection: &str, op: OpKind) -> Option<u64> {
        self.per_collection
            .get(collection)?
            .get(&op)
            .copied()
            .filter(|ms| *ms > 0)
    }

    /// Override individual delays for one collection.
    pub fn set_delays(&mut self, collection: &str, overrides: HashMap<OpKind, u64>) {
        self.per_collection
            .entry(collection.to_string())
            .or_default()
            .extend(overrides);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseeded_collection_has_no_delay() {
        let delays = OperationDelays::default();
        assert_eq!(delays.delay_for("orders", OpKind::Create), None);
    }

    #[test]
    fn test_seed_and_override() {
        let mut delays = OperationDelays::default();
        delays.seed_collection("orders");
        assert_eq!(delays.delay_for("orders", OpKind::AddReplica), Some(500));
        assert_eq!(delays.delay_for("orders", OpKind::SplitShard), Some(5000));

        delays.set_delays("orders", HashMap::from([(OpKind::AddReplica, 50)]));
        assert_eq!(delays.delay_for("orders", OpKind::AddReplica), Some(50));
    }

    #[test]
    fn test_zero_delay_means_no_sleep() {
        let mut delays = OperationDelays::default();
        delays.seed_collection("orders");
        delays.set_delays("orders", HashMap::from([(OpKind::Create, 0)]));
        assert_eq!(delays.delay_for("orders", OpKind::Create), None);
    }
}
