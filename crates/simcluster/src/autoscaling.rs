//! Simulated autoscaling configuration
//!
//! The simulator only needs to know which node-churn events the active
//! configuration subscribes to, so that the matching markers are written to
//! the state store.

use std::collections::HashSet;

/// Node-churn event kinds a trigger can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerEventType {
    NodeAdded,
    NodeLost,
}

/// Active autoscaling configuration.
#[derive(Debug, Clone, Default)]
pub struct AutoScalingConfig {
    subscribed: HashSet<TriggerEventType>,
}

impl AutoScalingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a trigger to `event`.
    pub fn with_trigger(mut self, event: TriggerEventType) -> Self {
        self.subscribed.insert(event);
        self
    }

    pub fn has_trigger_for(&self, event: TriggerEventType) -> bool {
        self.subscribed.contains(&event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriptions() {
        let cfg = AutoScalingConfig::new().with_trigger(TriggerEventType::NodeLost);
        assert!(cfg.has_trigger_for(TriggerEventType::NodeLost));
        assert!(!cfg.has_trigger_for(TriggerEventType::NodeAdded));
    }
}
