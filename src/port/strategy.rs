//! Rebalance strategy port.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::balance::BalanceSnapshot;
use crate::domain::rebalance::RebalanceInstruction;
use crate::port::price::PriceFeed;

/// A planner that turns a balance snapshot into transfer instructions.
///
/// Strategies are pure with respect to engine state: they read the snapshot
/// (and optionally prices) and propose instructions; the rebalancer owns
/// execution, locking, and event emission.
#[async_trait]
pub trait RebalanceStrategy: Send + Sync {
    /// Name the strategy is registered and configured under.
    fn name(&self) -> &str;

    /// Whether instruction failures abort the remaining batch.
    ///
    /// Non-atomic strategies (the default) have each instruction fail
    /// independently.
    fn atomic(&self) -> bool {
        false
    }

    /// Plans transfers from the latest snapshot.
    ///
    /// An empty plan means the fleet is already balanced; the rebalancer
    /// emits no events for it.
    async fn plan(
        &self,
        balances: &BalanceSnapshot,
        prices: Option<&dyn PriceFeed>,
    ) -> Vec<RebalanceInstruction>;
}

/// Named strategies available to chain configuration.
///
/// A chain enabling rebalance with a name absent from the registry gets a
/// warning and no rebalancer.
#[derive(Default, Clone)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn RebalanceStrategy>>,
}

impl StrategyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a strategy under its own name.
    pub fn register(&mut self, strategy: Arc<dyn RebalanceStrategy>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    /// Looks up a strategy by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn RebalanceStrategy>> {
        self.strategies.get(name).cloned()
    }

    /// Number of registered strategies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl RebalanceStrategy for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        async fn plan(
            &self,
            _balances: &BalanceSnapshot,
            _prices: Option<&dyn PriceFeed>,
        ) -> Vec<RebalanceInstruction> {
            Vec::new()
        }
    }

    #[test]
    fn registry_resolves_by_name() {
        let mut registry = StrategyRegistry::new();
        registry.register(Arc::new(Noop));

        assert!(registry.get("noop").is_some());
        assert!(registry.get("other").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn strategies_default_to_non_atomic() {
        assert!(!Noop.atomic());
    }
}
