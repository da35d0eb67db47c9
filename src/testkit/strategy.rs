//! Scripted rebalance strategy for tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::balance::BalanceSnapshot;
use crate::domain::rebalance::RebalanceInstruction;
use crate::port::price::PriceFeed;
use crate::port::strategy::RebalanceStrategy;

/// Strategy replaying preset instruction batches, one per planning cycle.
///
/// Exhausted scripts plan nothing, so a test can bound exactly how many
/// rebalance cycles fire.
pub struct ScriptedStrategy {
    name: String,
    atomic: bool,
    batches: Mutex<VecDeque<Vec<RebalanceInstruction>>>,
}

impl ScriptedStrategy {
    /// Creates a strategy named `scripted` with no batches.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "scripted".into(),
            atomic: false,
            batches: Mutex::new(VecDeque::new()),
        }
    }

    /// Overrides the registered name.
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.into();
        self
    }

    /// Declares the batch atomic: the first failure aborts the rest.
    #[must_use]
    pub fn atomic(mut self) -> Self {
        self.atomic = true;
        self
    }

    /// Queues one instruction batch.
    #[must_use]
    pub fn with_batch(self, batch: Vec<RebalanceInstruction>) -> Self {
        self.batches.lock().push_back(batch);
        self
    }
}

impl Default for ScriptedStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RebalanceStrategy for ScriptedStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn atomic(&self) -> bool {
        self.atomic
    }

    async fn plan(
        &self,
        _balances: &BalanceSnapshot,
        _prices: Option<&dyn PriceFeed>,
    ) -> Vec<RebalanceInstruction> {
        self.batches.lock().pop_front().unwrap_or_default()
    }
}
