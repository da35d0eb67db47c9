//! Strategy-driven fund redistribution.
//!
//! The rebalancer runs on its own interval, independent of balance
//! polling. Each cycle plans against the most recent completed snapshot
//! (polling is never frozen), then executes instructions sequentially
//! under the per-wallet lock discipline. A source balance may have moved
//! between plan and execute; the driver re-checks sufficiency and fails
//! the instruction rather than overdraw.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::application::lock::AcquireOptions;
use crate::application::manager::ChainWalletManager;
use crate::application::wait_for_shutdown;
use crate::domain::rebalance::{RebalanceInstruction, TransferHints, TransferReceipt};
use crate::port::event::Event;
use crate::port::price::PriceFeed;
use crate::port::strategy::RebalanceStrategy;

/// A chain's rebalance settings, resolved at fleet construction.
#[derive(Clone)]
pub struct RebalancePlan {
    /// Strategy that produces instruction batches.
    pub strategy: Arc<dyn RebalanceStrategy>,
    /// Period between planning cycles.
    pub interval: Duration,
    /// Advisory hints forwarded to the driver on every transfer.
    pub hints: TransferHints,
    /// Shared price view handed to the strategy, when configured.
    pub price_feed: Option<Arc<dyn PriceFeed>>,
}

/// Runs planning cycles until shutdown.
pub(crate) async fn run(
    manager: Arc<ChainWalletManager>,
    plan: RebalancePlan,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(
        chain = %manager.key(),
        strategy = plan.strategy.name(),
        interval_ms = plan.interval.as_millis() as u64,
        "Rebalancer started"
    );

    loop {
        tokio::select! {
            () = wait_for_shutdown(&mut shutdown) => break,
            () = tokio::time::sleep(plan.interval) => {}
        }

        tokio::select! {
            () = wait_for_shutdown(&mut shutdown) => break,
            () = run_cycle(&manager, &plan) => {}
        }
    }

    debug!(chain = %manager.key(), "Rebalancer stopped");
}

/// One plan-and-execute cycle.
async fn run_cycle(manager: &ChainWalletManager, plan: &RebalancePlan) {
    let snapshot = manager.get_balances();
    let instructions = plan
        .strategy
        .plan(&snapshot, plan.price_feed.as_deref())
        .await;
    if instructions.is_empty() {
        return;
    }

    let key = manager.key().clone();
    let strategy = plan.strategy.name().to_string();
    manager.emitter().emit(Event::RebalanceStarted {
        key: key.clone(),
        strategy: strategy.clone(),
        instructions: instructions.clone(),
    });

    let mut receipts = Vec::with_capacity(instructions.len());
    for instruction in instructions {
        match execute(manager, plan, &instruction).await {
            Ok(receipt) => receipts.push(receipt),
            Err(message) => {
                warn!(
                    chain = %key,
                    source = %instruction.source,
                    error = %message,
                    "Rebalance instruction failed"
                );
                manager.emitter().emit(Event::RebalanceError {
                    key: key.clone(),
                    strategy: strategy.clone(),
                    instruction,
                    message,
                });
                if plan.strategy.atomic() {
                    break;
                }
            }
        }
    }

    manager.emitter().emit(Event::RebalanceFinished {
        key,
        strategy,
        receipts,
    });
}

/// Executes one instruction under the source wallet's lock.
async fn execute(
    manager: &ChainWalletManager,
    plan: &RebalancePlan,
    instruction: &RebalanceInstruction,
) -> Result<TransferReceipt, String> {
    let guard = manager
        .locks()
        .lease(&instruction.source, AcquireOptions::default())
        .await
        .map_err(|err| err.to_string())?;

    let result = manager.driver().transfer(instruction, &plan.hints).await;
    let _ = guard.release();
    result.map_err(|err| err.to_string())
}
