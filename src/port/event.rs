//! Typed event bus.
//!
//! Every observable fact the engine produces is one variant of [`Event`].
//! Sinks register on an [`EventBus`]; chain managers emit through an
//! [`Emitter`] handle, a capability that carries no reference back to the
//! orchestrator. Delivery is synchronous and in emission order per manager:
//! a slow sink slows emission, so sinks must not perform I/O inline.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::domain::balance::BalanceSnapshot;
use crate::domain::chain::ChainKey;
use crate::domain::rebalance::{RebalanceInstruction, TransferReceipt};
use crate::domain::wallet::WalletAddress;

/// Events emitted by chain managers and multiplexed by the fleet.
///
/// Snapshots are shared immutably; everything else is value-copied.
#[derive(Debug, Clone)]
pub enum Event {
    /// A balance refresh completed (whether or not values changed).
    Balances {
        /// The chain key the snapshot belongs to.
        key: ChainKey,
        /// The freshly published snapshot.
        new: Arc<BalanceSnapshot>,
        /// The snapshot it replaced. Token ordering is unstable between
        /// `new` and `previous`; consumers must not diff by position.
        previous: Arc<BalanceSnapshot>,
    },
    /// A background failure scoped to one chain (per-wallet refresh
    /// failure, rebalance cycle error, ...).
    ChainError {
        /// The chain key the failure occurred on.
        key: ChainKey,
        /// Human-readable description.
        message: String,
    },
    /// A rebalance cycle produced a non-empty plan and began executing.
    RebalanceStarted {
        /// The chain key being rebalanced.
        key: ChainKey,
        /// Strategy that produced the plan.
        strategy: String,
        /// The full instruction batch, in execution order.
        instructions: Vec<RebalanceInstruction>,
    },
    /// A rebalance cycle finished executing its batch.
    RebalanceFinished {
        /// The chain key that was rebalanced.
        key: ChainKey,
        /// Strategy that produced the plan.
        strategy: String,
        /// Receipts for the instructions that succeeded.
        receipts: Vec<TransferReceipt>,
    },
    /// One rebalance instruction failed.
    RebalanceError {
        /// The chain key being rebalanced.
        key: ChainKey,
        /// Strategy that produced the plan.
        strategy: String,
        /// The instruction that failed.
        instruction: RebalanceInstruction,
        /// Why it failed.
        message: String,
    },
    /// The number of currently-held wallet locks changed.
    ActiveWalletsCount {
        /// The chain key the count belongs to.
        key: ChainKey,
        /// Number of wallets currently held.
        count: usize,
    },
    /// A wallet lock was released after a non-zero hold.
    WalletsLockPeriod {
        /// The chain key the wallet belongs to.
        key: ChainKey,
        /// The wallet that was held.
        address: WalletAddress,
        /// How long it was held.
        held_for: Duration,
    },
}

/// A consumer of engine events.
///
/// Implementations must be thread-safe and must return quickly; spawn a
/// task for anything slow (the metrics exporter's scrape surface, outbound
/// notifications, ...).
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn handle(&self, event: Event);
}

/// Fan-out registry of sinks (composite pattern).
#[derive(Default)]
pub struct EventBus {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sink.
    pub fn register(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Delivers an event to every sink, synchronously, in registration
    /// order.
    pub fn publish(&self, event: Event) {
        for sink in &self.sinks {
            sink.handle(event.clone());
        }
    }

    /// Number of registered sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True when no sink is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

/// Cloneable emit capability handed to chain managers.
///
/// Managers see only this handle, never the fleet that owns the bus, so
/// the manager/orchestrator reference cycle never forms.
#[derive(Clone)]
pub struct Emitter {
    bus: Arc<EventBus>,
}

impl Emitter {
    /// Wraps a bus into an emit handle.
    #[must_use]
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// An emitter over an empty bus; events vanish. Useful for tests and
    /// standalone managers.
    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            bus: Arc::new(EventBus::new()),
        }
    }

    /// Emits one event.
    pub fn emit(&self, event: Event) {
        self.bus.publish(event);
    }
}

/// Reference sink that logs every event via `tracing`.
pub struct LogSink;

impl EventSink for LogSink {
    fn handle(&self, event: Event) {
        match event {
            Event::Balances { key, new, .. } => {
                info!(chain = %key, wallets = new.len(), "Balances refreshed");
            }
            Event::ChainError { key, message } => {
                error!(chain = %key, error = %message, "Chain error");
            }
            Event::RebalanceStarted { key, strategy, instructions } => {
                info!(
                    chain = %key,
                    strategy = %strategy,
                    instructions = instructions.len(),
                    "Rebalance started"
                );
            }
            Event::RebalanceFinished { key, strategy, receipts } => {
                info!(
                    chain = %key,
                    strategy = %strategy,
                    receipts = receipts.len(),
                    "Rebalance finished"
                );
            }
            Event::RebalanceError { key, strategy, instruction, message } => {
                error!(
                    chain = %key,
                    strategy = %strategy,
                    source = %instruction.source,
                    target = %instruction.target,
                    error = %message,
                    "Rebalance instruction failed"
                );
            }
            Event::ActiveWalletsCount { key, count } => {
                info!(chain = %key, count, "Active wallet locks");
            }
            Event::WalletsLockPeriod { key, address, held_for } => {
                info!(
                    chain = %key,
                    wallet = %address,
                    held_ms = held_for.as_millis() as u64,
                    "Wallet lock released"
                );
            }
        }
    }
}
