//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use purser::application::manager::ManagerConfig;
use purser::application::RebalancePlan;
use purser::domain::{ChainKey, ChainName, TransferHints, Wallet};
use purser::port::event::{Emitter, EventBus};
use purser::port::strategy::RebalanceStrategy;
use purser::testkit::{RecordingSink, ScriptedDriver};
use purser::ChainWalletManager;

/// Default key used by single-chain tests.
pub fn ethereum_key() -> ChainKey {
    ChainKey::with_default_network(ChainName::Ethereum)
}

/// An emitter wired to a fresh recording sink.
pub fn recording_emitter() -> (Emitter, RecordingSink) {
    let sink = RecordingSink::new();
    let mut bus = EventBus::new();
    bus.register(Box::new(sink.clone()));
    (Emitter::new(Arc::new(bus)), sink)
}

/// A started manager over a scripted driver, with events recorded.
pub fn started_manager(
    driver: Arc<ScriptedDriver>,
    wallets: Vec<Wallet>,
    poll_interval: Option<Duration>,
) -> (Arc<ChainWalletManager>, RecordingSink) {
    let (manager, sink) = idle_manager(driver, wallets, poll_interval, None);
    manager.start().expect("fresh manager starts");
    (manager, sink)
}

/// An idle manager, optionally with a rebalance plan.
pub fn idle_manager(
    driver: Arc<ScriptedDriver>,
    wallets: Vec<Wallet>,
    poll_interval: Option<Duration>,
    rebalance: Option<(Arc<dyn RebalanceStrategy>, Duration)>,
) -> (Arc<ChainWalletManager>, RecordingSink) {
    let (emitter, sink) = recording_emitter();
    let rebalance = rebalance.map(|(strategy, interval)| RebalancePlan {
        strategy,
        interval,
        hints: TransferHints::default(),
        price_feed: None,
    });
    let manager = ChainWalletManager::new(
        ManagerConfig {
            key: ethereum_key(),
            driver,
            wallets,
            poll_interval,
            rebalance,
        },
        emitter,
    );
    (manager, sink)
}
