//! The concurrency and lifecycle engine.

pub mod lock;
pub mod manager;
pub mod orchestrator;
pub mod poller;
pub mod price;
pub mod rebalancer;
pub mod table;

pub use lock::{AcquireOptions, LeaseToken, LockRegistry};
pub use manager::{ChainWalletManager, LeaseGuard, ManagerConfig, WalletLocks};
pub use orchestrator::{FleetBuilder, WalletFleet};
pub use rebalancer::RebalancePlan;

use tokio::sync::watch;

/// Resolves once the shutdown flag is raised or its sender is gone.
pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
