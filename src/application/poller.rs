//! Balance polling loop.
//!
//! One task per chain manager. The first refresh fires immediately; each
//! subsequent refresh is scheduled `interval` after the *completion* of
//! the previous one, so a slow RPC endpoint stretches the period instead
//! of piling refreshes on top of each other.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::application::manager::ChainWalletManager;
use crate::application::wait_for_shutdown;

/// Runs the refresh loop until shutdown.
pub(crate) async fn run(
    manager: Arc<ChainWalletManager>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(chain = %manager.key(), interval_ms = interval.as_millis() as u64, "Balance poller started");

    loop {
        tokio::select! {
            () = wait_for_shutdown(&mut shutdown) => break,
            // Per-wallet failures are emitted as events inside the refresh;
            // the only hard error is a stopped manager.
            _ = manager.pull_balances() => {}
        }

        tokio::select! {
            () = wait_for_shutdown(&mut shutdown) => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    debug!(chain = %manager.key(), "Balance poller stopped");
}
