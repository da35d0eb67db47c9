//! Per-chain wallet manager.
//!
//! One [`ChainWalletManager`] exclusively owns a (chain, network) pair: it
//! is the only writer of that key's balance table, the only emitter of its
//! chain-scoped events, and the home of its lock registry. Background work
//! (polling, rebalancing) runs as tokio tasks torn down by [`stop`].
//!
//! [`stop`]: ChainWalletManager::stop

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::lock::{AcquireOptions, LeaseToken, LockRegistry};
use crate::application::poller;
use crate::application::rebalancer::{self, RebalancePlan};
use crate::application::table::BalanceTable;
use crate::domain::balance::BalanceSnapshot;
use crate::domain::chain::ChainKey;
use crate::domain::wallet::{Wallet, WalletAddress};
use crate::error::{Error, FleetError, LockError, Result};
use crate::port::driver::WalletDriver;
use crate::port::event::{Emitter, Event};

/// Lock registry facade that keeps the active-wallet accounting honest.
///
/// Every acquire/release that goes through here recomputes the held count
/// and emits [`Event::ActiveWalletsCount`]; releases additionally emit
/// [`Event::WalletsLockPeriod`] for non-zero holds. Both the manager's
/// public lock surface and the rebalancer use this facade, never the raw
/// registry.
#[derive(Clone)]
pub struct WalletLocks {
    key: ChainKey,
    registry: LockRegistry,
    emitter: Emitter,
}

impl WalletLocks {
    pub(crate) fn new(key: ChainKey, emitter: Emitter) -> Self {
        Self {
            key,
            registry: LockRegistry::new(),
            emitter,
        }
    }

    /// Acquires a lease and publishes the new active count.
    pub async fn acquire(
        &self,
        address: &WalletAddress,
        opts: AcquireOptions,
    ) -> std::result::Result<LeaseToken, LockError> {
        let token = self.registry.acquire(address, opts).await?;
        self.emit_count();
        Ok(token)
    }

    /// Releases a lease, publishing the new count and the hold duration.
    pub fn release(&self, token: LeaseToken) -> std::result::Result<Duration, LockError> {
        let address = token.address().clone();
        let held_for = self.registry.release(token)?;
        self.emit_count();
        if held_for > Duration::ZERO {
            self.emitter.emit(Event::WalletsLockPeriod {
                key: self.key.clone(),
                address,
                held_for,
            });
        }
        Ok(held_for)
    }

    /// Scoped acquisition: the returned guard releases on drop.
    pub async fn lease(
        &self,
        address: &WalletAddress,
        opts: AcquireOptions,
    ) -> std::result::Result<LeaseGuard, LockError> {
        let token = self.acquire(address, opts).await?;
        Ok(LeaseGuard {
            locks: self.clone(),
            token: Some(token),
        })
    }

    /// Number of currently-held wallets.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.registry.held_count()
    }

    pub(crate) fn close(&self) {
        self.registry.close();
    }

    fn emit_count(&self) {
        self.emitter.emit(Event::ActiveWalletsCount {
            key: self.key.clone(),
            count: self.registry.held_count(),
        });
    }
}

/// Releases its lease on drop, so a cancelled or failed caller can never
/// strand a wallet lock.
pub struct LeaseGuard {
    locks: WalletLocks,
    token: Option<LeaseToken>,
}

impl LeaseGuard {
    /// Releases explicitly, surfacing the registry's verdict.
    pub fn release(mut self) -> std::result::Result<Duration, LockError> {
        let token = self.token.take().expect("token present until release/drop");
        self.locks.release(token)
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            // Expired leases and a closed registry are fine to ignore here;
            // the wallet is already free.
            let _ = self.locks.release(token);
        }
    }
}

enum Lifecycle {
    Idle,
    Running {
        shutdown: watch::Sender<bool>,
        tasks: Vec<JoinHandle<()>>,
    },
    Stopped,
}

/// Everything needed to build a [`ChainWalletManager`].
pub struct ManagerConfig {
    /// The chain key the manager will own.
    pub key: ChainKey,
    /// Driver for the chain.
    pub driver: Arc<dyn WalletDriver>,
    /// Managed wallets. Addresses must be unique.
    pub wallets: Vec<Wallet>,
    /// Poll period; `None` disables background polling.
    pub poll_interval: Option<Duration>,
    /// Rebalance plan; `None` disables the rebalancer.
    pub rebalance: Option<RebalancePlan>,
}

/// Owner of one chain key: balance table, lock registry, background tasks.
pub struct ChainWalletManager {
    key: ChainKey,
    driver: Arc<dyn WalletDriver>,
    wallets: Vec<Wallet>,
    table: BalanceTable,
    locks: WalletLocks,
    emitter: Emitter,
    poll_interval: Option<Duration>,
    rebalance: Option<RebalancePlan>,
    lifecycle: Mutex<Lifecycle>,
    /// Serializes refreshes; combined with the table version it gives
    /// concurrent `pull_balances` callers a single shared in-flight
    /// refresh.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for ChainWalletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainWalletManager")
            .field("key", &self.key)
            .field("wallets", &self.wallets)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl ChainWalletManager {
    /// Builds an idle manager. Call [`start`](Self::start) to begin
    /// polling and rebalancing.
    #[must_use]
    pub fn new(config: ManagerConfig, emitter: Emitter) -> Arc<Self> {
        let locks = WalletLocks::new(config.key.clone(), emitter.clone());
        Arc::new(Self {
            key: config.key,
            driver: config.driver,
            wallets: config.wallets,
            table: BalanceTable::new(),
            locks,
            emitter,
            poll_interval: config.poll_interval,
            rebalance: config.rebalance,
            lifecycle: Mutex::new(Lifecycle::Idle),
            refresh_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// The chain key this manager owns.
    #[must_use]
    pub fn key(&self) -> &ChainKey {
        &self.key
    }

    /// The managed wallets.
    #[must_use]
    pub fn wallets(&self) -> &[Wallet] {
        &self.wallets
    }

    /// Looks up a configured wallet by address.
    pub fn wallet(&self, address: &WalletAddress) -> Result<&Wallet> {
        self.wallets
            .iter()
            .find(|w| &w.address == address)
            .ok_or_else(|| {
                FleetError::UnknownWallet {
                    chain: self.key.chain,
                    address: address.clone(),
                }
                .into()
            })
    }

    /// Starts background polling and rebalancing. Idempotent while
    /// running.
    ///
    /// # Errors
    ///
    /// [`FleetError::ManagerStopped`] once [`stop`](Self::stop) has run;
    /// a stopped manager is terminal.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        match &*lifecycle {
            Lifecycle::Running { .. } => return Ok(()),
            Lifecycle::Stopped => {
                return Err(FleetError::ManagerStopped(self.key.chain).into());
            }
            Lifecycle::Idle => {}
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        if let Some(interval) = self.poll_interval {
            tasks.push(tokio::spawn(poller::run(
                Arc::clone(self),
                interval,
                shutdown_rx.clone(),
            )));
        } else {
            info!(chain = %self.key, "Balance polling disabled; refreshes are on demand only");
        }

        if let Some(plan) = self.rebalance.clone() {
            tasks.push(tokio::spawn(rebalancer::run(
                Arc::clone(self),
                plan,
                shutdown_rx,
            )));
        }

        info!(chain = %self.key, wallets = self.wallets.len(), "Chain manager started");
        *lifecycle = Lifecycle::Running { shutdown, tasks };
        Ok(())
    }

    /// Stops the manager: cancels background tasks, fails lock waiters
    /// with [`LockError::Cancelled`], and waits for quiescence. After this
    /// returns, no further events are emitted for the chain key and no new
    /// driver calls start. Terminal; `start` afterwards fails.
    pub async fn stop(&self) {
        let tasks = {
            let mut lifecycle = self.lifecycle.lock();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Running { shutdown, tasks } => {
                    let _ = shutdown.send(true);
                    tasks
                }
                _ => Vec::new(),
            }
        };

        self.locks.close();
        for task in tasks {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!(chain = %self.key, error = %err, "Background task ended abnormally");
                }
            }
        }
        // Let any caller-initiated refresh that slipped past the stop check
        // flush its events before quiescence is declared.
        drop(self.refresh_gate.lock().await);
        info!(chain = %self.key, "Chain manager stopped");
    }

    fn ensure_not_stopped(&self) -> Result<()> {
        if matches!(&*self.lifecycle.lock(), Lifecycle::Stopped) {
            return Err(FleetError::ManagerStopped(self.key.chain).into());
        }
        Ok(())
    }

    /// The lock facade for this chain.
    #[must_use]
    pub fn locks(&self) -> &WalletLocks {
        &self.locks
    }

    pub(crate) fn driver(&self) -> &Arc<dyn WalletDriver> {
        &self.driver
    }

    pub(crate) fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    /// Acquires the lock for a configured wallet.
    pub async fn acquire_lock(
        &self,
        address: &WalletAddress,
        opts: AcquireOptions,
    ) -> Result<LeaseToken> {
        self.wallet(address)?;
        Ok(self.locks.acquire(address, opts).await?)
    }

    /// Releases a previously acquired lock.
    pub fn release_lock(&self, token: LeaseToken) -> Result<Duration> {
        Ok(self.locks.release(token)?)
    }

    /// The current snapshot. Never performs I/O.
    #[must_use]
    pub fn get_balances(&self) -> Arc<BalanceSnapshot> {
        self.table.snapshot()
    }

    /// Forces one refresh and returns the resulting snapshot.
    ///
    /// Concurrent callers share a single in-flight refresh: whoever enters
    /// first performs it; callers that queued behind the gate observe the
    /// bumped table version and return the freshly published snapshot
    /// without a second driver round-trip.
    pub async fn pull_balances(&self) -> Result<Arc<BalanceSnapshot>> {
        self.ensure_not_stopped()?;
        let entry_version = self.table.version();
        let _gate = self.refresh_gate.lock().await;
        // A stop may have landed while we queued for the gate.
        self.ensure_not_stopped()?;
        if self.table.version() > entry_version {
            return Ok(self.table.snapshot());
        }
        Ok(self.refresh_once().await)
    }

    /// Queries balances as of `height` without touching the persistent
    /// snapshot.
    pub async fn pull_balances_at_height(&self, height: u64) -> Result<BalanceSnapshot> {
        self.ensure_not_stopped()?;
        let balances = self
            .driver
            .pull_balances_at_height(&self.wallets, height)
            .await
            .map_err(Error::Driver)?;

        let mut by_address: HashMap<WalletAddress, Vec<_>> = HashMap::new();
        for balance in balances {
            by_address.entry(balance.address.clone()).or_default().push(balance);
        }
        Ok(BalanceSnapshot::from_entries(by_address))
    }

    /// Current block height, straight from the driver.
    pub async fn block_height(&self) -> Result<u64> {
        Ok(self.driver.block_height().await?)
    }

    /// Performs one full refresh and publishes the result.
    ///
    /// Must run behind `refresh_gate`. Per-wallet failures emit
    /// [`Event::ChainError`] and carry the wallet's prior balances into the
    /// new snapshot, so one bad RPC never evicts a wallet from the table.
    async fn refresh_once(&self) -> Arc<BalanceSnapshot> {
        let results = self.driver.pull_balances(&self.wallets).await;
        let prior = self.table.snapshot();

        let mut next = BalanceSnapshot::default();
        for (wallet, result) in self.wallets.iter().zip(results) {
            match result {
                Ok(balances) => next.insert(wallet.address.clone(), balances),
                Err(err) => {
                    self.emitter.emit(Event::ChainError {
                        key: self.key.clone(),
                        message: format!("balance refresh failed for {}: {err}", wallet.address),
                    });
                    if let Some(last_known) = prior.get(&wallet.address) {
                        next.insert(wallet.address.clone(), last_known.to_vec());
                    }
                }
            }
        }

        let next = Arc::new(next);
        let previous = self.table.publish(Arc::clone(&next));
        self.emitter.emit(Event::Balances {
            key: self.key.clone(),
            new: Arc::clone(&next),
            previous,
        });
        next
    }
}
