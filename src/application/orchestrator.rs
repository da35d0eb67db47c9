//! Top-level fleet orchestrator.
//!
//! [`WalletFleet`] constructs one [`ChainWalletManager`] per configured
//! chain, shares a single price feed across them, multiplexes their events
//! onto one bus, and fans cross-chain queries out with bounded
//! concurrency. Managers receive only an [`Emitter`] capability, never a
//! reference to the fleet, so no ownership cycle forms.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::{info, warn};

use crate::application::lock::AcquireOptions;
use crate::application::manager::{ChainWalletManager, ManagerConfig};
use crate::application::price::{OnDemandPriceFeed, ScheduledPriceFeed};
use crate::application::rebalancer::RebalancePlan;
use crate::domain::balance::BalanceSnapshot;
use crate::domain::chain::ChainName;
use crate::domain::wallet::{Wallet, WalletAddress};
use crate::error::{ConfigError, Error, FleetError, Result};
use crate::infrastructure::config::settings::{ChainConfig, FleetConfig};
use crate::port::driver::WalletDriver;
use crate::port::event::{Emitter, EventBus, EventSink};
use crate::port::price::{prepare_price_feed_config, PriceFeed};
use crate::port::strategy::{RebalanceStrategy, StrategyRegistry};
use crate::strategies::ThresholdStrategy;

const DEFAULT_PRICE_REFRESH: Duration = Duration::from_secs(60);

/// Step-by-step construction of a [`WalletFleet`].
pub struct FleetBuilder {
    config: FleetConfig,
    drivers: HashMap<ChainName, Arc<dyn WalletDriver>>,
    strategies: StrategyRegistry,
    price_source: Option<Arc<dyn PriceFeed>>,
    sinks: Vec<Box<dyn EventSink>>,
}

impl FleetBuilder {
    fn new(config: FleetConfig) -> Self {
        Self {
            config,
            drivers: HashMap::new(),
            strategies: StrategyRegistry::new(),
            price_source: None,
            sinks: Vec::new(),
        }
    }

    /// Registers the driver for one chain. Every configured chain needs
    /// one.
    #[must_use]
    pub fn driver(mut self, chain: ChainName, driver: Arc<dyn WalletDriver>) -> Self {
        self.drivers.insert(chain, driver);
        self
    }

    /// Registers a rebalance strategy under its own name.
    #[must_use]
    pub fn strategy(mut self, strategy: Arc<dyn RebalanceStrategy>) -> Self {
        self.strategies.register(strategy);
        self
    }

    /// Replaces the strategy registry wholesale.
    #[must_use]
    pub fn strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = strategies;
        self
    }

    /// Supplies the source price oracle the fleet wraps per its
    /// `price_feed` configuration.
    #[must_use]
    pub fn price_source(mut self, source: Arc<dyn PriceFeed>) -> Self {
        self.price_source = Some(source);
        self
    }

    /// Registers a downstream event sink (metrics exporter, logger, ...).
    #[must_use]
    pub fn sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Validates the configuration, constructs every chain manager, and
    /// starts them.
    pub fn build(self) -> Result<WalletFleet> {
        let Self {
            config,
            drivers,
            strategies,
            price_source,
            sinks,
        } = self;

        let mut bus = EventBus::new();
        for sink in sinks {
            bus.register(sink);
        }
        let bus = Arc::new(bus);
        let emitter = Emitter::new(Arc::clone(&bus));

        let (price_feed, scheduled_feed) = build_price_feed(&config, price_source)?;

        let mut managers = HashMap::new();
        for (chain, chain_config) in config.validated_chains()? {
            let driver = drivers
                .get(&chain)
                .cloned()
                .ok_or(ConfigError::MissingDriver(chain))?;
            let wallets = chain_config.build_wallets(chain, config.fail_on_invalid_tokens)?;

            let rebalance = resolve_rebalance(
                chain,
                chain_config,
                &strategies,
                price_feed.clone(),
            );

            let manager = ChainWalletManager::new(
                ManagerConfig {
                    key: chain_config.key(chain),
                    driver,
                    wallets,
                    poll_interval: config.poll_interval_for(chain_config),
                    rebalance,
                },
                emitter.clone(),
            );
            manager.start()?;
            managers.insert(chain, manager);
        }

        info!(chains = managers.len(), "Wallet fleet started");
        Ok(WalletFleet {
            managers,
            bus,
            scheduled_feed,
            fanout: config.fanout_concurrency.max(1),
        })
    }
}

/// Builds the shared price feed per the `price_feed` options.
///
/// Returns the feed handed to strategies plus the scheduled wrapper (when
/// that mode is selected) so the fleet can stop its refresher.
fn build_price_feed(
    config: &FleetConfig,
    source: Option<Arc<dyn PriceFeed>>,
) -> Result<(Option<Arc<dyn PriceFeed>>, Option<Arc<ScheduledPriceFeed>>)> {
    if !config.price_feed.enabled {
        return Ok((None, None));
    }
    let source = source.ok_or(ConfigError::MissingField {
        field: "price_feed source (FleetBuilder::price_source)",
    })?;

    if config.price_feed.scheduled.enabled {
        let interval = config
            .price_feed
            .scheduled
            .interval_ms
            .map_or(DEFAULT_PRICE_REFRESH, Duration::from_millis);
        let tokens = prepare_price_feed_config(config);
        let scheduled = ScheduledPriceFeed::start(source, tokens, interval);
        let feed: Arc<dyn PriceFeed> = Arc::clone(&scheduled) as Arc<dyn PriceFeed>;
        Ok((Some(feed), Some(scheduled)))
    } else {
        let feed: Arc<dyn PriceFeed> = Arc::new(OnDemandPriceFeed::new(source));
        Ok((Some(feed), None))
    }
}

/// Resolves a chain's rebalance section into a runnable plan.
///
/// Disabled sections and unknown strategy names produce no rebalancer; the
/// latter logs a warning rather than failing the fleet.
fn resolve_rebalance(
    chain: ChainName,
    chain_config: &ChainConfig,
    strategies: &StrategyRegistry,
    price_feed: Option<Arc<dyn PriceFeed>>,
) -> Option<RebalancePlan> {
    let rebalance = chain_config.rebalance.as_ref()?;
    if !rebalance.enabled {
        return None;
    }
    let registered = strategies.get(&rebalance.strategy);
    let strategy: Arc<dyn RebalanceStrategy> = match registered {
        Some(strategy) => strategy,
        // The threshold strategy is built in; a per-chain floor in config
        // is enough to instantiate it without explicit registration.
        None if rebalance.strategy == ThresholdStrategy::NAME => {
            match rebalance.min_balance_threshold {
                Some(threshold) => Arc::new(ThresholdStrategy::new(threshold)),
                None => {
                    warn!(
                        chain = %chain,
                        "Threshold strategy needs rebalance.min_balance_threshold; rebalancing disabled"
                    );
                    return None;
                }
            }
        }
        None => {
            warn!(
                chain = %chain,
                strategy = %rebalance.strategy,
                "Unknown rebalance strategy; rebalancing disabled for this chain"
            );
            return None;
        }
    };
    Some(RebalancePlan {
        strategy,
        interval: Duration::from_millis(rebalance.interval_ms),
        hints: chain_config.transfer_hints(),
        price_feed,
    })
}

/// The running fleet: one manager per chain, one event bus, one shared
/// price feed.
pub struct WalletFleet {
    managers: HashMap<ChainName, Arc<ChainWalletManager>>,
    bus: Arc<EventBus>,
    scheduled_feed: Option<Arc<ScheduledPriceFeed>>,
    fanout: usize,
}

impl std::fmt::Debug for WalletFleet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletFleet")
            .field("chains", &self.managers.keys().collect::<Vec<_>>())
            .field("fanout", &self.fanout)
            .finish_non_exhaustive()
    }
}

impl WalletFleet {
    /// Starts building a fleet from configuration.
    #[must_use]
    pub fn builder(config: FleetConfig) -> FleetBuilder {
        FleetBuilder::new(config)
    }

    /// The manager owning one chain.
    ///
    /// # Errors
    ///
    /// [`FleetError::UnknownChain`] when the chain is not in the manager
    /// map; a missing key is a first-class error, never a silent miss.
    pub fn manager(&self, chain: ChainName) -> Result<&Arc<ChainWalletManager>> {
        self.managers
            .get(&chain)
            .ok_or_else(|| FleetError::UnknownChain(chain).into())
    }

    /// The chains this fleet manages.
    pub fn chains(&self) -> impl Iterator<Item = ChainName> + '_ {
        self.managers.keys().copied()
    }

    /// The fleet's event bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Current snapshots for every managed chain.
    ///
    /// Reads existing snapshots only; no driver I/O.
    pub async fn get_all_balances(&self) -> Result<HashMap<ChainName, Arc<BalanceSnapshot>>> {
        self.fanout(self.fanout, |manager| async move {
            Ok(manager.get_balances())
        })
        .await
    }

    /// Forces a refresh on every chain and returns the fresh snapshots.
    pub async fn pull_balances(&self) -> Result<HashMap<ChainName, Arc<BalanceSnapshot>>> {
        self.fanout(self.fanout, |manager| async move {
            manager.pull_balances().await
        })
        .await
    }

    /// Current block height of every chain.
    ///
    /// Runs with concurrency equal to the number of chains for the
    /// tightest cross-chain coherence, and aborts on the first failure:
    /// there is no partial result.
    pub async fn block_heights(&self) -> Result<HashMap<ChainName, u64>> {
        let mut in_flight: FuturesUnordered<_> = self
            .managers
            .iter()
            .map(|(&chain, manager)| {
                let manager = Arc::clone(manager);
                async move { (chain, manager.block_height().await) }
            })
            .collect();

        let mut heights = HashMap::with_capacity(self.managers.len());
        while let Some((chain, result)) = in_flight.next().await {
            match result {
                Ok(height) => {
                    heights.insert(chain, height);
                }
                Err(Error::Driver(source)) => {
                    return Err(FleetError::BlockHeightUnavailable { chain, source }.into());
                }
                Err(other) => {
                    return Err(FleetError::Chain {
                        chain,
                        source: Box::new(other),
                    }
                    .into());
                }
            }
        }
        Ok(heights)
    }

    /// Balances of every chain at pinned block heights.
    ///
    /// When `heights` is provided, every key must name a managed chain;
    /// when absent, [`block_heights`](Self::block_heights) pins them
    /// first. Persistent snapshots are never touched.
    pub async fn pull_balances_at_heights(
        &self,
        heights: Option<HashMap<ChainName, u64>>,
    ) -> Result<HashMap<ChainName, BalanceSnapshot>> {
        let heights = match heights {
            Some(heights) => {
                for chain in heights.keys() {
                    if !self.managers.contains_key(chain) {
                        return Err(FleetError::UnknownChain(*chain).into());
                    }
                }
                heights
            }
            None => self.block_heights().await?,
        };

        let mut stream = futures_util::stream::iter(heights.iter().map(|(&chain, &height)| {
            // Keys were validated above.
            let manager = Arc::clone(&self.managers[&chain]);
            async move { (chain, manager.pull_balances_at_height(height).await) }
        }))
        .buffer_unordered(self.fanout);

        let mut snapshots = HashMap::with_capacity(heights.len());
        while let Some((chain, result)) = stream.next().await {
            let snapshot = result.map_err(|err| FleetError::Chain {
                chain,
                source: Box::new(err),
            })?;
            snapshots.insert(chain, snapshot);
        }
        Ok(snapshots)
    }

    /// Runs `f` against a wallet while holding its lock.
    ///
    /// The lock is released on every exit path: success, an error from
    /// `f`, or cancellation of `f`'s future. Any `lease_timeout` in
    /// `opts` is ignored; the closure's own timeout governs how long the
    /// wallet stays held.
    pub async fn with_wallet<F, Fut, T>(
        &self,
        chain: ChainName,
        address: &WalletAddress,
        mut opts: AcquireOptions,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(Wallet) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let manager = self.manager(chain)?;
        let wallet = manager.wallet(address)?.clone();

        opts.lease_timeout = None;
        let guard = manager.locks().lease(address, opts).await?;
        let result = f(wallet).await;
        let _ = guard.release();
        result
    }

    /// Stops every manager and the scheduled price feed.
    ///
    /// After this returns no chain emits further events.
    pub async fn stop(&self) {
        for manager in self.managers.values() {
            manager.stop().await;
        }
        if let Some(feed) = &self.scheduled_feed {
            feed.stop();
        }
        info!("Wallet fleet stopped");
    }

    /// Bounded concurrent fanout over every manager, wrapping per-chain
    /// failures with their chain name.
    async fn fanout<T, F, Fut>(&self, bound: usize, op: F) -> Result<HashMap<ChainName, T>>
    where
        F: Fn(Arc<ChainWalletManager>) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut results = HashMap::with_capacity(self.managers.len());
        let mut stream = futures_util::stream::iter(self.managers.iter().map(
            |(&chain, manager)| {
                let fut = op(Arc::clone(manager));
                async move { (chain, fut.await) }
            },
        ))
        .buffer_unordered(bound);

        while let Some((chain, result)) = stream.next().await {
            let value = result.map_err(|err| FleetError::Chain {
                chain,
                source: Box::new(err),
            })?;
            results.insert(chain, value);
        }
        Ok(results)
    }
}
