//! Purser - multi-chain wallet fleet engine.
//!
//! Manages a fleet of wallets across several blockchain networks: polls
//! balances per (chain, network), arbitrates exclusive use of each wallet
//! among concurrent callers, and periodically redistributes funds via
//! pluggable strategies. Balances and operational facts flow to observers
//! through a typed event bus.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── domain/          # Chain identity, wallets, balances, instructions
//! ├── port/            # Traits at the seams: driver, price feed,
//! │                    # strategy, event sink
//! ├── application/     # The engine: lock registry, poller, rebalancer,
//! │                    # chain manager, fleet orchestrator
//! ├── strategies.rs    # Built-in rebalance strategies
//! ├── infrastructure/  # Configuration and logging
//! └── testkit/         # Scripted mocks (feature `testkit`)
//! ```
//!
//! Wallet drivers, price oracles, and the metrics exporter are external
//! collaborators plugged in through [`port`] traits. The engine is
//! single-process by design: wallet leases make no cross-process claims.

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;
pub mod strategies;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use application::{
    AcquireOptions, ChainWalletManager, FleetBuilder, LeaseToken, LockRegistry, ManagerConfig,
    RebalancePlan, WalletFleet,
};
pub use domain::{
    BalanceSnapshot, ChainKey, ChainName, Network, RebalanceInstruction, TransferHints,
    TransferReceipt, Wallet, WalletAddress, WalletBalance,
};
pub use error::{ConfigError, DriverError, Error, FleetError, LockError, PriceError, Result};
pub use infrastructure::config::{FleetConfig, LoggingConfig};
pub use port::{Emitter, Event, EventBus, EventSink, LogSink, PriceFeed, RebalanceStrategy};
