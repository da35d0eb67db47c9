//! Fleet configuration.

pub mod logging;
pub mod settings;

pub use logging::LoggingConfig;
pub use settings::{
    ChainConfig, ChainPriceFeedConfig, FleetConfig, MetricsConfig, PriceFeedOptions,
    RebalanceConfig, ScheduledConfig, TokenConfig, WalletBalanceConfig, WalletConfig,
};
