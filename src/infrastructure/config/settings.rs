//! Fleet configuration loading and validation.
//!
//! Configuration is TOML with serde defaults; unknown fields are accepted
//! and ignored so older configs keep working across upgrades. Chain names
//! are validated against the closed [`ChainName`] set at build time, and
//! wallet token references are validated against the chain's token table.
//! Both checks degrade from error to warn-and-skip via the `fail_on_*`
//! flags.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::domain::chain::{ChainKey, ChainName, Network};
use crate::domain::rebalance::TransferHints;
use crate::domain::wallet::{DriverSecret, TokenSpec, Wallet, WalletAddress};
use crate::error::ConfigError;
use crate::infrastructure::config::logging::LoggingConfig;

fn default_true() -> bool {
    true
}

fn default_fanout() -> usize {
    4
}

/// Top-level fleet configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    /// Unknown chain in `chains`: error (true) or warn and skip (false).
    #[serde(default = "default_true")]
    pub fail_on_invalid_chain: bool,
    /// Wallet token missing from the chain token table: error (true) or
    /// warn and skip the token (false).
    #[serde(default = "default_true")]
    pub fail_on_invalid_tokens: bool,
    /// Default balance poll period for chains that do not override it.
    /// Absent disables polling.
    #[serde(default)]
    pub balance_poll_interval_ms: Option<u64>,
    /// Bound on concurrent per-chain operations during cross-chain fanout.
    #[serde(default = "default_fanout")]
    pub fanout_concurrency: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub price_feed: PriceFeedOptions,
    /// Per-chain configuration, keyed by chain name.
    #[serde(default)]
    pub chains: HashMap<String, ChainConfig>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            fail_on_invalid_chain: true,
            fail_on_invalid_tokens: true,
            balance_poll_interval_ms: None,
            fanout_concurrency: default_fanout(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            price_feed: PriceFeedOptions::default(),
            chains: HashMap::new(),
        }
    }
}

impl FleetConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse_toml(&raw)
    }

    /// Parses configuration from a TOML string.
    pub fn parse_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Resolves the configured chains against the supported set.
    ///
    /// Unknown names error out or are skipped with a warning, per
    /// `fail_on_invalid_chain`.
    pub fn validated_chains(&self) -> Result<Vec<(ChainName, &ChainConfig)>, ConfigError> {
        let mut chains = Vec::with_capacity(self.chains.len());
        for (name, chain_config) in &self.chains {
            match name.parse::<ChainName>() {
                Ok(chain) => chains.push((chain, chain_config)),
                Err(err) if self.fail_on_invalid_chain => return Err(err),
                Err(_) => {
                    warn!(chain = %name, "Skipping unknown chain in configuration");
                }
            }
        }
        // Deterministic construction order regardless of map iteration.
        chains.sort_by_key(|(chain, _)| *chain);
        Ok(chains)
    }

    /// Effective poll interval for one chain, honoring the per-chain
    /// schedule and the global default. `None` disables polling.
    #[must_use]
    pub fn poll_interval_for(&self, chain_config: &ChainConfig) -> Option<Duration> {
        let schedule = chain_config.wallet_balance.as_ref();
        if let Some(schedule) = schedule {
            if !schedule.enabled || !schedule.scheduled.enabled {
                return None;
            }
            if let Some(interval) = schedule.scheduled.interval_ms {
                return Some(Duration::from_millis(interval));
            }
        }
        self.balance_poll_interval_ms.map(Duration::from_millis)
    }
}

/// Configuration for one chain.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainConfig {
    /// Network label; the chain's default network when absent.
    #[serde(default)]
    pub network: Option<String>,
    /// Tokens the chain knows about; wallets may only reference these.
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    /// Managed wallets.
    #[serde(default)]
    pub wallets: Vec<WalletConfig>,
    #[serde(default)]
    pub rebalance: Option<RebalanceConfig>,
    /// Balance polling schedule for this chain.
    #[serde(default)]
    pub wallet_balance: Option<WalletBalanceConfig>,
    #[serde(default)]
    pub price_feed: Option<ChainPriceFeedConfig>,
}

impl ChainConfig {
    /// The chain key this configuration describes.
    #[must_use]
    pub fn key(&self, chain: ChainName) -> ChainKey {
        match &self.network {
            Some(network) => ChainKey::new(chain, Network::new(network.clone())),
            None => ChainKey::with_default_network(chain),
        }
    }

    /// Builds domain wallets, validating token references against the
    /// chain token table.
    pub fn build_wallets(
        &self,
        chain: ChainName,
        fail_on_invalid_tokens: bool,
    ) -> Result<Vec<Wallet>, ConfigError> {
        let mut wallets = Vec::with_capacity(self.wallets.len());
        for wallet_config in &self.wallets {
            let mut tokens = Vec::with_capacity(wallet_config.tokens.len());
            for symbol in &wallet_config.tokens {
                match self.tokens.iter().find(|t| &t.symbol == symbol) {
                    Some(token) => tokens.push(TokenSpec {
                        symbol: token.symbol.clone(),
                        token_address: token.token_address.clone(),
                        coingecko_id: token.coingecko_id.clone(),
                    }),
                    None if fail_on_invalid_tokens => {
                        return Err(ConfigError::UnknownToken {
                            chain,
                            symbol: symbol.clone(),
                        });
                    }
                    None => {
                        warn!(chain = %chain, token = %symbol, "Skipping unknown wallet token");
                    }
                }
            }
            wallets.push(Wallet {
                address: WalletAddress::new(wallet_config.address.clone()),
                tokens,
                secret: DriverSecret::new(wallet_config.secret.clone()),
            });
        }
        Ok(wallets)
    }

    /// Advisory transfer hints from the rebalance section.
    #[must_use]
    pub fn transfer_hints(&self) -> TransferHints {
        match &self.rebalance {
            Some(rebalance) => TransferHints {
                max_gas_price: rebalance.max_gas_price,
                gas_limit: rebalance.gas_limit,
            },
            None => TransferHints::default(),
        }
    }
}

/// One entry in a chain's token table.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Token symbol, e.g. `USDC`.
    pub symbol: String,
    /// Contract address for non-native tokens.
    #[serde(default)]
    pub token_address: Option<String>,
    /// Price oracle identifier.
    #[serde(default)]
    pub coingecko_id: Option<String>,
}

/// One managed wallet in configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Driver-controlled address.
    pub address: String,
    /// Symbols from the chain token table this wallet is expected to
    /// hold.
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Driver-private configuration, passed through opaquely.
    #[serde(default)]
    pub secret: String,
}

fn default_rebalance_interval_ms() -> u64 {
    300_000
}

/// Rebalance settings for one chain.
#[derive(Debug, Clone, Deserialize)]
pub struct RebalanceConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Name of a registered strategy.
    #[serde(default)]
    pub strategy: String,
    /// Period between planning cycles.
    #[serde(default = "default_rebalance_interval_ms")]
    pub interval_ms: u64,
    /// Wallets below this native balance are top-up candidates.
    #[serde(default)]
    pub min_balance_threshold: Option<Decimal>,
    /// Advisory gas price ceiling forwarded to the driver.
    #[serde(default)]
    pub max_gas_price: Option<Decimal>,
    /// Advisory gas limit forwarded to the driver.
    #[serde(default)]
    pub gas_limit: Option<u64>,
}

/// Balance polling schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletBalanceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub scheduled: ScheduledConfig,
}

/// A background schedule toggle with an optional period.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub interval_ms: Option<u64>,
}

impl Default for ScheduledConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: None,
        }
    }
}

/// Price feed mode selection: disabled, on-demand, or scheduled.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceFeedOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "disabled_schedule")]
    pub scheduled: ScheduledConfig,
}

fn disabled_schedule() -> ScheduledConfig {
    ScheduledConfig {
        enabled: false,
        interval_ms: None,
    }
}

impl Default for PriceFeedOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            scheduled: disabled_schedule(),
        }
    }
}

/// Tokens a chain contributes to the shared price feed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainPriceFeedConfig {
    /// Coingecko identifiers to keep warm.
    #[serde(default)]
    pub supported_tokens: Vec<String>,
}

/// Metrics exporter pass-through configuration.
///
/// The engine itself never serves scrapes; these values are handed to the
/// external exporter alongside the event stream.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_metrics_port() -> u16 {
    9435
}

fn default_metrics_path() -> String {
    "/metrics".into()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = FleetConfig::parse_toml("").unwrap();
        assert!(config.fail_on_invalid_chain);
        assert!(config.fail_on_invalid_tokens);
        assert!(config.balance_poll_interval_ms.is_none());
        assert_eq!(config.fanout_concurrency, 4);
        assert!(!config.metrics.enabled);
        assert!(!config.price_feed.enabled);
        assert!(config.chains.is_empty());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let config = FleetConfig::parse_toml(
            r#"
            some_future_knob = 42

            [chains.ethereum]
            another_unknown = "yes"
            "#,
        )
        .unwrap();
        assert_eq!(config.chains.len(), 1);
    }

    #[test]
    fn unknown_chain_fails_by_default() {
        let config = FleetConfig::parse_toml("[chains.dogecoin]").unwrap();
        let err = config.validated_chains().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownChain(name) if name == "dogecoin"));
    }

    #[test]
    fn unknown_chain_skipped_when_lenient() {
        let config = FleetConfig::parse_toml(
            r#"
            fail_on_invalid_chain = false

            [chains.dogecoin]
            [chains.ethereum]
            "#,
        )
        .unwrap();
        let chains = config.validated_chains().unwrap();
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].0, ChainName::Ethereum);
    }

    #[test]
    fn wallet_tokens_resolve_against_chain_table() {
        let config = FleetConfig::parse_toml(
            r#"
            [[chains.ethereum.tokens]]
            symbol = "USDC"
            token_address = "0xusdc"
            coingecko_id = "usd-coin"

            [[chains.ethereum.wallets]]
            address = "0xA"
            tokens = ["USDC"]
            "#,
        )
        .unwrap();

        let chain_config = &config.chains["ethereum"];
        let wallets = chain_config
            .build_wallets(ChainName::Ethereum, true)
            .unwrap();
        assert_eq!(wallets.len(), 1);
        assert_eq!(wallets[0].tokens[0].coingecko_id.as_deref(), Some("usd-coin"));
    }

    #[test]
    fn unknown_wallet_token_fails_or_skips() {
        let config = FleetConfig::parse_toml(
            r#"
            [[chains.ethereum.wallets]]
            address = "0xA"
            tokens = ["WAT"]
            "#,
        )
        .unwrap();
        let chain_config = &config.chains["ethereum"];

        let err = chain_config
            .build_wallets(ChainName::Ethereum, true)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownToken { symbol, .. } if symbol == "WAT"));

        let wallets = chain_config
            .build_wallets(ChainName::Ethereum, false)
            .unwrap();
        assert!(wallets[0].tokens.is_empty());
    }

    #[test]
    fn poll_interval_prefers_chain_schedule() {
        let config = FleetConfig::parse_toml(
            r#"
            balance_poll_interval_ms = 60000

            [chains.ethereum.wallet_balance.scheduled]
            interval_ms = 5000

            [chains.polygon]

            [chains.bsc.wallet_balance]
            enabled = false
            "#,
        )
        .unwrap();

        let eth = config.poll_interval_for(&config.chains["ethereum"]);
        assert_eq!(eth, Some(Duration::from_millis(5000)));

        let polygon = config.poll_interval_for(&config.chains["polygon"]);
        assert_eq!(polygon, Some(Duration::from_millis(60000)));

        let bsc = config.poll_interval_for(&config.chains["bsc"]);
        assert_eq!(bsc, None);
    }

    #[test]
    fn rebalance_section_parses_with_hints() {
        let config = FleetConfig::parse_toml(
            r#"
            [chains.ethereum.rebalance]
            enabled = true
            strategy = "threshold"
            interval_ms = 120000
            min_balance_threshold = "0.5"
            max_gas_price = "80"
            gas_limit = 21000
            "#,
        )
        .unwrap();

        let chain_config = &config.chains["ethereum"];
        let rebalance = chain_config.rebalance.as_ref().unwrap();
        assert!(rebalance.enabled);
        assert_eq!(rebalance.strategy, "threshold");
        assert_eq!(rebalance.min_balance_threshold, Some(dec!(0.5)));

        let hints = chain_config.transfer_hints();
        assert_eq!(hints.max_gas_price, Some(dec!(80)));
        assert_eq!(hints.gas_limit, Some(21000));
    }

    #[test]
    fn network_defaults_per_chain() {
        let config = FleetConfig::parse_toml(
            r#"
            [chains.solana]
            [chains.ethereum]
            network = "sepolia"
            "#,
        )
        .unwrap();

        let solana = config.chains["solana"].key(ChainName::Solana);
        assert_eq!(solana.network.as_str(), "mainnet-beta");

        let ethereum = config.chains["ethereum"].key(ChainName::Ethereum);
        assert_eq!(ethereum.network.as_str(), "sepolia");
    }
}
