//! Error types for the wallet fleet engine.
//!
//! Errors are grouped by kind: configuration problems surface at
//! construction, driver problems surface per wallet or per transfer, lock
//! problems surface to the caller that touched the registry, and fleet
//! problems surface from orchestrator-level operations. Background tasks
//! never propagate errors upward; they emit
//! [`Event::ChainError`](crate::port::event::Event) and keep running.

use thiserror::Error;

use crate::domain::chain::ChainName;
use crate::domain::wallet::WalletAddress;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configured chain name is not in the supported set.
    #[error("unknown chain: {0}")]
    UnknownChain(String),

    /// A wallet references a token the chain does not define.
    #[error("unknown token {symbol} on chain {chain}")]
    UnknownToken {
        /// Chain the wallet belongs to.
        chain: ChainName,
        /// The unrecognized token symbol.
        symbol: String,
    },

    /// A required field is missing.
    #[error("missing required config field: {field}")]
    MissingField {
        /// Dotted path of the missing field.
        field: &'static str,
    },

    /// A field has an invalid value.
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// No driver was supplied for a configured chain.
    #[error("no wallet driver registered for chain {0}")]
    MissingDriver(ChainName),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Errors surfaced by wallet drivers.
///
/// Drivers translate their chain-specific failures into these variants;
/// the engine treats them as opaque beyond the discriminant.
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    /// The remote RPC endpoint failed or timed out.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The source wallet cannot cover the requested transfer.
    ///
    /// Drivers re-check sufficiency at execution time; a balance observed
    /// at plan time may no longer hold.
    #[error("insufficient funds in {address} for {amount} {token}")]
    InsufficientFunds {
        /// Source wallet.
        address: WalletAddress,
        /// Requested amount (human-scaled).
        amount: rust_decimal::Decimal,
        /// Token symbol.
        token: String,
    },

    /// The transfer would exceed the advisory gas bounds.
    #[error("gas constraints exceeded: {0}")]
    GasExceeded(String),
}

/// Errors from price feed lookups.
#[derive(Error, Debug, Clone)]
pub enum PriceError {
    /// No price is available for the token.
    #[error("price unavailable for {0}")]
    Unavailable(String),

    /// The price feed is not enabled.
    #[error("price feed disabled")]
    Disabled,

    /// The underlying oracle failed.
    #[error("price feed error: {0}")]
    Feed(String),
}

/// Errors from the wallet lock registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The wait-to-acquire timeout elapsed before the address freed up.
    #[error("timed out waiting to lock {0}")]
    AcquireTimeout(WalletAddress),

    /// Release was called with a token that does not hold the address.
    #[error("wallet {0} is not held by this token")]
    NotHeld(WalletAddress),

    /// The lease deadline passed and the registry already freed the address.
    #[error("lease on {0} expired before release")]
    LeaseExpired(WalletAddress),

    /// The registry was closed while waiting, or acquire was called after
    /// shutdown.
    #[error("lock registry closed")]
    Cancelled,
}

/// Errors from orchestrator-level operations.
#[derive(Error, Debug)]
pub enum FleetError {
    /// The chain is not in the manager map.
    #[error("chain {0} is not managed by this fleet")]
    UnknownChain(ChainName),

    /// The address is not a configured wallet on the chain.
    #[error("wallet {address} is not configured on chain {chain}")]
    UnknownWallet {
        /// Chain that was queried.
        chain: ChainName,
        /// The unconfigured address.
        address: WalletAddress,
    },

    /// A stopped manager cannot be started or queried for fresh data.
    #[error("chain manager for {0} is stopped")]
    ManagerStopped(ChainName),

    /// A per-chain operation failed during fanout, wrapped with its chain.
    #[error("operation failed on chain {chain}: {source}")]
    Chain {
        /// Chain the operation ran against.
        chain: ChainName,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// Block-height aggregation failed for a chain; the batch is aborted.
    #[error("block height unavailable for chain {chain}: {source}")]
    BlockHeightUnavailable {
        /// Chain whose driver failed.
        chain: ChainName,
        /// The underlying driver failure.
        #[source]
        source: DriverError,
    },
}

/// Top-level error type aggregating all failure kinds.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Price(#[from] PriceError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Fleet(#[from] FleetError),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
