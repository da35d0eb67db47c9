//! Chain identity types.
//!
//! A [`ChainName`] is drawn from the closed set of chains this engine knows
//! how to manage. A [`Network`] scopes a chain to one of its deployments
//! (mainnet, a testnet, ...). Together they form a [`ChainKey`], the
//! identity of one managed domain: every chain wallet manager owns exactly
//! one key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A blockchain supported by the engine.
///
/// The set is closed at compile time; configuration referencing any other
/// name is rejected (or skipped, depending on `fail_on_invalid_chain`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainName {
    Ethereum,
    Polygon,
    Bsc,
    Avalanche,
    Solana,
}

impl ChainName {
    /// Every supported chain, in declaration order.
    pub const ALL: [ChainName; 5] = [
        ChainName::Ethereum,
        ChainName::Polygon,
        ChainName::Bsc,
        ChainName::Avalanche,
        ChainName::Solana,
    ];

    /// Canonical lowercase name used in configuration and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ChainName::Ethereum => "ethereum",
            ChainName::Polygon => "polygon",
            ChainName::Bsc => "bsc",
            ChainName::Avalanche => "avalanche",
            ChainName::Solana => "solana",
        }
    }

    /// Default network for the chain when configuration omits one.
    #[must_use]
    pub fn default_network(&self) -> Network {
        match self {
            ChainName::Solana => Network::new("mainnet-beta"),
            _ => Network::new("mainnet"),
        }
    }
}

impl fmt::Display for ChainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChainName::ALL
            .into_iter()
            .find(|chain| chain.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownChain(s.to_string()))
    }
}

/// A chain-scoped network label.
///
/// The engine treats the value as opaque; drivers interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Network(String);

impl Network {
    /// Creates a network label from a string value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Network {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The (chain, network) pair identifying one managed domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainKey {
    /// The chain.
    pub chain: ChainName,
    /// The network deployment of the chain.
    pub network: Network,
}

impl ChainKey {
    /// Creates a key for a chain on an explicit network.
    pub fn new(chain: ChainName, network: Network) -> Self {
        Self { chain, network }
    }

    /// Creates a key for a chain on its default network.
    #[must_use]
    pub fn with_default_network(chain: ChainName) -> Self {
        Self {
            network: chain.default_network(),
            chain,
        }
    }
}

impl fmt::Display for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_supported_chain() {
        for chain in ChainName::ALL {
            let parsed: ChainName = chain.as_str().parse().unwrap();
            assert_eq!(parsed, chain);
        }
    }

    #[test]
    fn rejects_unknown_chain() {
        let err = "dogecoin".parse::<ChainName>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownChain(name) if name == "dogecoin"));
    }

    #[test]
    fn solana_defaults_to_mainnet_beta() {
        assert_eq!(ChainName::Solana.default_network().as_str(), "mainnet-beta");
        assert_eq!(ChainName::Ethereum.default_network().as_str(), "mainnet");
    }

    #[test]
    fn chain_key_display_is_colon_separated() {
        let key = ChainKey::new(ChainName::Polygon, Network::new("amoy"));
        assert_eq!(key.to_string(), "polygon:amoy");
    }
}
