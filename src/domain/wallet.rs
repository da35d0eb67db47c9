//! Wallet identity and configuration types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A driver-controlled wallet address.
///
/// The engine never parses the value; it is unique within a
/// [`ChainKey`](crate::domain::chain::ChainKey) and used as the key for
/// balances and locks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Creates an address from a string value.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WalletAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for WalletAddress {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// A token a wallet is expected to hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpec {
    /// Token symbol, e.g. `USDC`.
    pub symbol: String,
    /// Contract address for non-native tokens.
    #[serde(default)]
    pub token_address: Option<String>,
    /// Identifier used by price oracles.
    #[serde(default)]
    pub coingecko_id: Option<String>,
}

impl TokenSpec {
    /// Creates a spec for a native token (no contract address).
    pub fn native(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            token_address: None,
            coingecko_id: None,
        }
    }
}

/// One managed wallet.
#[derive(Debug, Clone)]
pub struct Wallet {
    /// Driver-controlled address, unique within the owning chain key.
    pub address: WalletAddress,
    /// Tokens the wallet is expected to hold.
    pub tokens: Vec<TokenSpec>,
    /// Driver-private configuration (key material reference, derivation
    /// path, ...). Opaque to the engine.
    pub secret: DriverSecret,
}

impl Wallet {
    /// Creates a wallet with no expected tokens and an empty secret.
    pub fn new(address: impl Into<WalletAddress>) -> Self {
        Self {
            address: address.into(),
            tokens: Vec::new(),
            secret: DriverSecret::default(),
        }
    }

    /// Adds an expected token.
    #[must_use]
    pub fn with_token(mut self, token: TokenSpec) -> Self {
        self.tokens.push(token);
        self
    }
}

/// Opaque driver-private wallet configuration.
///
/// Deliberately excluded from `Debug` output so key material references
/// never reach logs.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DriverSecret(String);

impl DriverSecret {
    /// Wraps a driver-private value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Exposes the value to a driver.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DriverSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DriverSecret(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_debug_is_redacted() {
        let wallet = Wallet {
            address: WalletAddress::new("0xA"),
            tokens: vec![],
            secret: DriverSecret::new("m/44'/60'/0'/0/0"),
        };
        let rendered = format!("{wallet:?}");
        assert!(!rendered.contains("m/44'"));
        assert!(rendered.contains("DriverSecret(..)"));
    }

    #[test]
    fn with_token_appends() {
        let wallet = Wallet::new("0xA")
            .with_token(TokenSpec::native("ETH"))
            .with_token(TokenSpec {
                symbol: "USDC".into(),
                token_address: Some("0xusdc".into()),
                coingecko_id: Some("usd-coin".into()),
            });
        assert_eq!(wallet.tokens.len(), 2);
        assert_eq!(wallet.tokens[1].symbol, "USDC");
    }
}
