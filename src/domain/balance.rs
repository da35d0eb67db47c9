//! Balance observations and immutable snapshots.
//!
//! A [`BalanceSnapshot`] is the unit the poller publishes: a full mapping
//! from wallet address to observed balances, replaced wholesale after each
//! refresh and shared behind `Arc`. Readers never see a partially updated
//! table.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::wallet::WalletAddress;

/// One observed balance for one token in one wallet.
///
/// Drivers must report a stable set of (symbol, token address) pairs per
/// wallet once the first successful poll has happened; consumers may cache
/// per-token metadata on that basis. Ordering within a wallet's list is
/// not stable across refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    /// Owning wallet address.
    pub address: WalletAddress,
    /// Token symbol, e.g. `ETH`.
    pub symbol: String,
    /// Whether this is the chain's native token.
    pub is_native: bool,
    /// Contract address for non-native tokens.
    #[serde(default)]
    pub token_address: Option<String>,
    /// Exact on-chain amount in base units, as an integer string.
    ///
    /// Kept as a string so precision beyond any machine integer survives
    /// untouched.
    pub raw_balance: String,
    /// Human-scaled amount.
    pub formatted_balance: Decimal,
}

/// An immutable full snapshot of wallet balances for one chain key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    balances: HashMap<WalletAddress, Vec<WalletBalance>>,
}

impl BalanceSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Builds a snapshot from per-wallet balance lists.
    #[must_use]
    pub fn from_entries(
        entries: impl IntoIterator<Item = (WalletAddress, Vec<WalletBalance>)>,
    ) -> Self {
        Self {
            balances: entries.into_iter().collect(),
        }
    }

    /// Balances for one wallet, if the wallet has been observed.
    #[must_use]
    pub fn get(&self, address: &WalletAddress) -> Option<&[WalletBalance]> {
        self.balances.get(address).map(Vec::as_slice)
    }

    /// Iterates over all (address, balances) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&WalletAddress, &[WalletBalance])> {
        self.balances.iter().map(|(a, b)| (a, b.as_slice()))
    }

    /// All observed addresses.
    pub fn addresses(&self) -> impl Iterator<Item = &WalletAddress> {
        self.balances.keys()
    }

    /// Number of wallets in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// True when no wallet has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Inserts or replaces one wallet's balances.
    pub fn insert(&mut self, address: WalletAddress, balances: Vec<WalletBalance>) {
        self.balances.insert(address, balances);
    }

    /// Carries over prior balances for any address missing from `self`.
    ///
    /// Used for best-effort continuity: when a wallet's refresh fails, the
    /// new snapshot keeps the wallet's last known balances instead of
    /// dropping it.
    pub fn merge_missing(&mut self, prior: &BalanceSnapshot) {
        for (address, balances) in &prior.balances {
            self.balances
                .entry(address.clone())
                .or_insert_with(|| balances.clone());
        }
    }

    /// Sum of `formatted_balance` for one symbol across all wallets.
    #[must_use]
    pub fn total_for_symbol(&self, symbol: &str) -> Decimal {
        self.balances
            .values()
            .flatten()
            .filter(|b| b.symbol == symbol)
            .map(|b| b.formatted_balance)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balance(address: &str, symbol: &str, amount: Decimal) -> WalletBalance {
        WalletBalance {
            address: WalletAddress::new(address),
            symbol: symbol.into(),
            is_native: true,
            token_address: None,
            raw_balance: "0".into(),
            formatted_balance: amount,
        }
    }

    #[test]
    fn merge_missing_keeps_prior_for_absent_wallets() {
        let prior = BalanceSnapshot::from_entries([
            (WalletAddress::new("0xA"), vec![balance("0xA", "ETH", dec!(1))]),
            (WalletAddress::new("0xB"), vec![balance("0xB", "ETH", dec!(2))]),
        ]);

        let mut fresh = BalanceSnapshot::from_entries([(
            WalletAddress::new("0xA"),
            vec![balance("0xA", "ETH", dec!(3))],
        )]);
        fresh.merge_missing(&prior);

        // 0xA keeps its fresh value, 0xB carries over.
        assert_eq!(
            fresh.get(&WalletAddress::new("0xA")).unwrap()[0].formatted_balance,
            dec!(3)
        );
        assert_eq!(
            fresh.get(&WalletAddress::new("0xB")).unwrap()[0].formatted_balance,
            dec!(2)
        );
    }

    #[test]
    fn total_for_symbol_sums_across_wallets() {
        let snapshot = BalanceSnapshot::from_entries([
            (
                WalletAddress::new("0xA"),
                vec![balance("0xA", "ETH", dec!(1.5)), balance("0xA", "USDC", dec!(10))],
            ),
            (WalletAddress::new("0xB"), vec![balance("0xB", "ETH", dec!(0.5))]),
        ]);
        assert_eq!(snapshot.total_for_symbol("ETH"), dec!(2.0));
        assert_eq!(snapshot.total_for_symbol("USDC"), dec!(10));
        assert_eq!(snapshot.total_for_symbol("SOL"), Decimal::ZERO);
    }
}
