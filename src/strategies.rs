//! Built-in rebalance strategies.
//!
//! Custom strategies come in through the
//! [`StrategyRegistry`](crate::port::strategy::StrategyRegistry); the one
//! strategy shipped here covers the common case of keeping every wallet's
//! native balance above a floor.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::balance::BalanceSnapshot;
use crate::domain::rebalance::RebalanceInstruction;
use crate::domain::wallet::WalletAddress;
use crate::port::price::PriceFeed;
use crate::port::strategy::RebalanceStrategy;

/// Tops up wallets whose native balance sits below a threshold, funding
/// them from the richest wallet.
///
/// Donors are never drained below the threshold themselves. Each native
/// symbol in the snapshot is balanced independently.
pub struct ThresholdStrategy {
    threshold: Decimal,
}

impl ThresholdStrategy {
    /// Name the strategy registers under.
    pub const NAME: &'static str = "threshold";

    /// Creates a strategy with the given native-balance floor.
    #[must_use]
    pub fn new(threshold: Decimal) -> Self {
        Self { threshold }
    }
}

#[async_trait]
impl RebalanceStrategy for ThresholdStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn plan(
        &self,
        balances: &BalanceSnapshot,
        _prices: Option<&dyn PriceFeed>,
    ) -> Vec<RebalanceInstruction> {
        let mut native: Vec<(WalletAddress, String, Decimal)> = balances
            .iter()
            .flat_map(|(address, list)| {
                list.iter().filter(|b| b.is_native).map(move |b| {
                    (address.clone(), b.symbol.clone(), b.formatted_balance)
                })
            })
            .collect();
        // Deterministic plans regardless of snapshot map order.
        native.sort_by(|a, b| (&a.1, &a.0).cmp(&(&b.1, &b.0)));

        let mut symbols: Vec<&str> = native.iter().map(|(_, s, _)| s.as_str()).collect();
        symbols.dedup();
        let symbols: Vec<String> = symbols.into_iter().map(String::from).collect();

        let mut instructions = Vec::new();
        for symbol in symbols {
            let entries: Vec<_> = native
                .iter()
                .filter(|(_, s, _)| s == &symbol)
                .cloned()
                .collect();

            let Some((donor, _, donor_balance)) = entries
                .iter()
                .max_by(|a, b| a.2.cmp(&b.2).then_with(|| b.0.cmp(&a.0)))
                .cloned()
            else {
                continue;
            };

            let mut spare = donor_balance - self.threshold;
            for (address, _, balance) in &entries {
                if spare <= Decimal::ZERO {
                    break;
                }
                if address == &donor || *balance >= self.threshold {
                    continue;
                }
                let amount = (self.threshold - balance).min(spare);
                spare -= amount;
                instructions.push(RebalanceInstruction {
                    source: donor.clone(),
                    target: address.clone(),
                    amount,
                    token: symbol.clone(),
                });
            }
        }
        instructions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::balance::WalletBalance;
    use rust_decimal_macros::dec;

    fn native(address: &str, symbol: &str, amount: Decimal) -> (WalletAddress, Vec<WalletBalance>) {
        (
            WalletAddress::new(address),
            vec![WalletBalance {
                address: WalletAddress::new(address),
                symbol: symbol.into(),
                is_native: true,
                token_address: None,
                raw_balance: "0".into(),
                formatted_balance: amount,
            }],
        )
    }

    #[tokio::test]
    async fn tops_up_poor_wallets_from_richest() {
        let snapshot = BalanceSnapshot::from_entries([
            native("0xA", "ETH", dec!(10)),
            native("0xB", "ETH", dec!(0.2)),
            native("0xC", "ETH", dec!(0.9)),
        ]);

        let strategy = ThresholdStrategy::new(dec!(1));
        let plan = strategy.plan(&snapshot, None).await;

        assert_eq!(plan.len(), 2);
        for instruction in &plan {
            assert_eq!(instruction.source, WalletAddress::new("0xA"));
            assert_eq!(instruction.token, "ETH");
        }
        let total: Decimal = plan.iter().map(|i| i.amount).sum();
        // 0xB needs 0.8, 0xC needs 0.1.
        assert_eq!(total, dec!(0.9));
    }

    #[tokio::test]
    async fn donor_is_never_drained_below_threshold() {
        let snapshot = BalanceSnapshot::from_entries([
            native("0xA", "ETH", dec!(1.3)),
            native("0xB", "ETH", dec!(0.1)),
            native("0xC", "ETH", dec!(0.1)),
        ]);

        let strategy = ThresholdStrategy::new(dec!(1));
        let plan = strategy.plan(&snapshot, None).await;

        let total: Decimal = plan.iter().map(|i| i.amount).sum();
        assert!(total <= dec!(0.3));
    }

    #[tokio::test]
    async fn balanced_fleet_plans_nothing() {
        let snapshot = BalanceSnapshot::from_entries([
            native("0xA", "ETH", dec!(2)),
            native("0xB", "ETH", dec!(3)),
        ]);

        let strategy = ThresholdStrategy::new(dec!(1));
        assert!(strategy.plan(&snapshot, None).await.is_empty());
    }

    #[tokio::test]
    async fn symbols_are_balanced_independently() {
        let snapshot = BalanceSnapshot::from_entries([
            native("0xA", "ETH", dec!(5)),
            native("0xSol1", "SOL", dec!(50)),
            native("0xSol2", "SOL", dec!(0.5)),
        ]);

        let strategy = ThresholdStrategy::new(dec!(1));
        let plan = strategy.plan(&snapshot, None).await;

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].token, "SOL");
        assert_eq!(plan[0].target, WalletAddress::new("0xSol2"));
        assert_eq!(plan[0].amount, dec!(0.5));
    }
}
