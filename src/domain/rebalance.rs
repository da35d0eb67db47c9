//! Rebalance instructions and transfer outcomes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::wallet::WalletAddress;

/// One source-to-target transfer proposed by a strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceInstruction {
    /// Wallet the funds leave.
    pub source: WalletAddress,
    /// Wallet the funds arrive at.
    pub target: WalletAddress,
    /// Human-scaled amount to move.
    pub amount: Decimal,
    /// Token symbol to move.
    pub token: String,
}

/// Advisory execution hints passed through to the driver.
///
/// Drivers may ignore hints they cannot honor; exceeding them is grounds
/// for failing the transfer with
/// [`DriverError::GasExceeded`](crate::error::DriverError).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferHints {
    /// Upper bound on acceptable gas price, in the driver's native unit.
    #[serde(default)]
    pub max_gas_price: Option<Decimal>,
    /// Gas limit for the transfer transaction.
    #[serde(default)]
    pub gas_limit: Option<u64>,
}

/// Driver-opaque outcome of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Driver-controlled identifier (transaction hash or equivalent).
    pub id: String,
    /// The instruction this receipt settles.
    pub instruction: RebalanceInstruction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn hints_default_to_unbounded() {
        let hints = TransferHints::default();
        assert!(hints.max_gas_price.is_none());
        assert!(hints.gas_limit.is_none());
    }

    #[test]
    fn receipt_carries_its_instruction() {
        let instruction = RebalanceInstruction {
            source: WalletAddress::new("0xA"),
            target: WalletAddress::new("0xB"),
            amount: dec!(1.25),
            token: "ETH".into(),
        };
        let receipt = TransferReceipt {
            id: "0xhash".into(),
            instruction: instruction.clone(),
        };
        assert_eq!(receipt.instruction, instruction);
    }
}
