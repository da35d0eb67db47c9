//! Core domain types, independent of any driver or runtime concern.

pub mod balance;
pub mod chain;
pub mod rebalance;
pub mod wallet;

pub use balance::{BalanceSnapshot, WalletBalance};
pub use chain::{ChainKey, ChainName, Network};
pub use rebalance::{RebalanceInstruction, TransferHints, TransferReceipt};
pub use wallet::{TokenSpec, Wallet, WalletAddress};
