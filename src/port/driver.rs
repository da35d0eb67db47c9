//! Wallet driver port.
//!
//! A driver is the per-chain capability object that talks to the outside
//! world: it queries balances, broadcasts transfers, and reports block
//! height. Drivers own signing and RPC plumbing; the engine only sequences
//! their calls.

use async_trait::async_trait;

use crate::domain::balance::WalletBalance;
use crate::domain::rebalance::{RebalanceInstruction, TransferHints, TransferReceipt};
use crate::domain::wallet::Wallet;
use crate::error::DriverError;

/// Per-chain wallet capability consumed by the engine.
///
/// Every method may suspend arbitrarily long on remote I/O. Implementations
/// must be safe to call concurrently from many tasks.
#[async_trait]
pub trait WalletDriver: Send + Sync {
    /// Queries current balances for each wallet.
    ///
    /// Returns one result per input wallet, in input order, so a single
    /// failing wallet does not poison the batch.
    async fn pull_balances(
        &self,
        wallets: &[Wallet],
    ) -> Vec<Result<Vec<WalletBalance>, DriverError>>;

    /// Queries balances as of a specific block height.
    ///
    /// Unlike [`pull_balances`](Self::pull_balances) this fails the whole
    /// call: historical queries are all-or-nothing.
    async fn pull_balances_at_height(
        &self,
        wallets: &[Wallet],
        height: u64,
    ) -> Result<Vec<WalletBalance>, DriverError>;

    /// Signs and broadcasts one transfer.
    ///
    /// The driver must re-check balance sufficiency at execution time and
    /// fail with [`DriverError::InsufficientFunds`] rather than overdraw;
    /// the planning snapshot may be stale by the time this runs.
    async fn transfer(
        &self,
        instruction: &RebalanceInstruction,
        hints: &TransferHints,
    ) -> Result<TransferReceipt, DriverError>;

    /// Current block height of the chain.
    async fn block_height(&self) -> Result<u64, DriverError>;
}
