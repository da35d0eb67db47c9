//! Scripted [`WalletDriver`] for tests.
//!
//! Each wallet has an optional one-shot queue of refresh results plus a
//! standing fallback; transfers and block heights pop scripted results and
//! fall back to generated receipts / the last height. Counters and the
//! executed-transfer log support assertions about driver traffic.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::balance::WalletBalance;
use crate::domain::rebalance::{RebalanceInstruction, TransferHints, TransferReceipt};
use crate::domain::wallet::{Wallet, WalletAddress};
use crate::error::DriverError;
use crate::port::driver::WalletDriver;

type BalanceResult = Result<Vec<WalletBalance>, DriverError>;

#[derive(Default)]
struct DriverState {
    scripted: HashMap<WalletAddress, VecDeque<BalanceResult>>,
    fallback: HashMap<WalletAddress, BalanceResult>,
    transfers: VecDeque<Result<(), DriverError>>,
    executed: Vec<RebalanceInstruction>,
    heights: VecDeque<Result<u64, DriverError>>,
    last_height: u64,
}

/// Fully scripted wallet driver.
#[derive(Default)]
pub struct ScriptedDriver {
    state: Mutex<DriverState>,
    pull_count: AtomicU32,
    transfer_count: AtomicU32,
    delay: Option<Duration>,
}

impl ScriptedDriver {
    /// A driver that answers every wallet with an empty balance list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every driver call, for cancellation and pile-up tests.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the standing refresh result for one wallet.
    #[must_use]
    pub fn with_balances(self, address: &str, balances: Vec<WalletBalance>) -> Self {
        self.state
            .lock()
            .fallback
            .insert(WalletAddress::new(address), Ok(balances));
        self
    }

    /// Makes every refresh of one wallet fail.
    #[must_use]
    pub fn with_balance_error(self, address: &str, error: DriverError) -> Self {
        self.state
            .lock()
            .fallback
            .insert(WalletAddress::new(address), Err(error));
        self
    }

    /// Queues a one-shot refresh result for one wallet, consumed before
    /// the standing fallback.
    pub fn push_balances(&self, address: &str, result: BalanceResult) {
        self.state
            .lock()
            .scripted
            .entry(WalletAddress::new(address))
            .or_default()
            .push_back(result);
    }

    /// Queues transfer outcomes; exhausted queues succeed with generated
    /// receipts.
    #[must_use]
    pub fn with_transfer_results(self, results: Vec<Result<(), DriverError>>) -> Self {
        self.state.lock().transfers = results.into();
        self
    }

    /// Sets the standing block height.
    #[must_use]
    pub fn with_height(self, height: u64) -> Self {
        self.state.lock().last_height = height;
        self
    }

    /// Queues one-shot block height results.
    #[must_use]
    pub fn with_height_results(self, results: Vec<Result<u64, DriverError>>) -> Self {
        self.state.lock().heights = results.into();
        self
    }

    /// Number of `pull_balances` batches served.
    #[must_use]
    pub fn pull_count(&self) -> u32 {
        self.pull_count.load(Ordering::SeqCst)
    }

    /// Number of transfers attempted.
    #[must_use]
    pub fn transfer_count(&self) -> u32 {
        self.transfer_count.load(Ordering::SeqCst)
    }

    /// Instructions that reached the driver, in order.
    #[must_use]
    pub fn executed_transfers(&self) -> Vec<RebalanceInstruction> {
        self.state.lock().executed.clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn result_for(&self, address: &WalletAddress) -> BalanceResult {
        let mut state = self.state.lock();
        if let Some(queue) = state.scripted.get_mut(address) {
            if let Some(result) = queue.pop_front() {
                return result;
            }
        }
        state
            .fallback
            .get(address)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[async_trait]
impl WalletDriver for ScriptedDriver {
    async fn pull_balances(&self, wallets: &[Wallet]) -> Vec<BalanceResult> {
        self.pause().await;
        self.pull_count.fetch_add(1, Ordering::SeqCst);
        wallets.iter().map(|w| self.result_for(&w.address)).collect()
    }

    async fn pull_balances_at_height(
        &self,
        wallets: &[Wallet],
        _height: u64,
    ) -> Result<Vec<WalletBalance>, DriverError> {
        self.pause().await;
        let mut balances = Vec::new();
        for wallet in wallets {
            balances.extend(self.result_for(&wallet.address)?);
        }
        Ok(balances)
    }

    async fn transfer(
        &self,
        instruction: &RebalanceInstruction,
        _hints: &TransferHints,
    ) -> Result<TransferReceipt, DriverError> {
        self.pause().await;
        let count = self.transfer_count.fetch_add(1, Ordering::SeqCst) + 1;

        let mut state = self.state.lock();
        state.executed.push(instruction.clone());
        match state.transfers.pop_front() {
            Some(Err(error)) => Err(error),
            _ => Ok(TransferReceipt {
                id: format!("tx-{count}"),
                instruction: instruction.clone(),
            }),
        }
    }

    async fn block_height(&self) -> Result<u64, DriverError> {
        self.pause().await;
        let mut state = self.state.lock();
        match state.heights.pop_front() {
            Some(result) => {
                if let Ok(height) = &result {
                    state.last_height = *height;
                }
                result
            }
            None => Ok(state.last_height),
        }
    }
}
