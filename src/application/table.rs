//! Versioned balance table.
//!
//! One table per chain manager. The poller (or a caller-forced refresh) is
//! the only writer; readers take the current `Arc` snapshot without
//! blocking the writer. The version counter lets concurrent
//! `pull_balances` callers detect that another caller's refresh already
//! landed.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::balance::BalanceSnapshot;

struct TableState {
    snapshot: Arc<BalanceSnapshot>,
    version: u64,
}

/// Atomically replaceable snapshot holder.
pub struct BalanceTable {
    state: RwLock<TableState>,
}

impl Default for BalanceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BalanceTable {
    /// Creates a table holding an empty snapshot at version zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TableState {
                snapshot: BalanceSnapshot::empty(),
                version: 0,
            }),
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<BalanceSnapshot> {
        Arc::clone(&self.state.read().snapshot)
    }

    /// The current version. Bumped once per publish.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Publishes a new snapshot, returning the one it replaced.
    ///
    /// Single-writer discipline is enforced by the manager; this method
    /// itself only guarantees the swap is atomic for readers.
    pub fn publish(&self, snapshot: Arc<BalanceSnapshot>) -> Arc<BalanceSnapshot> {
        let mut state = self.state.write();
        state.version += 1;
        std::mem::replace(&mut state.snapshot, snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::wallet::WalletAddress;

    #[test]
    fn publish_bumps_version_and_returns_previous() {
        let table = BalanceTable::new();
        assert_eq!(table.version(), 0);
        assert!(table.snapshot().is_empty());

        let first = Arc::new(BalanceSnapshot::from_entries([(
            WalletAddress::new("0xA"),
            vec![],
        )]));
        let previous = table.publish(Arc::clone(&first));
        assert!(previous.is_empty());
        assert_eq!(table.version(), 1);
        assert_eq!(table.snapshot().len(), 1);

        let second = BalanceSnapshot::empty();
        let previous = table.publish(second);
        assert_eq!(previous.len(), 1);
        assert_eq!(table.version(), 2);
    }
}
