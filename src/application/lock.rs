//! Per-address exclusive wallet leases.
//!
//! The registry hands out single-process exclusive leases on wallet
//! addresses. Waiters queue FIFO per address; each release (or lease
//! expiry) wakes exactly one waiter. A short `parking_lot` critical section
//! guards the address index, so operations on distinct addresses only
//! contend on that index.
//!
//! # Architecture
//!
//! ```text
//! acquire ----> index free?  --yes--> Held(token)
//!                  |no                   |
//!                  v                     | release / lease expiry
//!             FIFO waiter --(oneshot grant)--> Held(next token)
//! ```
//!
//! Lease deadlines are serviced by one sweeper task per registry, started
//! lazily on the first leased acquire and terminated by [`LockRegistry::close`].
//! This registry makes no cross-process guarantees.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;
use tracing::debug;

use crate::domain::wallet::WalletAddress;
use crate::error::LockError;

/// Options for [`LockRegistry::acquire`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AcquireOptions {
    /// How long to wait for the address to free up. `None` waits forever.
    pub wait_timeout: Option<Duration>,
    /// Lease duration after which the registry spontaneously frees the
    /// address. `None` holds until release.
    pub lease_timeout: Option<Duration>,
}

impl AcquireOptions {
    /// Options with a bounded wait.
    #[must_use]
    pub fn wait_up_to(timeout: Duration) -> Self {
        Self {
            wait_timeout: Some(timeout),
            lease_timeout: None,
        }
    }

    /// Adds a lease deadline to these options.
    #[must_use]
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease_timeout = Some(lease);
        self
    }
}

/// Proof of holding one wallet lock.
///
/// Consumed by [`LockRegistry::release`]; a token whose lease expired is
/// rejected with [`LockError::LeaseExpired`].
#[derive(Debug)]
pub struct LeaseToken {
    address: WalletAddress,
    id: u64,
}

impl LeaseToken {
    /// The address this token holds.
    #[must_use]
    pub fn address(&self) -> &WalletAddress {
        &self.address
    }
}

struct Grant {
    id: u64,
}

struct Waiter {
    id: u64,
    lease_timeout: Option<Duration>,
    tx: oneshot::Sender<Grant>,
}

struct Held {
    token_id: u64,
    acquired_at: Instant,
    waiters: VecDeque<Waiter>,
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct Deadline {
    at: Instant,
    token_id: u64,
    address: WalletAddress,
}

#[derive(Default)]
struct Inner {
    locks: HashMap<WalletAddress, Held>,
    deadlines: BinaryHeap<Reverse<Deadline>>,
    /// Token ids whose lease expired but whose holder has not observed it
    /// yet. Reclaimed when the stale holder calls release.
    expired: HashSet<u64>,
    next_id: u64,
    closed: bool,
    sweeper_running: bool,
}

impl Inner {
    fn mint_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

struct Shared {
    inner: Mutex<Inner>,
    notify: Notify,
}

/// Single-process FIFO lock registry over wallet addresses.
///
/// Cheap to clone; all clones share one index.
#[derive(Clone)]
pub struct LockRegistry {
    shared: Arc<Shared>,
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LockRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                notify: Notify::new(),
            }),
        }
    }

    /// Acquires an exclusive lease on `address`.
    ///
    /// Blocks until the address is free or `opts.wait_timeout` elapses.
    /// Waiters are served strictly FIFO.
    ///
    /// # Errors
    ///
    /// - [`LockError::AcquireTimeout`] when the wait timeout elapses.
    /// - [`LockError::Cancelled`] when the registry is closed before or
    ///   while waiting.
    pub async fn acquire(
        &self,
        address: &WalletAddress,
        opts: AcquireOptions,
    ) -> Result<LeaseToken, LockError> {
        if opts.lease_timeout.is_some() {
            self.ensure_sweeper();
        }

        let (waiter_id, mut rx) = {
            let mut inner = self.shared.inner.lock();
            if inner.closed {
                return Err(LockError::Cancelled);
            }

            if !inner.locks.contains_key(address) {
                let id = inner.mint_id();
                let now = Instant::now();
                inner.locks.insert(
                    address.clone(),
                    Held {
                        token_id: id,
                        acquired_at: now,
                        waiters: VecDeque::new(),
                    },
                );
                if let Some(lease) = opts.lease_timeout {
                    inner.deadlines.push(Reverse(Deadline {
                        at: now + lease,
                        token_id: id,
                        address: address.clone(),
                    }));
                    self.shared.notify.notify_one();
                }
                return Ok(LeaseToken {
                    address: address.clone(),
                    id,
                });
            }

            let waiter_id = inner.mint_id();
            let (tx, rx) = oneshot::channel();
            inner
                .locks
                .get_mut(address)
                .expect("entry checked above")
                .waiters
                .push_back(Waiter {
                    id: waiter_id,
                    lease_timeout: opts.lease_timeout,
                    tx,
                });
            (waiter_id, rx)
        };

        let granted = match opts.wait_timeout {
            None => rx.await,
            Some(timeout) => match tokio::time::timeout(timeout, &mut rx).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    // Unlink ourselves. A grant sent before the unlink must
                    // not be dropped, so re-check the queue under the index
                    // lock before giving up.
                    let still_queued = {
                        let mut inner = self.shared.inner.lock();
                        match inner.locks.get_mut(address) {
                            Some(held) => {
                                let pos = held.waiters.iter().position(|w| w.id == waiter_id);
                                if let Some(pos) = pos {
                                    held.waiters.remove(pos);
                                }
                                pos.is_some()
                            }
                            None => false,
                        }
                    };
                    if still_queued {
                        return Err(LockError::AcquireTimeout(address.clone()));
                    }
                    // The grant raced the timeout; accept it rather than
                    // strand the lock.
                    match rx.try_recv() {
                        Ok(grant) => Ok(grant),
                        Err(_) => return Err(LockError::Cancelled),
                    }
                }
            },
        };

        match granted {
            Ok(grant) => Ok(LeaseToken {
                address: address.clone(),
                id: grant.id,
            }),
            // Sender dropped: the registry was closed while we waited.
            Err(_) => Err(LockError::Cancelled),
        }
    }

    /// Releases a held lease and returns how long it was held.
    ///
    /// The next FIFO waiter, if any, becomes the holder before this call
    /// returns.
    ///
    /// # Errors
    ///
    /// - [`LockError::LeaseExpired`] when the lease deadline already freed
    ///   the address.
    /// - [`LockError::NotHeld`] when the token does not hold the address.
    /// - [`LockError::Cancelled`] after [`close`](Self::close); a closed
    ///   registry is inert and emits nothing further.
    pub fn release(&self, token: LeaseToken) -> Result<Duration, LockError> {
        let mut inner = self.shared.inner.lock();
        if inner.closed {
            return Err(LockError::Cancelled);
        }
        if inner.expired.remove(&token.id) {
            return Err(LockError::LeaseExpired(token.address));
        }

        let held_for = match inner.locks.get(&token.address) {
            Some(held) if held.token_id == token.id => held.acquired_at.elapsed(),
            _ => return Err(LockError::NotHeld(token.address)),
        };

        hand_over(&mut inner, &token.address);
        self.shared.notify.notify_one();
        Ok(held_for)
    }

    /// Number of addresses currently held.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.shared.inner.lock().locks.len()
    }

    /// Whether a specific address is currently held.
    #[must_use]
    pub fn is_held(&self, address: &WalletAddress) -> bool {
        self.shared.inner.lock().locks.contains_key(address)
    }

    /// Closes the registry: every waiter fails with
    /// [`LockError::Cancelled`], subsequent acquires and releases fail the
    /// same way, and the sweeper task exits.
    pub fn close(&self) {
        let mut inner = self.shared.inner.lock();
        inner.closed = true;
        inner.deadlines.clear();
        for held in inner.locks.values_mut() {
            // Dropping the senders fails every pending receiver.
            held.waiters.clear();
        }
        // notify_one stores a permit, so the sweeper sees the close even if
        // it was mid-sweep rather than parked on notified().
        self.shared.notify.notify_one();
    }

    /// Starts the lease sweeper if it is not already running.
    fn ensure_sweeper(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.sweeper_running || inner.closed {
            return;
        }
        inner.sweeper_running = true;
        drop(inner);

        let registry = self.clone();
        tokio::spawn(async move {
            registry.sweep().await;
        });
    }

    /// Services lease deadlines until the registry closes.
    async fn sweep(self) {
        loop {
            let next_at = {
                let mut inner = self.shared.inner.lock();
                if inner.closed {
                    return;
                }
                // Expire everything due, then report the next deadline.
                let now = Instant::now();
                while let Some(Reverse(deadline)) = inner.deadlines.peek() {
                    if deadline.at > now {
                        break;
                    }
                    let Reverse(deadline) = inner.deadlines.pop().expect("peeked above");
                    expire(&mut inner, &deadline);
                }
                inner.deadlines.peek().map(|Reverse(d)| d.at)
            };

            match next_at {
                Some(at) => {
                    tokio::select! {
                        () = tokio::time::sleep_until(at) => {}
                        () = self.shared.notify.notified() => {}
                    }
                }
                None => self.shared.notify.notified().await,
            }
        }
    }
}

/// Frees `address` and grants the next live FIFO waiter, if any.
///
/// Must run under the index lock.
fn hand_over(inner: &mut Inner, address: &WalletAddress) {
    let Some(mut held) = inner.locks.remove(address) else {
        return;
    };

    while let Some(waiter) = held.waiters.pop_front() {
        let id = inner.mint_id();
        let lease_timeout = waiter.lease_timeout;
        if waiter.tx.send(Grant { id }).is_err() {
            // The waiter's future was dropped without unlinking; skip it.
            continue;
        }
        held.token_id = id;
        held.acquired_at = Instant::now();
        if let Some(lease) = lease_timeout {
            inner.deadlines.push(Reverse(Deadline {
                at: held.acquired_at + lease,
                token_id: id,
                address: address.clone(),
            }));
        }
        inner.locks.insert(address.clone(), held);
        return;
    }
    // No live waiters: the address stays free.
}

/// Handles one due lease deadline. Must run under the index lock.
fn expire(inner: &mut Inner, deadline: &Deadline) {
    let still_held = matches!(
        inner.locks.get(&deadline.address),
        Some(held) if held.token_id == deadline.token_id
    );
    if !still_held {
        // Released before the deadline fired; nothing to do.
        return;
    }
    debug!(wallet = %deadline.address, "Lease expired, freeing wallet");
    inner.expired.insert(deadline.token_id);
    hand_over(inner, &deadline.address);
}
