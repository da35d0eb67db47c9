//! Static price feed for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::error::PriceError;
use crate::port::price::PriceFeed;

/// Price feed answering from a fixed table.
///
/// Unlisted tokens fail with [`PriceError::Unavailable`]; the call counter
/// supports caching assertions.
#[derive(Default)]
pub struct StaticPriceFeed {
    prices: Mutex<HashMap<String, Decimal>>,
    calls: AtomicU32,
}

impl StaticPriceFeed {
    /// An empty feed; every lookup fails.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fixed price.
    #[must_use]
    pub fn with_price(self, coingecko_id: &str, price: Decimal) -> Self {
        self.prices.lock().insert(coingecko_id.into(), price);
        self
    }

    /// Replaces a price mid-test.
    pub fn set_price(&self, coingecko_id: &str, price: Decimal) {
        self.prices.lock().insert(coingecko_id.into(), price);
    }

    /// Number of lookups served (hits and misses).
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceFeed for StaticPriceFeed {
    async fn price(&self, coingecko_id: &str) -> Result<Decimal, PriceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prices
            .lock()
            .get(coingecko_id)
            .copied()
            .ok_or_else(|| PriceError::Unavailable(coingecko_id.to_string()))
    }
}
