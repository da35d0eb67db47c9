//! Caching wrappers over a source price feed.
//!
//! The fleet builds at most one of these and shares it across every chain
//! manager. [`OnDemandPriceFeed`] fetches lazily and remembers results for
//! a TTL; [`ScheduledPriceFeed`] warms a fixed token set in the background
//! and serves reads from its cache without ever blocking on the oracle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::application::wait_for_shutdown;
use crate::error::PriceError;
use crate::port::price::PriceFeed;

const DEFAULT_ON_DEMAND_TTL: Duration = Duration::from_secs(30);

struct CachedPrice {
    price: Decimal,
    fetched_at: Instant,
}

/// Lazy per-query price feed with TTL caching.
pub struct OnDemandPriceFeed {
    source: Arc<dyn PriceFeed>,
    ttl: Duration,
    cache: RwLock<HashMap<String, CachedPrice>>,
}

impl OnDemandPriceFeed {
    /// Wraps a source feed with the default TTL.
    #[must_use]
    pub fn new(source: Arc<dyn PriceFeed>) -> Self {
        Self::with_ttl(source, DEFAULT_ON_DEMAND_TTL)
    }

    /// Wraps a source feed with an explicit TTL.
    #[must_use]
    pub fn with_ttl(source: Arc<dyn PriceFeed>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PriceFeed for OnDemandPriceFeed {
    async fn price(&self, coingecko_id: &str) -> Result<Decimal, PriceError> {
        if let Some(cached) = self.cache.read().get(coingecko_id) {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.price);
            }
        }

        // Concurrent callers may race to refresh the same token; the last
        // write wins and both observe a fresh value.
        let price = self.source.price(coingecko_id).await?;
        self.cache.write().insert(
            coingecko_id.to_string(),
            CachedPrice {
                price,
                fetched_at: Instant::now(),
            },
        );
        Ok(price)
    }
}

/// Background-warmed price feed over a fixed token set.
///
/// Reads never touch the oracle: a token that has not been warmed yet (or
/// is outside the configured set) fails with [`PriceError::Unavailable`].
pub struct ScheduledPriceFeed {
    source: Arc<dyn PriceFeed>,
    tokens: Vec<String>,
    cache: RwLock<HashMap<String, Decimal>>,
    shutdown: watch::Sender<bool>,
}

impl ScheduledPriceFeed {
    /// Starts the background refresher and returns the shared feed.
    #[must_use]
    pub fn start(
        source: Arc<dyn PriceFeed>,
        tokens: Vec<String>,
        interval: Duration,
    ) -> Arc<Self> {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let feed = Arc::new(Self {
            source,
            tokens,
            cache: RwLock::new(HashMap::new()),
            shutdown,
        });

        tokio::spawn(refresh_loop(Arc::clone(&feed), interval, shutdown_rx));
        feed
    }

    /// Stops the background refresher. The cache keeps serving its last
    /// values.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Fetches every configured token once, keeping prior values on
    /// per-token failure.
    async fn refresh_all(&self) {
        for token in &self.tokens {
            match self.source.price(token).await {
                Ok(price) => {
                    self.cache.write().insert(token.clone(), price);
                }
                Err(err) => {
                    warn!(token = %token, error = %err, "Price refresh failed");
                }
            }
        }
    }
}

#[async_trait]
impl PriceFeed for ScheduledPriceFeed {
    async fn price(&self, coingecko_id: &str) -> Result<Decimal, PriceError> {
        self.cache
            .read()
            .get(coingecko_id)
            .copied()
            .ok_or_else(|| PriceError::Unavailable(coingecko_id.to_string()))
    }
}

async fn refresh_loop(
    feed: Arc<ScheduledPriceFeed>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(
        tokens = feed.tokens.len(),
        interval_ms = interval.as_millis() as u64,
        "Scheduled price feed started"
    );

    loop {
        tokio::select! {
            () = wait_for_shutdown(&mut shutdown) => break,
            () = feed.refresh_all() => {}
        }

        tokio::select! {
            () = wait_for_shutdown(&mut shutdown) => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    debug!("Scheduled price feed stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    struct CountingSource {
        calls: Mutex<usize>,
        price: Decimal,
    }

    #[async_trait]
    impl PriceFeed for CountingSource {
        async fn price(&self, _coingecko_id: &str) -> Result<Decimal, PriceError> {
            *self.calls.lock() += 1;
            Ok(self.price)
        }
    }

    #[tokio::test]
    async fn on_demand_caches_within_ttl() {
        let source = Arc::new(CountingSource {
            calls: Mutex::new(0),
            price: dec!(2000),
        });
        let feed = OnDemandPriceFeed::with_ttl(source.clone(), Duration::from_secs(60));

        assert_eq!(feed.price("ethereum").await.unwrap(), dec!(2000));
        assert_eq!(feed.price("ethereum").await.unwrap(), dec!(2000));
        assert_eq!(*source.calls.lock(), 1);
    }

    #[tokio::test]
    async fn on_demand_refetches_after_ttl() {
        let source = Arc::new(CountingSource {
            calls: Mutex::new(0),
            price: dec!(1),
        });
        let feed = OnDemandPriceFeed::with_ttl(source.clone(), Duration::from_millis(10));

        feed.price("ethereum").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        feed.price("ethereum").await.unwrap();
        assert_eq!(*source.calls.lock(), 2);
    }

    #[tokio::test]
    async fn scheduled_serves_cache_only() {
        let source = Arc::new(CountingSource {
            calls: Mutex::new(0),
            price: dec!(3),
        });
        let feed = ScheduledPriceFeed::start(
            source,
            vec!["ethereum".into()],
            Duration::from_secs(3600),
        );

        // Give the warm pass a moment to land.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(feed.price("ethereum").await.unwrap(), dec!(3));

        // Unwarmed tokens never fall through to the oracle.
        assert!(matches!(
            feed.price("bitcoin").await.unwrap_err(),
            PriceError::Unavailable(_)
        ));
        feed.stop();
    }
}
