//! Price feed port.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::PriceError;
use crate::infrastructure::config::settings::FleetConfig;

/// Token price lookup in a common numeraire (USD).
///
/// Implementations choose their own caching policy; the engine ships two
/// wrappers (on-demand and scheduled) in
/// [`application::price`](crate::application::price).
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Price of one token, keyed by its coingecko identifier.
    async fn price(&self, coingecko_id: &str) -> Result<Decimal, PriceError>;
}

/// Derives the set of tokens a shared price feed should warm.
///
/// The set is the union of every chain's `price_feed.supported_tokens`,
/// deduplicated, in first-seen order.
#[must_use]
pub fn prepare_price_feed_config(config: &FleetConfig) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut tokens = Vec::new();
    for chain in config.chains.values() {
        let Some(price_feed) = &chain.price_feed else {
            continue;
        };
        for token in &price_feed.supported_tokens {
            if seen.insert(token.clone()) {
                tokens.push(token.clone());
            }
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::settings::FleetConfig;

    #[test]
    fn unions_supported_tokens_across_chains() {
        let config = FleetConfig::parse_toml(
            r#"
            [chains.ethereum.price_feed]
            supported_tokens = ["ethereum", "usd-coin"]

            [chains.polygon.price_feed]
            supported_tokens = ["matic-network", "usd-coin"]
            "#,
        )
        .unwrap();

        let mut tokens = prepare_price_feed_config(&config);
        tokens.sort();
        assert_eq!(tokens, vec!["ethereum", "matic-network", "usd-coin"]);
    }

    #[test]
    fn empty_when_no_chain_configures_a_feed() {
        let config = FleetConfig::parse_toml("[chains.ethereum]").unwrap();
        assert!(prepare_price_feed_config(&config).is_empty());
    }
}
