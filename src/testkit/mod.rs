//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`driver`] — [`ScriptedDriver`], a fully scripted
//!   [`WalletDriver`](crate::port::driver::WalletDriver).
//! - [`price`] — [`StaticPriceFeed`] with fixed prices per token.
//! - [`sink`] — [`RecordingSink`] capturing every emitted event.
//! - [`strategy`] — [`ScriptedStrategy`] replaying preset instruction
//!   batches.
//! - [`domain`] — builders for balances and wallets.

pub mod domain;
pub mod driver;
pub mod price;
pub mod sink;
pub mod strategy;

pub use domain::{native_balance, token_balance, wallet};
pub use driver::ScriptedDriver;
pub use price::StaticPriceFeed;
pub use sink::RecordingSink;
pub use strategy::ScriptedStrategy;
