//! Capability traits at the engine's seams.
//!
//! Concrete wallet drivers, price oracles, rebalance strategies, and event
//! consumers live outside this crate; these modules define the contracts
//! they plug into.

pub mod driver;
pub mod event;
pub mod price;
pub mod strategy;

pub use driver::WalletDriver;
pub use event::{Emitter, Event, EventBus, EventSink, LogSink};
pub use price::PriceFeed;
pub use strategy::{RebalanceStrategy, StrategyRegistry};
