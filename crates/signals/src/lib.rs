//! # Signal Engine
//!
//! The mean-reversion rule engine (spec §4.2): a per-symbol rolling price
//! buffer, the pure indicator functions it feeds, and the [`SignalEngine`]
//! that subscribes to `market.price.update` and publishes `strategy.signal`.
//!
//! This is a pure logic crate layered on `core-types`, `events`, and
//! `database` — it has no knowledge of exchanges or order execution.

pub mod buffer;
pub mod engine;
pub mod error;
pub mod indicators;

pub use buffer::{DEFAULT_CAPACITY, PriceBuffer};
pub use engine::SignalEngine;
pub use error::SignalError;
pub use indicators::{BollingerBands, bollinger, ema, rsi, sma};
