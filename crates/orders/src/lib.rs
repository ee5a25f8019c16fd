//! # Order Manager
//!
//! Consumes `strategy.signal` as the sole member of its queue group, runs
//! every signal through the risk gate, and owns the durable, idempotent
//! lifecycle of orders and the trades derived from them (spec §4.4).

pub mod error;
pub mod idempotency;
pub mod manager;

pub use error::OrderError;
pub use idempotency::client_order_id;
pub use manager::OrderManager;
