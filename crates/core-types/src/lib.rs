pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{ExitReason, OrderSide, OrderStatus, OrderType, TradeSide};
pub use error::CoreError;
pub use structs::{
    Balance, Candle, KillSwitchRecord, Order, PriceTick, RiskEvent, StrategyParams,
    StrategyRecord, Trade,
};
