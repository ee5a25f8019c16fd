//! Bus subject names (spec §6). Broadcast subjects are consumed by every
//! subscriber independently; [`STRATEGY_SIGNAL`] is the one queue-group
//! subject in the system — every emitted signal must be processed by exactly
//! one order-manager instance (spec §5).

pub const MARKET_PRICE_UPDATE: &str = "market.price.update";

pub const STRATEGY_SIGNAL: &str = "strategy.signal";

pub const ORDER_PLACED: &str = "order.placed";
pub const ORDER_FILLED: &str = "order.filled";
pub const ORDER_CANCELLED: &str = "order.cancelled";
pub const ORDER_FAILED: &str = "order.failed";

pub const TRADE_OPENED: &str = "trade.opened";
pub const TRADE_CLOSED: &str = "trade.closed";

pub const RISK_VIOLATION: &str = "risk.violation";
pub const RISK_KILL_SWITCH: &str = "risk.kill_switch";
