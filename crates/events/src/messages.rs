use chrono::{DateTime, Utc};
use core_types::{ExitReason, OrderSide, OrderStatus, OrderType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload of `market.price.update` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdatePayload {
    pub exchange: String,
    pub symbol: String,
    pub price: Decimal,
    pub volume: Decimal,
    pub time: DateTime<Utc>,
}

/// The indicator values a signal decision was made from, carried for audit
/// and for the determinism tests in spec §8.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub price: Decimal,
    pub sma: Decimal,
    pub rsi: Decimal,
    pub upper_bb: Decimal,
    pub middle_bb: Decimal,
    pub lower_bb: Decimal,
}

/// Payload of `strategy.signal` (spec §4.2, §6). Produced both by the signal
/// engine's entry/exit rules and by the risk gate's periodic max-hold-time
/// supervisor (spec §4.3) — in the latter case `reason` and `exit_reason`
/// distinguish it from an ordinary strategy-driven exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalPayload {
    pub id: Uuid,
    pub strategy: String,
    pub symbol: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub stop_loss_price: Option<Decimal>,
    pub reason: String,
    /// Set when this signal is a close signal driven by the risk gate rather
    /// than an ordinary strategy-driven exit (see SPEC_FULL §4.3).
    pub exit_reason: Option<ExitReason>,
    pub indicators: Option<IndicatorSnapshot>,
}

/// Payload shared by `order.placed` / `order.filled` / `order.cancelled` / `order.failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEventPayload {
    pub order_id: Uuid,
    pub client_order_id: String,
    pub exchange_order_id: Option<String>,
    pub strategy: String,
    pub symbol: String,
    pub side: OrderSide,
    pub status: OrderStatus,
    pub quantity: Decimal,
    pub filled_quantity: Decimal,
    pub average_fill_price: Option<Decimal>,
    pub fees: Decimal,
}

/// Payload shared by `trade.opened` / `trade.closed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEventPayload {
    pub trade_id: Uuid,
    pub strategy: String,
    pub symbol: String,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub exit_price: Option<Decimal>,
    pub pnl: Option<Decimal>,
    pub pnl_percent: Option<Decimal>,
    pub exit_reason: Option<ExitReason>,
}

/// Payload of `risk.violation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskViolationPayload {
    pub strategy: Option<String>,
    pub violation_type: String,
    pub description: String,
    pub action_taken: String,
}

/// Payload of `risk.kill_switch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillSwitchPayload {
    pub enabled: bool,
    pub reason: Option<String>,
}
