use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::enums::{ExitReason, OrderSide, OrderStatus, OrderType, TradeSide};

/// A single intended or outstanding exchange action.
///
/// `client_order_id` is the deterministic idempotency key computed by the
/// order manager (spec §4.4) before the exchange assigns its own id. Status
/// transitions are append-only — see `OrderStatus::can_transition_to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub client_order_id: String,
    pub exchange_order_id: Option<String>,
    pub strategy: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_loss_price: Option<Decimal>,
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub average_fill_price: Option<Decimal>,
    pub fees: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
}

/// A realised or open position. `exit_time.is_none()` is equivalent to the
/// trade being open (spec §3 invariant: `exit_time IS NULL <=> trade is open`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub entry_order_id: Uuid,
    pub exit_order_id: Option<Uuid>,
    pub strategy: String,
    pub symbol: String,
    pub side: TradeSide,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_price: Option<Decimal>,
    pub exit_time: Option<DateTime<Utc>>,
    pub pnl: Option<Decimal>,
    pub pnl_percent: Option<Decimal>,
    pub fees_total: Option<Decimal>,
    pub hold_duration_secs: Option<i64>,
    pub exit_reason: Option<ExitReason>,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }
}

/// One (time, exchange, symbol, interval) OHLCV row. Upsert semantics on the
/// primary key `(time, exchange, symbol, interval)` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub exchange: String,
    pub symbol: String,
    pub interval: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Per-(exchange, currency) balance. `total` is a derived invariant, never
/// stored independently of `available + locked`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Balance {
    pub available: Decimal,
    pub locked: Decimal,
}

impl Balance {
    pub fn total(&self) -> Decimal {
        self.available + self.locked
    }
}

/// Append-only audit entry written by the risk gate on every validation
/// rejection and every kill-switch toggle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEvent {
    pub id: Uuid,
    pub strategy: Option<String>,
    pub event_type: String,
    pub description: String,
    pub action_taken: String,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// The canonical kill-switch record stored under `system_config` key
/// `kill_switch`: `{enabled, reason: string|null, timestamp}` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillSwitchRecord {
    pub enabled: bool,
    pub reason: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl KillSwitchRecord {
    pub fn disabled() -> Self {
        Self { enabled: false, reason: None, timestamp: None }
    }
}

/// A persistent named strategy record: identity plus its tunable parameter
/// blob. `config` deserializes into `StrategyParams`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRecord {
    pub id: Uuid,
    pub name: String,
    pub strategy_type: String,
    pub config: JsonValue,
    pub active: bool,
}

/// Mean-reversion strategy parameters, as referenced by name throughout
/// spec §4.2-§4.3. Defaults match the spec's recommended values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub sma_period: usize,
    pub rsi_period: usize,
    pub bb_period: usize,
    pub bb_std: Decimal,
    pub oversold: Decimal,
    pub overbought: Decimal,
    pub max_position_size_usd: Decimal,
    pub stop_loss_percent: Decimal,
    pub max_open_positions: u32,
    pub daily_loss_limit_percent: Decimal,
    pub max_hold_hours: i64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            sma_period: 20,
            rsi_period: 14,
            bb_period: 20,
            bb_std: dec!(2.0),
            oversold: dec!(30),
            overbought: dec!(70),
            max_position_size_usd: dec!(100),
            stop_loss_percent: dec!(2.0),
            max_open_positions: 1,
            daily_loss_limit_percent: dec!(2.0),
            max_hold_hours: 24,
        }
    }
}

/// A single upstream price tick delivered by the exchange connector:
/// `(exchange, symbol, price, volume, timestamp)` (spec §4.1 Inputs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTick {
    pub exchange: String,
    pub symbol: String,
    pub price: Decimal,
    pub volume: Decimal,
    pub time: DateTime<Utc>,
}
