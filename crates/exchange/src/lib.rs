//! # Exchange Interface
//!
//! The abstract contract the core consumes from a trading venue (spec §6):
//! place/cancel/get order, balances, a synchronous price query, and price-tick
//! subscription. Multiple implementations — paper, and eventually a live
//! REST/WebSocket connector — map cleanly onto this one capability interface
//! (spec §9 "prefer composition to inheritance"); the order manager, risk
//! gate, and market-data pipeline hold only an `Arc<dyn Exchange>` and never
//! know which concrete implementation they were wired up with.

pub mod error;
pub mod paper;

pub use error::ExchangeError;
pub use paper::{PaperExchange, PaperExchangeConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{OrderSide, OrderStatus, OrderType, PriceTick};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// What the core asks an exchange to do with an order. Distinct from
/// `core_types::Order` (the persisted record) because the exchange never
/// sees — and must not need — the internal id or idempotency key; it only
/// sees what spec §6's `PlaceOrder` contract lists.
#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_loss_price: Option<Decimal>,
}

/// What an exchange hands back for a place/get-order call (spec §6
/// `OrderResponse`).
#[derive(Debug, Clone)]
pub struct OrderResponse {
    pub exchange_order_id: String,
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub average_fill_price: Option<Decimal>,
    pub fees: Decimal,
    pub created_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
}

/// A currency balance as reported by the exchange: `total` is always
/// `available + locked` (spec §3 invariant), computed rather than stored.
#[derive(Debug, Clone, Copy)]
pub struct ExchangeBalance {
    pub available: Decimal,
    pub locked: Decimal,
}

impl ExchangeBalance {
    pub fn total(&self) -> Decimal {
        self.available + self.locked
    }
}

/// The generic, abstract interface for a trading exchange (spec §6). This is
/// the contract the live engine and its tests use, allowing the underlying
/// implementation — paper or live — to be swapped without touching any of
/// the four core subsystems.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Places a new order on the exchange.
    async fn place_order(&self, req: PlaceOrderRequest) -> Result<OrderResponse, ExchangeError>;

    /// Cancels a previously placed order by its exchange-assigned id.
    async fn cancel_order(&self, exchange_order_id: &str) -> Result<(), ExchangeError>;

    /// Fetches the current state of a previously placed order.
    async fn get_order(&self, exchange_order_id: &str) -> Result<OrderResponse, ExchangeError>;

    /// Fetches the current balance for every currency the account holds.
    async fn get_balance(&self) -> Result<HashMap<String, ExchangeBalance>, ExchangeError>;

    /// Synchronously queries the last known price for a symbol.
    async fn get_price(&self, symbol: &str) -> Result<Decimal, ExchangeError>;

    /// Subscribes to a live stream of price ticks for the given symbols.
    /// Returns a channel the market-data pipeline drains; the exchange
    /// implementation owns reconnection (spec §5: 5s retry on read error).
    fn subscribe_price_updates(&self, symbols: &[String]) -> Result<mpsc::Receiver<PriceTick>, ExchangeError>;

    /// Releases any resources (connections, background tasks) held by this
    /// exchange handle.
    async fn close(&self) -> Result<(), ExchangeError>;
}
