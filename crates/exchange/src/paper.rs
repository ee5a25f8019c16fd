//! An in-memory simulated exchange. Fills market orders immediately against
//! the last known price, applying a configurable slippage percentage and a
//! flat taker fee, and holds balances/orders behind a single mutex rather
//! than a database — this is explicitly a replaceable stand-in (spec §6
//! "paper trading vs. live trading... implementation is swappable"), not the
//! system of record for trades (that is the `orders` crate's job against
//! Postgres).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use core_types::{OrderSide, OrderStatus, OrderType, PriceTick};
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{Exchange, ExchangeBalance, ExchangeError, OrderResponse, PlaceOrderRequest};

/// Basis-point-style config for the paper fill model. Defaults approximate a
/// retail taker on a liquid spot pair: 5 bps slippage against the simulated
/// price, 10 bps taker fee.
#[derive(Debug, Clone, Copy)]
pub struct PaperExchangeConfig {
    pub slippage_percent: Decimal,
    pub fee_percent: Decimal,
}

impl Default for PaperExchangeConfig {
    fn default() -> Self {
        Self {
            slippage_percent: dec!(0.05),
            fee_percent: dec!(0.10),
        }
    }
}

struct PaperState {
    balances: HashMap<String, ExchangeBalance>,
    orders: HashMap<String, OrderResponse>,
    last_price: HashMap<String, Decimal>,
    closed: bool,
}

/// The paper trading exchange. Orders fill instantly at the last pushed
/// price plus slippage; there is no order book, no partial fills, and no
/// latency simulation, matching the scope spec §6 asks of a paper
/// implementation: a drop-in for development and forward-testing, not a
/// market simulator.
pub struct PaperExchange {
    config: PaperExchangeConfig,
    state: Mutex<PaperState>,
    tick_subscribers: Mutex<Vec<mpsc::Sender<PriceTick>>>,
}

impl PaperExchange {
    pub fn new(config: PaperExchangeConfig) -> Self {
        Self {
            config,
            state: Mutex::new(PaperState {
                balances: HashMap::new(),
                orders: HashMap::new(),
                last_price: HashMap::new(),
                closed: false,
            }),
            tick_subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Seeds (or tops up) a currency balance. Tests and the engine's startup
    /// wiring use this to establish the starting account state; a live
    /// exchange would instead report whatever the account actually holds.
    pub fn seed_balance(&self, currency: &str, available: Decimal) {
        let mut state = self.state.lock().unwrap();
        state
            .balances
            .entry(currency.to_string())
            .and_modify(|b| b.available += available)
            .or_insert(ExchangeBalance { available, locked: Decimal::ZERO });
    }

    /// Advances the simulated market: records `price` as the last known
    /// price for `symbol` and fans it out to every subscriber as a
    /// `PriceTick`. This is how tests and any synthetic feed drive the paper
    /// exchange, since it has no real market connection of its own.
    pub async fn push_tick(&self, exchange: &str, symbol: &str, price: Decimal, volume: Decimal) {
        {
            let mut state = self.state.lock().unwrap();
            state.last_price.insert(symbol.to_string(), price);
        }

        let tick = PriceTick {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            price,
            volume,
            time: Utc::now(),
        };

        let subscribers = self.tick_subscribers.lock().unwrap().clone();
        for tx in subscribers {
            // A full or closed subscriber channel just means that consumer
            // has fallen behind or shut down; it does not stop the feed for
            // everyone else.
            let _ = tx.try_send(tick.clone());
        }
    }

    fn fill_price(&self, side: OrderSide, last_price: Decimal) -> Decimal {
        let slip = last_price * self.config.slippage_percent / dec!(100);
        match side {
            OrderSide::Buy => last_price + slip,
            OrderSide::Sell => last_price - slip,
        }
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    async fn place_order(&self, req: PlaceOrderRequest) -> Result<OrderResponse, ExchangeError> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(ExchangeError::Closed);
        }

        let last_price = *state
            .last_price
            .get(&req.symbol)
            .ok_or_else(|| ExchangeError::UnknownSymbol(req.symbol.clone()))?;

        if req.quantity <= Decimal::ZERO {
            return Err(ExchangeError::InvalidRequest(format!(
                "order quantity must be positive, got {}",
                req.quantity
            )));
        }

        let fill_price = match req.order_type {
            OrderType::Market => self.fill_price(req.side, last_price),
            OrderType::Limit => req.price.ok_or_else(|| {
                ExchangeError::InvalidRequest("limit order requires a price".to_string())
            })?,
        };

        let notional = fill_price * req.quantity;
        let fees = notional * self.config.fee_percent / dec!(100);
        let now = Utc::now();

        let response = OrderResponse {
            exchange_order_id: Uuid::new_v4().to_string(),
            status: OrderStatus::Filled,
            filled_quantity: req.quantity,
            average_fill_price: Some(fill_price),
            fees,
            created_at: now,
            filled_at: Some(now),
        };

        state.orders.insert(response.exchange_order_id.clone(), response.clone());
        Ok(response)
    }

    async fn cancel_order(&self, exchange_order_id: &str) -> Result<(), ExchangeError> {
        let mut state = self.state.lock().unwrap();
        let order = state
            .orders
            .get_mut(exchange_order_id)
            .ok_or_else(|| ExchangeError::OrderNotFound(exchange_order_id.to_string()))?;

        if order.status.is_terminal() {
            return Err(ExchangeError::InvalidRequest(format!(
                "order {exchange_order_id} is already in terminal state {}",
                order.status
            )));
        }

        order.status = OrderStatus::Cancelled;
        Ok(())
    }

    async fn get_order(&self, exchange_order_id: &str) -> Result<OrderResponse, ExchangeError> {
        let state = self.state.lock().unwrap();
        state
            .orders
            .get(exchange_order_id)
            .cloned()
            .ok_or_else(|| ExchangeError::OrderNotFound(exchange_order_id.to_string()))
    }

    async fn get_balance(&self) -> Result<HashMap<String, ExchangeBalance>, ExchangeError> {
        Ok(self.state.lock().unwrap().balances.clone())
    }

    async fn get_price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        self.state
            .lock()
            .unwrap()
            .last_price
            .get(symbol)
            .copied()
            .ok_or_else(|| ExchangeError::UnknownSymbol(symbol.to_string()))
    }

    fn subscribe_price_updates(&self, _symbols: &[String]) -> Result<mpsc::Receiver<PriceTick>, ExchangeError> {
        let (tx, rx) = mpsc::channel(256);
        self.tick_subscribers.lock().unwrap().push(tx);
        Ok(rx)
    }

    async fn close(&self) -> Result<(), ExchangeError> {
        self.state.lock().unwrap().closed = true;
        self.tick_subscribers.lock().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PaperExchangeConfig {
        PaperExchangeConfig { slippage_percent: dec!(0.05), fee_percent: dec!(0.1) }
    }

    #[tokio::test]
    async fn market_buy_fills_above_last_price_by_slippage() {
        let ex = PaperExchange::new(config());
        ex.push_tick("paper", "BTCUSDT", dec!(100), dec!(1)).await;

        let resp = ex
            .place_order(PlaceOrderRequest {
                symbol: "BTCUSDT".to_string(),
                side: OrderSide::Buy,
                order_type: OrderType::Market,
                quantity: dec!(1),
                price: None,
                stop_loss_price: None,
            })
            .await
            .unwrap();

        assert_eq!(resp.status, OrderStatus::Filled);
        assert!(resp.average_fill_price.unwrap() > dec!(100));
    }

    #[tokio::test]
    async fn placing_against_unknown_symbol_fails() {
        let ex = PaperExchange::new(config());
        let err = ex
            .place_order(PlaceOrderRequest {
                symbol: "NOPE".to_string(),
                side: OrderSide::Buy,
                order_type: OrderType::Market,
                quantity: dec!(1),
                price: None,
                stop_loss_price: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::UnknownSymbol(_)));
    }

    #[tokio::test]
    async fn cancelling_a_filled_order_is_rejected() {
        let ex = PaperExchange::new(config());
        ex.push_tick("paper", "BTCUSDT", dec!(100), dec!(1)).await;
        let resp = ex
            .place_order(PlaceOrderRequest {
                symbol: "BTCUSDT".to_string(),
                side: OrderSide::Buy,
                order_type: OrderType::Market,
                quantity: dec!(1),
                price: None,
                stop_loss_price: None,
            })
            .await
            .unwrap();

        let err = ex.cancel_order(&resp.exchange_order_id).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn closed_exchange_rejects_new_orders() {
        let ex = PaperExchange::new(config());
        ex.push_tick("paper", "BTCUSDT", dec!(100), dec!(1)).await;
        ex.close().await.unwrap();

        let err = ex
            .place_order(PlaceOrderRequest {
                symbol: "BTCUSDT".to_string(),
                side: OrderSide::Buy,
                order_type: OrderType::Market,
                quantity: dec!(1),
                price: None,
                stop_loss_price: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Closed));
    }
}
