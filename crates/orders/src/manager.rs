use std::sync::Arc;

use chrono::Utc;
use core_types::{ExitReason, Order, OrderSide, OrderStatus, RiskEvent, Trade, TradeSide};
use database::DbRepository;
use events::{InProcessBus, OrderEventPayload, RiskViolationPayload, SignalPayload, TradeEventPayload, subjects};
use exchange::{Exchange, PlaceOrderRequest};
use risk::{RiskGate, ValidationOutcome};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::OrderError;
use crate::idempotency::client_order_id;

/// Durable, idempotent, observable lifecycle of every order, and the
/// correct creation/closure of the derived `Trade` (spec §4.4). Consumes
/// `strategy.signal` as the sole member of its queue group — see
/// `events::InProcessBus::queue_subscribe`.
pub struct OrderManager {
    repository: DbRepository,
    bus: Arc<InProcessBus>,
    exchange: Arc<dyn Exchange>,
    risk_gate: Arc<RiskGate>,
    /// Currency whose exchange balance stands in for "portfolio value" in
    /// the risk gate's daily-loss and position-size checks.
    quote_currency: String,
}

impl OrderManager {
    pub fn new(
        repository: DbRepository,
        bus: Arc<InProcessBus>,
        exchange: Arc<dyn Exchange>,
        risk_gate: Arc<RiskGate>,
        quote_currency: String,
    ) -> Self {
        Self { repository, bus, exchange, risk_gate, quote_currency }
    }

    /// Joins the `strategy.signal` queue group and processes signals until
    /// cancelled. A failure handling one signal is logged and does not stop
    /// the consumer — at-least-once delivery means a dropped signal is not
    /// silently lost, but one bad signal must not wedge the whole manager.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<(), OrderError> {
        let mut subscription = self.bus.queue_subscribe(subjects::STRATEGY_SIGNAL);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("order manager shutting down");
                    return Ok(());
                }
                signal = subscription.recv::<SignalPayload>() => {
                    match signal {
                        Ok(Some(signal)) => {
                            if let Err(e) = self.handle_signal(signal).await {
                                tracing::error!(error = %e, "failed to handle strategy signal");
                            }
                        }
                        Ok(None) => {
                            tracing::warn!("strategy.signal queue closed, order manager exiting");
                            return Ok(());
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to decode strategy signal");
                        }
                    }
                }
            }
        }
    }

    async fn handle_signal(&self, signal: SignalPayload) -> Result<(), OrderError> {
        let portfolio_value = self.portfolio_value().await?;

        match self.risk_gate.validate_trade_signal(&signal, portfolio_value).await? {
            ValidationOutcome::Rejected(rejection) => {
                tracing::info!(strategy = %signal.strategy, symbol = %signal.symbol, %rejection, "signal dropped by risk gate");
                return Ok(());
            }
            ValidationOutcome::Accepted => {}
        }

        let price_hint = signal.indicators.map(|i| i.price).or(signal.stop_loss_price).unwrap_or(dec!(0));
        let client_order_id = client_order_id(&signal.strategy, &signal.symbol, signal.side, signal.quantity, price_hint);

        if let Some(existing) = self.repository.find_order_by_client_id(&client_order_id).await? {
            tracing::info!(client_order_id = %existing.client_order_id, "duplicate signal, order already exists");
            return Ok(());
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            client_order_id: client_order_id.clone(),
            exchange_order_id: None,
            strategy: signal.strategy.clone(),
            symbol: signal.symbol.clone(),
            side: signal.side,
            order_type: signal.order_type,
            quantity: signal.quantity,
            price: None,
            stop_loss_price: signal.stop_loss_price,
            status: OrderStatus::Pending,
            filled_quantity: dec!(0),
            average_fill_price: None,
            fees: dec!(0),
            created_at: now,
            updated_at: now,
            filled_at: None,
        };

        match self.repository.insert_pending_order(&order).await {
            Ok(()) => {}
            Err(database::DbError::DuplicateClientOrderId(_)) => {
                tracing::info!(%client_order_id, "order raced to insertion by a concurrent consumer, skipping");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let exit_reason = signal.exit_reason.unwrap_or(ExitReason::Signal);
        self.dispatch(order, exit_reason).await
    }

    async fn portfolio_value(&self) -> Result<Decimal, OrderError> {
        let balances = self.exchange.get_balance().await?;
        Ok(balances.get(&self.quote_currency).map(|b| b.total()).unwrap_or(dec!(0)))
    }

    async fn dispatch(&self, order: Order, exit_reason: ExitReason) -> Result<(), OrderError> {
        let request = PlaceOrderRequest {
            symbol: order.symbol.clone(),
            side: order.side,
            order_type: order.order_type,
            quantity: order.quantity,
            price: order.price,
            stop_loss_price: order.stop_loss_price,
        };

        match self.exchange.place_order(request).await {
            Ok(response) => {
                if !order.status.can_transition_to(response.status) {
                    return Err(OrderError::IllegalTransition { from: order.status, to: response.status });
                }

                self.repository
                    .update_order_fill(
                        order.id,
                        response.status,
                        Some(&response.exchange_order_id),
                        response.filled_quantity,
                        response.average_fill_price,
                        response.fees,
                        response.filled_at,
                    )
                    .await?;

                let payload = OrderEventPayload {
                    order_id: order.id,
                    client_order_id: order.client_order_id.clone(),
                    exchange_order_id: Some(response.exchange_order_id.clone()),
                    strategy: order.strategy.clone(),
                    symbol: order.symbol.clone(),
                    side: order.side,
                    status: response.status,
                    quantity: order.quantity,
                    filled_quantity: response.filled_quantity,
                    average_fill_price: response.average_fill_price,
                    fees: response.fees,
                };
                self.bus.publish(subjects::ORDER_PLACED, payload).await?;

                if response.status == OrderStatus::Filled {
                    let avg_fill_price = response.average_fill_price.unwrap_or(order.price.unwrap_or(dec!(0)));
                    self.handle_trade(&order, avg_fill_price, response.fees, exit_reason).await?;
                }

                Ok(())
            }
            Err(e) => {
                tracing::error!(client_order_id = %order.client_order_id, error = %e, "exchange rejected order");
                self.repository.update_order_status(order.id, OrderStatus::Failed).await?;

                let payload = OrderEventPayload {
                    order_id: order.id,
                    client_order_id: order.client_order_id.clone(),
                    exchange_order_id: None,
                    strategy: order.strategy.clone(),
                    symbol: order.symbol.clone(),
                    side: order.side,
                    status: OrderStatus::Failed,
                    quantity: order.quantity,
                    filled_quantity: dec!(0),
                    average_fill_price: None,
                    fees: dec!(0),
                };
                self.bus.publish(subjects::ORDER_FAILED, payload).await?;

                Ok(())
            }
        }
    }

    async fn handle_trade(&self, order: &Order, avg_fill_price: Decimal, fees: Decimal, exit_reason: ExitReason) -> Result<(), OrderError> {
        match order.side {
            OrderSide::Buy => self.open_trade(order, avg_fill_price, fees).await,
            OrderSide::Sell => self.close_trade(order, avg_fill_price, fees, exit_reason).await,
        }
    }

    async fn open_trade(&self, order: &Order, entry_price: Decimal, _fees: Decimal) -> Result<(), OrderError> {
        let trade = Trade {
            id: Uuid::new_v4(),
            entry_order_id: order.id,
            exit_order_id: None,
            strategy: order.strategy.clone(),
            symbol: order.symbol.clone(),
            side: TradeSide::Long,
            entry_price,
            quantity: order.quantity,
            entry_time: Utc::now(),
            exit_price: None,
            exit_time: None,
            pnl: None,
            pnl_percent: None,
            fees_total: None,
            hold_duration_secs: None,
            exit_reason: None,
        };

        self.repository.insert_trade(&trade).await?;

        self.bus
            .publish(
                subjects::TRADE_OPENED,
                TradeEventPayload {
                    trade_id: trade.id,
                    strategy: trade.strategy.clone(),
                    symbol: trade.symbol.clone(),
                    entry_price: trade.entry_price,
                    quantity: trade.quantity,
                    exit_price: None,
                    pnl: None,
                    pnl_percent: None,
                    exit_reason: None,
                },
            )
            .await?;

        Ok(())
    }

    async fn close_trade(&self, order: &Order, exit_price: Decimal, exit_fees: Decimal, exit_reason: ExitReason) -> Result<(), OrderError> {
        let trade = match self.repository.find_open_trade(&order.strategy, &order.symbol).await? {
            Some(trade) => trade,
            None => {
                self.record_no_open_trade(order).await?;
                return Err(OrderError::NoOpenTrade { strategy: order.strategy.clone(), symbol: order.symbol.clone() });
            }
        };

        let entry_order = self.repository.get_order(trade.entry_order_id).await?;
        let total_fees = entry_order.fees + exit_fees;
        let pnl = (exit_price - trade.entry_price) * trade.quantity - total_fees;
        let denominator = trade.entry_price * trade.quantity;
        let pnl_percent = if denominator.is_zero() { dec!(0) } else { pnl / denominator * dec!(100) };
        let exit_time = Utc::now();
        let hold_duration_secs = (exit_time - trade.entry_time).num_seconds();

        self.repository
            .close_trade(trade.id, order.id, exit_price, exit_time, pnl, pnl_percent, total_fees, hold_duration_secs, exit_reason)
            .await?;

        self.bus
            .publish(
                subjects::TRADE_CLOSED,
                TradeEventPayload {
                    trade_id: trade.id,
                    strategy: trade.strategy.clone(),
                    symbol: trade.symbol.clone(),
                    entry_price: trade.entry_price,
                    quantity: trade.quantity,
                    exit_price: Some(exit_price),
                    pnl: Some(pnl),
                    pnl_percent: Some(pnl_percent),
                    exit_reason: Some(exit_reason),
                },
            )
            .await?;

        Ok(())
    }

    /// A SELL fill with no open trade to close is an irrecoverable
    /// constraint violation (spec §7): it does not crash the process, but it
    /// must be surfaced as a `risk_event` row and a `risk.violation` event,
    /// not just a log line.
    async fn record_no_open_trade(&self, order: &Order) -> Result<(), OrderError> {
        tracing::error!(strategy = %order.strategy, symbol = %order.symbol, order_id = %order.id, "sell fill with no open trade to close");

        let description = format!("order {} filled SELL with no open trade for strategy '{}' symbol '{}'", order.id, order.strategy, order.symbol);

        let event = RiskEvent {
            id: Uuid::new_v4(),
            strategy: Some(order.strategy.clone()),
            event_type: "NO_OPEN_TRADE".to_string(),
            description: description.clone(),
            action_taken: "trade close skipped".to_string(),
            metadata: json!({ "symbol": order.symbol, "order_id": order.id }),
            created_at: Utc::now(),
        };
        self.repository.insert_risk_event(&event).await?;

        self.bus
            .publish(
                subjects::RISK_VIOLATION,
                RiskViolationPayload {
                    strategy: Some(order.strategy.clone()),
                    violation_type: "NO_OPEN_TRADE".to_string(),
                    description,
                    action_taken: "trade close skipped".to_string(),
                },
            )
            .await?;

        Ok(())
    }
}

