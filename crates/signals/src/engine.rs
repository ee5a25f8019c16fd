//! The signal engine: maintains a bounded price buffer per symbol, evaluates
//! the mean-reversion entry/exit rule on every tick, and emits at most one
//! `strategy.signal` per distinct (strategy, side, tick) decision (spec §4.2).

use std::collections::HashMap;
use std::sync::Arc;

use core_types::{ExitReason, OrderSide, OrderType};
use database::DbRepository;
use events::{IndicatorSnapshot, InProcessBus, PriceUpdatePayload, SignalPayload, subjects};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::buffer::{DEFAULT_CAPACITY, PriceBuffer};
use crate::error::SignalError;
use crate::indicators::{bollinger, rsi, sma};

/// Maintains one [`PriceBuffer`] per symbol for a single named strategy and
/// turns ticks into `strategy.signal` events. One `SignalEngine` instance is
/// the sole writer of its buffers (spec §5): every tick is processed
/// sequentially off one broadcast subscription, so no additional locking
/// discipline is needed beyond the `Mutex` guarding the buffer map itself.
pub struct SignalEngine {
    bus: Arc<InProcessBus>,
    repository: DbRepository,
    strategy: String,
    buffers: Mutex<HashMap<String, PriceBuffer>>,
}

impl SignalEngine {
    pub fn new(bus: Arc<InProcessBus>, repository: DbRepository, strategy: String) -> Self {
        Self { bus, repository, strategy, buffers: Mutex::new(HashMap::new()) }
    }

    /// Preloads each symbol's buffer from `price_data` in chronological
    /// order (spec §4.2 "on startup, preload ..."), so the engine can
    /// evaluate its rule from the very first live tick rather than waiting
    /// to accumulate enough history from scratch.
    pub async fn preload(&self, symbols: &[String]) -> Result<(), SignalError> {
        let mut buffers = self.buffers.lock().await;
        for symbol in symbols {
            let candles = self.repository.get_recent_candles(symbol, "1m", DEFAULT_CAPACITY as i64).await?;
            let mut buffer = PriceBuffer::new(DEFAULT_CAPACITY);
            buffer.preload(candles.into_iter().map(|c| c.close));
            tracing::info!(symbol = %symbol, preloaded = buffer.len(), "preloaded signal engine buffer");
            buffers.insert(symbol.clone(), buffer);
        }
        Ok(())
    }

    /// Subscribes to `market.price.update` and evaluates the entry/exit rule
    /// on every tick until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<(), SignalError> {
        let mut subscription = self.bus.subscribe(subjects::MARKET_PRICE_UPDATE);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("signal engine shutting down");
                    return Ok(());
                }
                tick = subscription.recv::<PriceUpdatePayload>() => {
                    match tick {
                        Ok(Some(tick)) => {
                            if let Err(e) = self.on_price_update(tick).await {
                                tracing::error!(error = %e, "failed to evaluate signal for price update");
                            }
                        }
                        Ok(None) => {
                            tracing::warn!("market.price.update channel closed, signal engine exiting");
                            return Ok(());
                        }
                        Err(e) => tracing::error!(error = %e, "failed to decode price update"),
                    }
                }
            }
        }
    }

    async fn on_price_update(&self, tick: PriceUpdatePayload) -> Result<(), SignalError> {
        let params = self.repository.get_strategy_params(&self.strategy).await?;

        let prices = {
            let mut buffers = self.buffers.lock().await;
            let buffer = buffers.entry(tick.symbol.clone()).or_insert_with(|| PriceBuffer::new(DEFAULT_CAPACITY));
            buffer.push(tick.price);
            buffer.as_slice()
        };

        let min_required = params.sma_period.max(params.rsi_period + 1).max(params.bb_period);
        if prices.len() < min_required {
            tracing::debug!(symbol = %tick.symbol, have = prices.len(), need = min_required, "buffer not yet full, skipping evaluation");
            return Ok(());
        }

        let sma_value = sma(&prices, params.sma_period);
        let rsi_value = rsi(&prices, params.rsi_period);
        let bands = bollinger(&prices, params.bb_period, params.bb_std);

        let snapshot = IndicatorSnapshot {
            price: tick.price,
            sma: sma_value,
            rsi: rsi_value,
            upper_bb: bands.upper,
            middle_bb: bands.middle,
            lower_bb: bands.lower,
        };

        let open_trade = self.repository.find_open_trade(&self.strategy, &tick.symbol).await?;

        match open_trade {
            None => {
                if rsi_value < params.oversold && tick.price < bands.lower {
                    self.emit_entry(&tick.symbol, tick.price, &params, snapshot).await?;
                }
            }
            Some(trade) => {
                if tick.price > sma_value {
                    self.emit_exit(&tick.symbol, trade.quantity, snapshot).await?;
                }
            }
        }

        Ok(())
    }

    async fn emit_entry(
        &self,
        symbol: &str,
        price: Decimal,
        params: &core_types::StrategyParams,
        indicators: IndicatorSnapshot,
    ) -> Result<(), SignalError> {
        let quantity = params.max_position_size_usd / price;
        let stop_loss_price = price * (Decimal::ONE - params.stop_loss_percent / dec!(100));

        tracing::info!(strategy = %self.strategy, symbol, %price, rsi = %indicators.rsi, "emitting LONG entry signal");

        let signal = SignalPayload {
            id: Uuid::new_v4(),
            strategy: self.strategy.clone(),
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity,
            stop_loss_price: Some(stop_loss_price),
            reason: "RSI oversold and price below lower Bollinger Band".to_string(),
            exit_reason: None,
            indicators: Some(indicators),
        };

        self.bus.publish(subjects::STRATEGY_SIGNAL, signal).await?;
        Ok(())
    }

    async fn emit_exit(&self, symbol: &str, quantity: Decimal, indicators: IndicatorSnapshot) -> Result<(), SignalError> {
        tracing::info!(strategy = %self.strategy, symbol, "emitting SELL exit signal: price crossed SMA");

        let signal = SignalPayload {
            id: Uuid::new_v4(),
            strategy: self.strategy.clone(),
            symbol: symbol.to_string(),
            side: OrderSide::Sell,
            order_type: OrderType::Market,
            quantity,
            stop_loss_price: None,
            reason: "Price crossed SMA".to_string(),
            exit_reason: Some(ExitReason::Signal),
            indicators: Some(indicators),
        };

        self.bus.publish(subjects::STRATEGY_SIGNAL, signal).await?;
        Ok(())
    }
}
