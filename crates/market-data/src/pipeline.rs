//! Wires an `Exchange` tick subscription into the candle aggregator, the
//! price cache, periodic flush-to-database, and gap detection — the four
//! concurrent duties spec §4.1 assigns the market-data pipeline.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use core_types::RiskEvent;
use database::DbRepository;
use events::{InProcessBus, subjects};
use exchange::Exchange;
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::buffer::{CandleAggregator, PriceCache};
use crate::error::MarketDataError;

const FLUSH_INTERVAL: StdDuration = StdDuration::from_secs(30);
const GAP_CHECK_INTERVAL: StdDuration = StdDuration::from_secs(300);
const GAP_THRESHOLD: Duration = Duration::minutes(5);

/// The market-data pipeline for one exchange connection: ingest, aggregate,
/// flush, and watch for gaps, all sharing one aggregator/cache pair behind a
/// single mutex (spec §4.1 "single writer per symbol" — every symbol is
/// routed through this one task, so there is never lock contention across
/// distinct writers, only between the ingest loop and the periodic tasks
/// reading a consistent snapshot).
pub struct MarketDataPipeline {
    exchange: Arc<dyn Exchange>,
    bus: Arc<InProcessBus>,
    repository: DbRepository,
    state: Mutex<PipelineState>,
}

#[derive(Default)]
struct PipelineState {
    aggregator: CandleAggregator,
    cache: PriceCache,
}

impl MarketDataPipeline {
    pub fn new(exchange: Arc<dyn Exchange>, bus: Arc<InProcessBus>, repository: DbRepository) -> Self {
        Self { exchange, bus, repository, state: Mutex::new(PipelineState::default()) }
    }

    /// Runs the pipeline's three concurrent duties until `cancel` fires:
    /// draining ticks, flushing candles, and checking for data gaps. Each
    /// duty failing independently never brings the others down — a flush
    /// error is logged and retried on the next tick rather than propagated
    /// (spec §4.1 "never block ticks on database latency").
    pub async fn run(self: Arc<Self>, symbols: Vec<String>, cancel: CancellationToken) -> Result<(), MarketDataError> {
        let mut rx = self.exchange.subscribe_price_updates(&symbols)?;

        let ingest = {
            let pipeline = Arc::clone(&self);
            let cancel = cancel.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        tick = rx.recv() => {
                            match tick {
                                Some(tick) => pipeline.ingest_tick(tick).await,
                                None => break,
                            }
                        }
                    }
                }
            }
        };

        let flush = {
            let pipeline = Arc::clone(&self);
            let cancel = cancel.clone();
            async move {
                let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => pipeline.flush().await,
                    }
                }
            }
        };

        let gap_check = {
            let pipeline = Arc::clone(&self);
            async move {
                let mut ticker = tokio::time::interval(GAP_CHECK_INTERVAL);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => pipeline.check_gaps().await,
                    }
                }
            }
        };

        tokio::join!(ingest, flush, gap_check);
        Ok(())
    }

    async fn ingest_tick(&self, tick: core_types::PriceTick) {
        {
            let mut state = self.state.lock().await;
            state.aggregator.ingest(&tick);
            state.cache.update(tick.clone());
        }

        let payload = events::PriceUpdatePayload {
            exchange: tick.exchange,
            symbol: tick.symbol,
            price: tick.price,
            volume: tick.volume,
            time: tick.time,
        };

        if let Err(err) = self.bus.publish(subjects::MARKET_PRICE_UPDATE, payload).await {
            tracing::warn!(error = %err, "failed to publish market.price.update");
        }
    }

    async fn flush(&self) {
        let candles = {
            let mut state = self.state.lock().await;
            state.aggregator.drain_for_flush()
        };

        if candles.is_empty() {
            return;
        }

        if let Err(err) = self.repository.upsert_candles(&candles).await {
            tracing::error!(error = %err, count = candles.len(), "candle flush failed, will retry next tick");
        }
    }

    async fn check_gaps(&self) {
        let now = Utc::now();
        let last_seen = {
            let state = self.state.lock().await;
            state.cache.last_seen_times()
        };

        for (symbol, last_time) in last_seen {
            let gap = now - last_time;
            if gap > GAP_THRESHOLD {
                tracing::warn!(symbol = %symbol, gap_seconds = gap.num_seconds(), "market data gap detected");

                let event = RiskEvent {
                    id: Uuid::new_v4(),
                    strategy: None,
                    event_type: "market_data_gap".to_string(),
                    description: format!("no price tick for {symbol} in {} seconds", gap.num_seconds()),
                    action_taken: "none".to_string(),
                    metadata: json!({ "symbol": symbol, "gap_seconds": gap.num_seconds() }),
                    created_at: now,
                };

                if let Err(err) = self.repository.insert_risk_event(&event).await {
                    tracing::error!(error = %err, "failed to persist market data gap risk event");
                }
            }
        }
    }

    /// Returns the last known price for `symbol`, if the pipeline has seen a
    /// tick for it, along with whether that tick is currently stale.
    pub async fn last_price(&self, symbol: &str) -> Option<(rust_decimal::Decimal, bool)> {
        let state = self.state.lock().await;
        state.cache.get(symbol).map(|tick| (tick.price, state.cache.is_stale(symbol, Utc::now())))
    }
}
