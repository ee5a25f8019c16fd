//! # Engine
//!
//! The process-wiring orchestrator (spec §2): constructs the risk gate,
//! signal engine, order manager, and market-data pipeline around one shared
//! `DbRepository`, `InProcessBus`, and `Arc<dyn Exchange>`, then runs all
//! four as cancellable tasks until shutdown.

pub mod error;

use std::sync::Arc;

use database::DbRepository;
use events::InProcessBus;
use exchange::Exchange;
use market_data::MarketDataPipeline;
use orders::OrderManager;
use risk::RiskGate;
use signals::SignalEngine;
use tokio_util::sync::CancellationToken;

pub use error::EngineError;

/// Wires the four core subsystems together and owns nothing they don't
/// already own themselves — `Engine` is purely a construction and
/// supervision helper, not a fifth stateful component.
pub struct Engine {
    repository: DbRepository,
    bus: Arc<InProcessBus>,
    exchange: Arc<dyn Exchange>,
    strategy: String,
    symbols: Vec<String>,
    quote_currency: String,
}

impl Engine {
    pub fn new(
        repository: DbRepository,
        bus: Arc<InProcessBus>,
        exchange: Arc<dyn Exchange>,
        strategy: String,
        symbols: Vec<String>,
        quote_currency: String,
    ) -> Self {
        Self { repository, bus, exchange, strategy, symbols, quote_currency }
    }

    /// Preloads the signal engine's buffers from recent candles, then spawns
    /// the market-data pipeline, signal engine, risk supervisor, and order
    /// manager as independent tasks sharing one `CancellationToken`. Returns
    /// once every task has exited, normally because `cancel` fired; a task
    /// returning its own error is reported once every task has wound down
    /// rather than torn down eagerly, since each subsystem's `run` loop
    /// already treats its own failures as non-fatal to its peers (each logs
    /// and continues per tick rather than ever returning early).
    pub async fn run(self, cancel: CancellationToken) -> Result<(), EngineError> {
        let risk_gate = Arc::new(RiskGate::new(self.repository.clone(), Arc::clone(&self.bus)));
        let signal_engine = Arc::new(SignalEngine::new(Arc::clone(&self.bus), self.repository.clone(), self.strategy.clone()));
        let order_manager = Arc::new(OrderManager::new(
            self.repository.clone(),
            Arc::clone(&self.bus),
            Arc::clone(&self.exchange),
            Arc::clone(&risk_gate),
            self.quote_currency.clone(),
        ));
        let market_data = Arc::new(MarketDataPipeline::new(Arc::clone(&self.exchange), Arc::clone(&self.bus), self.repository.clone()));

        signal_engine.preload(&self.symbols).await?;
        tracing::info!(symbols = ?self.symbols, strategy = %self.strategy, "engine starting");

        let market_data_task = {
            let market_data = Arc::clone(&market_data);
            let symbols = self.symbols.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { market_data.run(symbols, cancel).await })
        };

        let signal_task = {
            let signal_engine = Arc::clone(&signal_engine);
            let cancel = cancel.clone();
            tokio::spawn(async move { signal_engine.run(cancel).await })
        };

        let risk_task = {
            let risk_gate = Arc::clone(&risk_gate);
            let cancel = cancel.clone();
            tokio::spawn(async move { risk_gate.run_supervisor(cancel).await })
        };

        let order_task = {
            let order_manager = Arc::clone(&order_manager);
            let cancel = cancel.clone();
            tokio::spawn(async move { order_manager.run(cancel).await })
        };

        let (market_data_result, signal_result, risk_result, order_result) =
            tokio::join!(market_data_task, signal_task, risk_task, order_task);

        // A task panicking is a bug, not a recoverable condition; a task
        // returning its own error is this subsystem failing cleanly. Both
        // are surfaced, but the first one encountered is what callers see.
        market_data_result.expect("market data task panicked")?;
        signal_result.expect("signal engine task panicked")?;
        risk_result.expect("risk supervisor task panicked")?;
        order_result.expect("order manager task panicked")?;

        tracing::info!("engine stopped");
        Ok(())
    }
}
