use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("database error: {0}")]
    Database(#[from] database::DbError),

    #[error("event bus error: {0}")]
    Events(#[from] events::EventsError),

    #[error("exchange error: {0}")]
    Exchange(#[from] exchange::ExchangeError),

    #[error("market data error: {0}")]
    MarketData(#[from] market_data::MarketDataError),

    #[error("risk gate error: {0}")]
    Risk(#[from] risk::RiskError),

    #[error("order manager error: {0}")]
    Orders(#[from] orders::OrderError),

    #[error("signal engine error: {0}")]
    Signals(#[from] signals::SignalError),
}
