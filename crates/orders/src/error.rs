use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("database error: {0}")]
    Database(#[from] database::DbError),

    #[error("event bus error: {0}")]
    Events(#[from] events::EventsError),

    #[error("exchange error: {0}")]
    Exchange(#[from] exchange::ExchangeError),

    #[error("risk gate error: {0}")]
    Risk(#[from] risk::RiskError),

    #[error("illegal order state transition from {from} to {to}")]
    IllegalTransition { from: core_types::OrderStatus, to: core_types::OrderStatus },

    #[error("no open trade found for strategy '{strategy}' symbol '{symbol}'")]
    NoOpenTrade { strategy: String, symbol: String },
}
