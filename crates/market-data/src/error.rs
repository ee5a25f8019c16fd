use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("exchange error: {0}")]
    Exchange(#[from] exchange::ExchangeError),

    #[error("database error: {0}")]
    Database(#[from] database::DbError),

    #[error("event bus error: {0}")]
    Events(#[from] events::EventsError),
}
