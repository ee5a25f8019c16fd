use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("database error: {0}")]
    Database(#[from] database::DbError),

    #[error("event bus error: {0}")]
    Events(#[from] events::EventsError),
}
