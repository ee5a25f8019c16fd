use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Order with exchange id '{0}' was not found")]
    OrderNotFound(String),

    #[error("Unknown order status '{0}' reported by the exchange")]
    UnknownStatus(String),

    #[error("No price is currently known for symbol '{0}'")]
    UnknownSymbol(String),

    #[error("Invalid order request: {0}")]
    InvalidRequest(String),

    #[error("The exchange connection is closed")]
    Closed,

    #[error("Transient I/O failure talking to the exchange: {0}")]
    Io(String),
}
