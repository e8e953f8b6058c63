use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Reasons a submission is rejected before it reaches the latency queue.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("order quantity must be positive")]
    NonPositiveQuantity,

    #[error("limit orders must have a price")]
    MissingLimitPrice,

    #[error("market orders should not have a price")]
    UnexpectedMarketPrice,

    #[error("limit price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    #[error("order {0} was already submitted")]
    DuplicateOrderId(Uuid),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid order: {0}")]
    InvalidOrder(#[from] OrderError),
}

/// Returned by a participant that could not process a fill notification.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FillError {
    #[error("fill rejected by participant: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
