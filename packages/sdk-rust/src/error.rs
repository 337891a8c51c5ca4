use thiserror::Error;

pub type SdkResult<T> = Result<T, SdkError>;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Transport is not connected")]
    NotConnected,

    #[error("Failed to start subscription engine: {0}")]
    StartFailed(#[source] Box<SdkError>),

    #[error("Scheduled action was cancelled")]
    Cancelled,

    #[error("Scheduled action failed: {0}")]
    TaskFailed(String),

    #[error("Engine has been disposed")]
    Disposed,

    #[error("Invalid subscription: {0}")]
    InvalidSubscription(String),

    #[error("Market {0} not found")]
    MarketNotFound(String),

    #[error("{0} message without an instance id")]
    MissingInstanceId(String),

    #[error("No orderbook snapshot for market {0}")]
    OrderbookUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
