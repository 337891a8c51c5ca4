//! DEX SDK
//!
//! Rust client core for an order-book exchange.
//!
//! This SDK provides:
//! - A reconnecting, ref-counted WebSocket subscription engine
//! - Per-channel dispatch of real-time frames
//! - Local orderbook state fed from the orderbook channel
//! - Limit and market order pricing with contract rounding parity
//! - Market configuration caching
//! - Configurable logging
//!
//! # Example
//!
//! ```no_run
//! use dex_sdk::{DexClient, LimitOrderRequest, MarketCache, SdkConfig, Side, AmountSide};
//! use dex_sdk::logger::{ConsoleLogger, LogLevel};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let logger = Arc::new(ConsoleLogger::new(LogLevel::Info));
//!     let config = SdkConfig::load("dex-sdk.toml")?;
//!     let client = DexClient::new(config, MarketCache::new(logger.clone()), logger);
//!
//!     client.start().await?;
//!     client.watch_orderbook("WETH/USDC").await?;
//!
//!     let quote = client
//!         .quote_limit_order(
//!             "WETH/USDC",
//!             &LimitOrderRequest {
//!                 price: "2500.5",
//!                 amount: "1.25",
//!                 side: Side::Buy,
//!                 amount_side: AmountSide::Base,
//!             },
//!         )
//!         .await?;
//!     println!("max pay: {}", quote.token_y_bound());
//!
//!     client.dispose().await;
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod cache;
pub mod channels;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod logger;
pub mod models;
pub mod orderbook;
pub mod pricing;
pub mod subscription;
pub mod transport;
pub mod websocket;

pub use backoff::BackoffScheduler;
pub use cache::{CacheStats, MarketCache, MarketSource};
pub use channels::{
    Channel, ChannelDemultiplexer, ChannelMessage, DispatchOutcome, ObserverId, ServerError,
};
pub use client::DexClient;
pub use config::SdkConfig;
pub use engine::{EngineState, EngineStatus, SubscriptionEngine};
pub use error::{SdkError, SdkResult};
pub use format::{format_decimal, from_atoms, to_atoms};
pub use logger::{ConsoleLogger, LogFacade, LogLevel, Logger, NoopLogger};
pub use models::{AmountSide, MarketConfig, Side};
pub use orderbook::{Orderbook, OrderbookLevel, OrderbookStore, OrderbookUpdate};
pub use pricing::{
    LimitOrderQuote, LimitOrderRequest, MarketOrderQuote, MarketOrderRequest, Scales,
};
pub use subscription::{Subscription, SubscriptionId, SubscriptionRegistry, Topic};
pub use transport::{ConnectionState, Transport, TransportEvent};
pub use websocket::WsTransport;
