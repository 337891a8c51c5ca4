use std::sync::Arc;

use crate::cache::MarketCache;
use crate::channels::{Channel, ChannelDemultiplexer, ObserverId};
use crate::config::SdkConfig;
use crate::engine::{EngineStatus, SubscriptionEngine};
use crate::error::{SdkError, SdkResult};
use crate::logger::Logger;
use crate::orderbook::OrderbookStore;
use crate::pricing::{
    quote_limit_order, quote_market_order, LimitOrderQuote, LimitOrderRequest, MarketOrderQuote,
    MarketOrderRequest,
};
use crate::subscription::{SubscriptionId, Topic};
use crate::transport::Transport;
use crate::websocket::WsTransport;

/// Entry point tying the real-time feed to local book state and pricing
pub struct DexClient {
    pub engine: SubscriptionEngine,
    pub cache: MarketCache,
    pub orderbooks: OrderbookStore,
    orderbook_observer: ObserverId,
    logger: Arc<dyn Logger>,
}

impl DexClient {
    /// Client on a WebSocket transport built from `config`
    pub fn new(config: SdkConfig, cache: MarketCache, logger: Arc<dyn Logger>) -> Self {
        let transport =
            Arc::new(WsTransport::from_config(&config).with_logger(Arc::clone(&logger)));
        Self::with_transport(config, transport, cache, logger)
    }

    pub fn with_transport(
        config: SdkConfig,
        transport: Arc<dyn Transport>,
        cache: MarketCache,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let engine = SubscriptionEngine::new(
            config.ws_url.clone(),
            transport,
            &config,
            Arc::clone(&logger),
        );

        let orderbooks = OrderbookStore::new();
        let store = orderbooks.clone();
        let orderbook_observer = engine.channels().observe(Channel::Orderbook, None, move |msg| {
            store.apply(msg)?;
            Ok(())
        });

        Self {
            engine,
            cache,
            orderbooks,
            orderbook_observer,
            logger,
        }
    }

    pub async fn start(&self) -> SdkResult<()> {
        self.engine.start().await
    }

    /// Stop the feed. Local books go with it since nothing updates them any more.
    pub async fn stop(&self) {
        self.engine.stop().await;
        self.orderbooks.clear();
    }

    pub async fn dispose(&self) {
        self.engine.dispose().await;
        self.engine.channels().remove(self.orderbook_observer);
        self.orderbooks.clear();
    }

    pub async fn status(&self) -> EngineStatus {
        self.engine.status().await
    }

    pub fn channels(&self) -> Arc<ChannelDemultiplexer> {
        self.engine.channels()
    }

    /// Subscribe to a market's orderbook and keep a local copy of it
    pub async fn watch_orderbook(&self, market_id: &str) -> SdkResult<SubscriptionId> {
        self.engine
            .subscribe(Topic::Orderbook {
                market_id: market_id.to_string(),
            })
            .await
    }

    /// Drop one orderbook watch; the local book goes with the last one
    pub async fn unwatch_orderbook(&self, market_id: &str) -> SdkResult<bool> {
        let removed = self
            .engine
            .unsubscribe(&Topic::Orderbook {
                market_id: market_id.to_string(),
            })
            .await?;
        if removed {
            self.orderbooks.remove(market_id);
        }
        Ok(removed)
    }

    pub async fn quote_limit_order(
        &self,
        market_id: &str,
        request: &LimitOrderRequest<'_>,
    ) -> SdkResult<LimitOrderQuote> {
        let market = self.cache.get_or_fetch(market_id).await?;
        Ok(quote_limit_order(request, &market))
    }

    /// Price a market order against the latest local book for `market_id`
    pub async fn quote_market_order(
        &self,
        market_id: &str,
        request: &MarketOrderRequest<'_>,
    ) -> SdkResult<MarketOrderQuote> {
        let market = self.cache.get_or_fetch(market_id).await?;
        let book = self
            .orderbooks
            .snapshot(market_id)
            .filter(|book| !book.is_empty())
            .ok_or_else(|| SdkError::OrderbookUnavailable(market_id.to_string()))?;

        let quote = quote_market_order(request, &market, &book.levels_for(request.side));
        if quote.insufficient_liquidity {
            self.logger.warn(&format!(
                "Orderbook for {} cannot fill the requested amount",
                market_id
            ));
        }
        Ok(quote)
    }
}
