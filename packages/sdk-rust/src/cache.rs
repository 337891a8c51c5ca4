//! Market configuration cache
//!
//! Pricing needs a market's scaling factors and fees on every quote. The
//! cache keeps them in memory and only goes to the [`MarketSource`] for
//! markets it has not seen yet.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{SdkError, SdkResult};
use crate::logger::Logger;
use crate::models::MarketConfig;

/// Where market configurations come from, usually the exchange's HTTP API
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Fetch one market, `Ok(None)` if the exchange does not list it
    async fn get_market(&self, market_id: &str) -> SdkResult<Option<MarketConfig>>;
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub markets: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Default)]
struct Counters {
    hits: u64,
    misses: u64,
}

/// Thread-safe cache of market configurations
#[derive(Clone)]
pub struct MarketCache {
    markets: Arc<RwLock<HashMap<String, MarketConfig>>>,
    counters: Arc<RwLock<Counters>>,
    source: Option<Arc<dyn MarketSource>>,
    logger: Arc<dyn Logger>,
}

impl MarketCache {
    /// Cache that is only filled through [`MarketCache::set_markets`]
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            markets: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(RwLock::new(Counters::default())),
            source: None,
            logger,
        }
    }

    pub fn with_source(logger: Arc<dyn Logger>, source: Arc<dyn MarketSource>) -> Self {
        Self {
            source: Some(source),
            ..Self::new(logger)
        }
    }

    /// Replace the cached markets wholesale
    pub fn set_markets(&self, markets: Vec<MarketConfig>) {
        let mut cache = self.markets.write();
        cache.clear();
        for market in &markets {
            cache.insert(market.id.clone(), market.clone());
        }
        self.logger.debug(&format!("Cached {} markets", markets.len()));
    }

    pub fn insert(&self, market: MarketConfig) {
        self.markets.write().insert(market.id.clone(), market);
    }

    pub fn get_market(&self, market_id: &str) -> Option<MarketConfig> {
        self.markets.read().get(market_id).cloned()
    }

    pub fn has_market(&self, market_id: &str) -> bool {
        self.markets.read().contains_key(market_id)
    }

    /// Cached market, fetched from the source on a miss
    pub async fn get_or_fetch(&self, market_id: &str) -> SdkResult<MarketConfig> {
        if let Some(market) = self.get_market(market_id) {
            self.counters.write().hits += 1;
            return Ok(market);
        }
        self.counters.write().misses += 1;

        let Some(source) = &self.source else {
            return Err(SdkError::MarketNotFound(market_id.to_string()));
        };

        match source.get_market(market_id).await? {
            Some(market) => {
                self.logger.debug(&format!("Fetched market {}", market_id));
                self.insert(market.clone());
                Ok(market)
            }
            None => Err(SdkError::MarketNotFound(market_id.to_string())),
        }
    }

    pub fn clear(&self) {
        self.markets.write().clear();
        self.logger.debug("Market cache cleared");
    }

    pub fn get_stats(&self) -> CacheStats {
        let counters = self.counters.read();
        CacheStats {
            markets: self.markets.read().len(),
            hits: counters.hits,
            misses: counters.misses,
        }
    }
}
