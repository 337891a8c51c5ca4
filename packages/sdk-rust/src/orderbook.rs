//! Local orderbook state built from orderbook channel messages

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::channels::ChannelMessage;
use crate::error::{SdkError, SdkResult};
use crate::models::Side;

/// Price level in the orderbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderbookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// Orderbook payload carried by the orderbook channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderbookUpdate {
    #[serde(default)]
    pub bids: Vec<OrderbookLevel>,
    #[serde(default)]
    pub asks: Vec<OrderbookLevel>,
}

#[derive(Debug, Clone, Default)]
pub struct Orderbook {
    pub market_id: String,
    pub bids: BTreeMap<Decimal, Decimal>, // price -> size (best is last)
    pub asks: BTreeMap<Decimal, Decimal>, // price -> size (best is first)
}

impl Orderbook {
    pub fn new(market_id: impl Into<String>) -> Self {
        Self {
            market_id: market_id.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    /// Replace both sides wholesale
    pub fn apply_snapshot(&mut self, update: &OrderbookUpdate) {
        self.bids.clear();
        self.asks.clear();
        self.apply_delta(update);
    }

    /// Apply level changes; a size of zero removes the level
    pub fn apply_delta(&mut self, update: &OrderbookUpdate) {
        apply_levels(&mut self.bids, &update.bids);
        apply_levels(&mut self.asks, &update.asks);
    }

    /// Bids, highest price first
    pub fn bids_best_first(&self) -> Vec<OrderbookLevel> {
        self.bids
            .iter()
            .rev()
            .map(|(price, size)| OrderbookLevel {
                price: *price,
                size: *size,
            })
            .collect()
    }

    /// Asks, lowest price first
    pub fn asks_best_first(&self) -> Vec<OrderbookLevel> {
        self.asks
            .iter()
            .map(|(price, size)| OrderbookLevel {
                price: *price,
                size: *size,
            })
            .collect()
    }

    /// Levels a taker order on `side` consumes: asks for a buy, bids for a sell
    pub fn levels_for(&self, side: Side) -> Vec<OrderbookLevel> {
        match side {
            Side::Buy => self.asks_best_first(),
            Side::Sell => self.bids_best_first(),
        }
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

fn apply_levels(book: &mut BTreeMap<Decimal, Decimal>, levels: &[OrderbookLevel]) {
    for level in levels {
        if level.size > Decimal::ZERO {
            book.insert(level.price, level.size);
        } else {
            book.remove(&level.price);
        }
    }
}

/// Latest orderbook per market, fed by orderbook channel messages
#[derive(Clone, Default)]
pub struct OrderbookStore {
    books: Arc<RwLock<HashMap<String, Orderbook>>>,
}

impl OrderbookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an orderbook channel message keyed by its instance id
    pub fn apply(&self, message: &ChannelMessage) -> SdkResult<()> {
        let market_id = message
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SdkError::MissingInstanceId(message.channel.as_str().to_string()))?;
        let update: OrderbookUpdate = message.decode()?;

        let mut books = self.books.write();
        let book = books
            .entry(market_id.clone())
            .or_insert_with(|| Orderbook::new(market_id));
        if message.is_snapshot {
            book.apply_snapshot(&update);
        } else {
            book.apply_delta(&update);
        }
        Ok(())
    }

    pub fn snapshot(&self, market_id: &str) -> Option<Orderbook> {
        self.books.read().get(market_id).cloned()
    }

    pub fn remove(&self, market_id: &str) -> bool {
        self.books.write().remove(market_id).is_some()
    }

    pub fn markets(&self) -> Vec<String> {
        self.books.read().keys().cloned().collect()
    }

    /// Drop every book
    pub fn clear(&self) {
        self.books.write().clear();
    }
}
