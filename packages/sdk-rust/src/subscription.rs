//! Subscription topics and the reference-counted subscription registry
//!
//! Subscriptions are keyed by the canonical serialization of their topic
//! payload, never by who asked for them: two callers requesting the same
//! topic share one upstream subscription.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::channels::Channel;
use crate::error::{SdkError, SdkResult};

pub type SubscriptionId = u64;

/// Subscription payload sent upstream
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Topic {
    Market {
        market_id: String,
    },
    Orderbook {
        market_id: String,
    },
    Trades {
        market_id: String,
    },
    UserOrders {
        user_address: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        market_id: Option<String>,
    },
    Fills {
        user_address: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        market_id: Option<String>,
    },
    Candles {
        market_id: String,
        interval: String,
    },
}

impl Topic {
    pub fn channel(&self) -> Channel {
        match self {
            Topic::Market { .. } => Channel::Market,
            Topic::Orderbook { .. } => Channel::Orderbook,
            Topic::Trades { .. } => Channel::Trades,
            Topic::UserOrders { .. } => Channel::UserOrders,
            Topic::Fills { .. } => Channel::Fills,
            Topic::Candles { .. } => Channel::Candles,
        }
    }

    /// Reject topics with blank identifiers before they reach the wire
    pub fn validate(&self) -> SdkResult<()> {
        let blank = |field: &str, value: &str| {
            if value.trim().is_empty() {
                Err(SdkError::InvalidSubscription(format!(
                    "{} subscription requires a non-empty {}",
                    self.channel().as_str(),
                    field
                )))
            } else {
                Ok(())
            }
        };

        match self {
            Topic::Market { market_id }
            | Topic::Orderbook { market_id }
            | Topic::Trades { market_id } => blank("marketId", market_id),
            Topic::UserOrders {
                user_address,
                market_id,
            }
            | Topic::Fills {
                user_address,
                market_id,
            } => {
                blank("userAddress", user_address)?;
                match market_id {
                    Some(id) => blank("marketId", id),
                    None => Ok(()),
                }
            }
            Topic::Candles {
                market_id,
                interval,
            } => {
                blank("marketId", market_id)?;
                blank("interval", interval)
            }
        }
    }

    pub fn to_payload(&self) -> SdkResult<Value> {
        Ok(canonicalize(serde_json::to_value(self)?))
    }

    pub fn canonical_key(&self) -> SdkResult<String> {
        Ok(canonical_json(&self.to_payload()?))
    }
}

/// Serialize a payload with object keys in lexicographic order at every depth
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key, canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        scalar => scalar,
    }
}

/// A live upstream subscription shared by `ref_count` callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub topic: Topic,
    pub payload: Value,
    pub canonical_key: String,
    pub ref_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquired {
    /// First caller for this topic; a subscribe frame is owed upstream
    Created(Subscription),
    /// Topic already live; only the ref count changed
    Shared(Subscription),
}

impl Acquired {
    pub fn subscription(&self) -> &Subscription {
        match self {
            Acquired::Created(sub) | Acquired::Shared(sub) => sub,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Released {
    /// Last caller left; an unsubscribe frame is owed upstream
    Removed(Subscription),
    Retained { remaining: usize },
    NotFound,
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    next_id: SubscriptionId,
    entries: HashMap<String, Subscription>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, topic: &Topic) -> SdkResult<Acquired> {
        let payload = topic.to_payload()?;
        let key = canonical_json(&payload);

        if let Some(existing) = self.entries.get_mut(&key) {
            existing.ref_count += 1;
            return Ok(Acquired::Shared(existing.clone()));
        }

        self.next_id += 1;
        let subscription = Subscription {
            id: self.next_id,
            topic: topic.clone(),
            payload,
            canonical_key: key.clone(),
            ref_count: 1,
        };
        self.entries.insert(key, subscription.clone());
        Ok(Acquired::Created(subscription))
    }

    pub fn release(&mut self, topic: &Topic) -> SdkResult<Released> {
        let key = topic.canonical_key()?;
        let Some(existing) = self.entries.get_mut(&key) else {
            return Ok(Released::NotFound);
        };

        existing.ref_count -= 1;
        if existing.ref_count > 0 {
            return Ok(Released::Retained {
                remaining: existing.ref_count,
            });
        }

        Ok(self
            .entries
            .remove(&key)
            .map(Released::Removed)
            .unwrap_or(Released::NotFound))
    }

    pub fn get(&self, topic: &Topic) -> Option<&Subscription> {
        let key = topic.canonical_key().ok()?;
        self.entries.get(&key)
    }

    /// Live subscriptions in creation order
    pub fn active(&self) -> Vec<Subscription> {
        let mut subs: Vec<Subscription> = self.entries.values().cloned().collect();
        subs.sort_by_key(|sub| sub.id);
        subs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
