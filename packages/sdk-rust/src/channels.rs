//! Fan-out of inbound frames to per-channel observers
//!
//! Inbound frames look like
//! `{"channel": "orderbook", "id": "X/Y", "isSnapshot": true, "data": {...}}`.
//! Each frame goes to the observers registered for its channel (optionally
//! filtered by instance id). Administrative tags are dropped, `error` frames go
//! to the error observers, and nothing an observer does can stop delivery to
//! the next one.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::SdkResult;
use crate::logger::Logger;

const TAG_CONNECTION: &str = "connection";
const TAG_SUBSCRIPTION_RESPONSE: &str = "subscriptionResponse";
const TAG_ERROR: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    Market,
    Orderbook,
    Trades,
    UserOrders,
    Fills,
    Candles,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Market => "market",
            Channel::Orderbook => "orderbook",
            Channel::Trades => "trades",
            Channel::UserOrders => "userOrders",
            Channel::Fills => "fills",
            Channel::Candles => "candles",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "market" => Some(Channel::Market),
            "orderbook" => Some(Channel::Orderbook),
            "trades" => Some(Channel::Trades),
            "userOrders" => Some(Channel::UserOrders),
            "fills" => Some(Channel::Fills),
            "candles" => Some(Channel::Candles),
            _ => None,
        }
    }
}

/// A topic frame as delivered to observers
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub channel: Channel,
    pub id: Option<String>,
    pub is_snapshot: bool,
    pub data: Value,
}

impl ChannelMessage {
    pub fn decode<T: DeserializeOwned>(&self) -> SdkResult<T> {
        Ok(T::deserialize(&self.data)?)
    }
}

/// Error reported by the server on the `error` channel
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError {
    pub id: Option<String>,
    pub message: String,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered { observers: usize },
    Administrative,
    EmptyPayload,
    Unrouted,
    Malformed,
}

pub type ObserverId = u64;
pub type Observer = Arc<dyn Fn(&ChannelMessage) -> anyhow::Result<()> + Send + Sync>;
pub type ErrorObserver = Arc<dyn Fn(&ServerError) + Send + Sync>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InboundFrame {
    channel: String,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    is_snapshot: bool,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Clone)]
struct Registration {
    id: ObserverId,
    instance: Option<String>,
    observer: Observer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub dropped: u64,
    pub malformed: u64,
    pub observer_failures: u64,
}

pub struct ChannelDemultiplexer {
    observers: RwLock<HashMap<Channel, Vec<Registration>>>,
    error_observers: RwLock<Vec<(ObserverId, ErrorObserver)>>,
    next_id: AtomicU64,
    stats: RwLock<DispatchStats>,
    logger: Arc<dyn Logger>,
}

impl ChannelDemultiplexer {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            error_observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            stats: RwLock::new(DispatchStats::default()),
            logger,
        }
    }

    /// Register an observer for `channel`, optionally only for one instance id
    pub fn observe<F>(&self, channel: Channel, instance: Option<String>, observer: F) -> ObserverId
    where
        F: Fn(&ChannelMessage) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers
            .write()
            .entry(channel)
            .or_default()
            .push(Registration {
                id,
                instance,
                observer: Arc::new(observer),
            });
        id
    }

    pub fn on_error<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&ServerError) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.error_observers.write().push((id, Arc::new(observer)));
        id
    }

    /// Remove an observer of either kind
    pub fn remove(&self, id: ObserverId) -> bool {
        let mut removed = false;
        for registrations in self.observers.write().values_mut() {
            let before = registrations.len();
            registrations.retain(|r| r.id != id);
            removed |= registrations.len() != before;
        }
        let mut errors = self.error_observers.write();
        let before = errors.len();
        errors.retain(|(observer_id, _)| *observer_id != id);
        removed || errors.len() != before
    }

    pub fn observer_count(&self, channel: Channel) -> usize {
        self.observers.read().get(&channel).map_or(0, Vec::len)
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats.read().clone()
    }

    /// Route one raw inbound frame. Never panics and never returns an error.
    pub fn dispatch(&self, raw: &str) -> DispatchOutcome {
        let frame: InboundFrame = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.write().malformed += 1;
                self.logger
                    .error(&format!("Dropping malformed frame ({}): {}", e, truncate(raw)));
                return DispatchOutcome::Malformed;
            }
        };

        let id = frame.id.and_then(instance_id);

        match frame.channel.as_str() {
            TAG_CONNECTION | TAG_SUBSCRIPTION_RESPONSE => {
                self.logger
                    .debug(&format!("Ignoring administrative frame: {}", frame.channel));
                return DispatchOutcome::Administrative;
            }
            TAG_ERROR => {
                let data = frame.data.unwrap_or(Value::Null);
                return self.dispatch_error(id, data);
            }
            _ => {}
        }

        let Some(channel) = Channel::from_tag(&frame.channel) else {
            self.stats.write().dropped += 1;
            self.logger
                .debug(&format!("Dropping frame for unknown channel: {}", frame.channel));
            return DispatchOutcome::Unrouted;
        };

        let data = match frame.data {
            Some(data) if !is_empty_payload(&data) => data,
            _ => {
                self.stats.write().dropped += 1;
                return DispatchOutcome::EmptyPayload;
            }
        };

        let message = ChannelMessage {
            channel,
            id,
            is_snapshot: frame.is_snapshot,
            data,
        };

        // Snapshot so observers may (un)register others while being called
        let targets: Vec<Registration> = self
            .observers
            .read()
            .get(&channel)
            .map(|registrations| {
                registrations
                    .iter()
                    .filter(|r| match (&r.instance, &message.id) {
                        (None, _) => true,
                        (Some(wanted), Some(actual)) => wanted == actual,
                        (Some(_), None) => false,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let mut failures = 0;
        for registration in &targets {
            let result = catch_unwind(AssertUnwindSafe(|| (registration.observer)(&message)));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    self.logger.error(&format!(
                        "Observer {} failed on {} frame: {:#}",
                        registration.id,
                        channel.as_str(),
                        e
                    ));
                }
                Err(panic) => {
                    failures += 1;
                    self.logger.error(&format!(
                        "Observer {} panicked on {} frame: {}",
                        registration.id,
                        channel.as_str(),
                        panic_message(panic.as_ref())
                    ));
                }
            }
        }

        let mut stats = self.stats.write();
        stats.delivered += 1;
        stats.observer_failures += failures;

        DispatchOutcome::Delivered {
            observers: targets.len(),
        }
    }

    fn dispatch_error(&self, id: Option<String>, data: Value) -> DispatchOutcome {
        let message = match &data {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| data.to_string()),
            other => other.to_string(),
        };
        let error = ServerError { id, message, data };

        let targets: Vec<ErrorObserver> = self
            .error_observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        if targets.is_empty() {
            self.logger
                .warn(&format!("Server reported an error: {}", error.message));
        }

        for observer in &targets {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| observer(&error))) {
                self.stats.write().observer_failures += 1;
                self.logger.error(&format!(
                    "Error observer panicked: {}",
                    panic_message(panic.as_ref())
                ));
            }
        }

        self.stats.write().delivered += 1;
        DispatchOutcome::Delivered {
            observers: targets.len(),
        }
    }
}

fn instance_id(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn truncate(raw: &str) -> &str {
    match raw.char_indices().nth(200) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}
