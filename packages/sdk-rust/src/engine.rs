//! Reconnecting, ref-counted subscription engine
//!
//! Keeps one logical connection alive across drops. Every (re)connect is
//! followed by a resubscribe of everything in the registry, and unsolicited
//! closes are retried through the [`BackoffScheduler`] until `stop` is called.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::backoff::BackoffScheduler;
use crate::channels::ChannelDemultiplexer;
use crate::config::SdkConfig;
use crate::error::{SdkError, SdkResult};
use crate::logger::Logger;
use crate::subscription::{Acquired, Released, Subscription, SubscriptionId, SubscriptionRegistry, Topic};
use crate::transport::{ConnectionState, Transport, TransportEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Starting,
    Started,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub state: EngineState,
    pub connection: ConnectionState,
    pub subscriptions: usize,
    pub reconnecting: bool,
    pub reconnect_attempts: usize,
}

impl EngineStatus {
    /// Started and not in the middle of a reconnect
    pub fn is_ready(&self) -> bool {
        self.state == EngineState::Started && !self.reconnecting
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum Method {
    Subscribe,
    Unsubscribe,
}

#[derive(Serialize)]
struct ControlFrame<'a> {
    method: Method,
    subscription: &'a Value,
}

fn control_frame(method: Method, payload: &Value) -> SdkResult<String> {
    Ok(serde_json::to_string(&ControlFrame {
        method,
        subscription: payload,
    })?)
}

struct EngineInner {
    url: String,
    transport: Arc<dyn Transport>,
    backoff: BackoffScheduler,
    registry: tokio::sync::Mutex<SubscriptionRegistry>,
    state: Mutex<EngineState>,
    listener: Mutex<Option<JoinHandle<()>>>,
    // Reconnect loop started by `start` when the link drops mid-handshake
    recovery: Mutex<Option<JoinHandle<()>>>,
    reconnecting: AtomicBool,
    disposed: AtomicBool,
    channels: Arc<ChannelDemultiplexer>,
    logger: Arc<dyn Logger>,
}

impl EngineInner {
    fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// Transport connect followed by resubscribe-all
    async fn connect(&self) -> SdkResult<()> {
        self.transport.connect(&self.url).await?;

        let registry = self.registry.lock().await;
        let active = registry.active();
        for subscription in &active {
            let frame = control_frame(Method::Subscribe, &subscription.payload)?;
            self.transport.send(frame).await?;
        }
        if !active.is_empty() {
            self.logger
                .debug(&format!("Resubscribed {} subscription(s)", active.len()));
        }
        Ok(())
    }

    fn detach_listener(&self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
        if let Some(recovery) = self.recovery.lock().take() {
            recovery.abort();
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.detach_listener();
    }
}

/// Handle to a reconnecting subscription engine; clones share one engine
#[derive(Clone)]
pub struct SubscriptionEngine {
    inner: Arc<EngineInner>,
}

impl SubscriptionEngine {
    pub fn new(
        url: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: &SdkConfig,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let channels = Arc::new(ChannelDemultiplexer::new(Arc::clone(&logger)));
        Self {
            inner: Arc::new(EngineInner {
                url: url.into(),
                transport,
                backoff: BackoffScheduler::new(config.reconnect_timeouts(), config.reset_window()),
                registry: tokio::sync::Mutex::new(SubscriptionRegistry::new()),
                state: Mutex::new(EngineState::Stopped),
                listener: Mutex::new(None),
                recovery: Mutex::new(None),
                reconnecting: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                channels,
                logger,
            }),
        }
    }

    /// Connect and resubscribe. No-op while already starting or started.
    pub async fn start(&self) -> SdkResult<()> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(SdkError::Disposed);
        }

        {
            let mut state = self.inner.state.lock();
            if *state != EngineState::Stopped {
                return Ok(());
            }
            *state = EngineState::Starting;
        }

        self.attach_listener();
        self.inner.backoff.reset_counter();

        match self.inner.connect().await {
            Ok(()) => {
                let promoted = {
                    let mut state = self.inner.state.lock();
                    if *state == EngineState::Starting {
                        *state = EngineState::Started;
                        true
                    } else {
                        false
                    }
                };
                if !promoted {
                    // stop() ran while the handshake was in flight
                    self.inner.transport.disconnect().await;
                    return Err(SdkError::StartFailed(Box::new(SdkError::Cancelled)));
                }
                self.inner.logger.info(&format!("Connected to {}", self.inner.url));

                // A close seen while still starting was skipped by the listener
                if self.inner.transport.state() != ConnectionState::Open {
                    self.inner
                        .logger
                        .warn("Connection lost during start, scheduling reconnect");
                    let weak = Arc::downgrade(&self.inner);
                    let recovery = tokio::spawn(async move { reconnect(&weak).await });
                    if let Some(previous) = self.inner.recovery.lock().replace(recovery) {
                        previous.abort();
                    }
                }
                Ok(())
            }
            Err(e) => {
                self.inner.detach_listener();
                *self.inner.state.lock() = EngineState::Stopped;
                self.inner.transport.disconnect().await;
                self.inner
                    .logger
                    .error(&format!("Failed to connect to {}: {}", self.inner.url, e));
                Err(SdkError::StartFailed(Box::new(e)))
            }
        }
    }

    /// Disconnect, cancel pending reconnects and drop all subscriptions.
    /// Idempotent; the engine can be started again afterwards.
    pub async fn stop(&self) {
        if self.inner.disposed.load(Ordering::Acquire) {
            return;
        }
        self.shutdown().await;
        self.inner.backoff.cancel();
    }

    /// Stop permanently. Later `start` calls fail with [`SdkError::Disposed`].
    pub async fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.backoff.dispose();
        self.shutdown().await;
    }

    async fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.inner.state.lock(), EngineState::Stopped);
        self.inner.detach_listener();
        self.inner.backoff.cancel();
        self.inner.reconnecting.store(false, Ordering::Release);

        if previous != EngineState::Stopped
            || self.inner.transport.state() != ConnectionState::Closed
        {
            self.inner.transport.disconnect().await;
        }
        self.inner.registry.lock().await.clear();

        if previous != EngineState::Stopped {
            self.inner.logger.info("Subscription engine stopped");
        }
    }

    /// Subscribe to a topic, sharing the upstream subscription with any
    /// existing caller of the same topic
    pub async fn subscribe(&self, topic: Topic) -> SdkResult<SubscriptionId> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(SdkError::Disposed);
        }
        topic.validate()?;

        let mut registry = self.inner.registry.lock().await;
        let acquired = registry.acquire(&topic)?;
        if let Acquired::Created(subscription) = &acquired {
            // Anything not sent here is covered by the next resubscribe-all
            if self.inner.transport.state() == ConnectionState::Open {
                let frame = control_frame(Method::Subscribe, &subscription.payload)?;
                if let Err(e) = self.inner.transport.send(frame).await {
                    self.inner.logger.warn(&format!(
                        "Deferred subscribe for {}: {}",
                        subscription.canonical_key, e
                    ));
                }
            }
        }
        Ok(acquired.subscription().id)
    }

    /// Release one reference to a topic. Returns `true` only when the last
    /// reference went away and the upstream subscription was dropped.
    pub async fn unsubscribe(&self, topic: &Topic) -> SdkResult<bool> {
        let mut registry = self.inner.registry.lock().await;
        match registry.release(topic)? {
            Released::Removed(subscription) => {
                if self.inner.transport.state() == ConnectionState::Open {
                    let frame = control_frame(Method::Unsubscribe, &subscription.payload)?;
                    if let Err(e) = self.inner.transport.send(frame).await {
                        self.inner.logger.warn(&format!(
                            "Unsubscribe for {} not sent: {}",
                            subscription.canonical_key, e
                        ));
                    }
                }
                Ok(true)
            }
            Released::Retained { .. } | Released::NotFound => Ok(false),
        }
    }

    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.inner.registry.lock().await.active()
    }

    pub async fn status(&self) -> EngineStatus {
        let subscriptions = self.inner.registry.lock().await.len();
        EngineStatus {
            state: self.inner.state(),
            connection: self.inner.transport.state(),
            subscriptions,
            reconnecting: self.inner.reconnecting.load(Ordering::Acquire),
            reconnect_attempts: self.inner.backoff.attempt_count(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.inner.state()
    }

    pub fn channels(&self) -> Arc<ChannelDemultiplexer> {
        Arc::clone(&self.inner.channels)
    }

    pub fn is_reconnecting(&self) -> bool {
        self.inner.reconnecting.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    fn attach_listener(&self) {
        let events = self.inner.transport.events();
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(listen(events, weak));
        if let Some(previous) = self.inner.listener.lock().replace(handle) {
            previous.abort();
        }
    }
}

async fn listen(
    mut events: tokio::sync::broadcast::Receiver<TransportEvent>,
    weak: Weak<EngineInner>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                if let Some(inner) = weak.upgrade() {
                    inner
                        .logger
                        .warn(&format!("Listener lagged, {} transport events dropped", skipped));
                }
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let Some(inner) = weak.upgrade() else { break };
        match event {
            TransportEvent::Message(raw) => {
                inner.channels.dispatch(&raw);
            }
            TransportEvent::Opened => inner.logger.debug("Transport opened"),
            TransportEvent::Closed(reason) => {
                if inner.state() != EngineState::Started {
                    continue;
                }
                // Queued behind a reconnect that has since succeeded
                if inner.transport.state() == ConnectionState::Open {
                    inner
                        .logger
                        .debug("Ignoring close of a superseded connection");
                    continue;
                }
                inner.logger.warn(&format!(
                    "Connection lost ({}), scheduling reconnect",
                    reason.as_deref().unwrap_or("no reason")
                ));
                drop(inner);
                reconnect(&weak).await;
            }
        }
    }
}

/// Retry connect through the backoff scheduler until it succeeds or the
/// engine stops. At most one loop runs at a time.
async fn reconnect(weak: &Weak<EngineInner>) {
    {
        let Some(inner) = weak.upgrade() else { return };
        if inner
            .reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
    }

    loop {
        let attempt = {
            let Some(inner) = weak.upgrade() else { return };
            if inner.state() != EngineState::Started {
                inner.reconnecting.store(false, Ordering::Release);
                return;
            }
            inner.logger.debug(&format!(
                "Reconnect attempt {} in {:?}",
                inner.backoff.attempt_count() + 1,
                inner.backoff.next_delay()
            ));

            let target = weak.clone();
            inner.backoff.schedule(move || async move {
                match target.upgrade() {
                    Some(inner) => inner.connect().await,
                    None => Err(SdkError::Disposed),
                }
            })
        };

        let result = attempt.await;
        let Some(inner) = weak.upgrade() else { return };
        match result {
            Ok(()) => {
                inner.reconnecting.store(false, Ordering::Release);
                inner.logger.info(&format!("Reconnected to {}", inner.url));
                return;
            }
            Err(SdkError::Cancelled) | Err(SdkError::Disposed) => {
                inner.reconnecting.store(false, Ordering::Release);
                return;
            }
            Err(e) => {
                inner.logger.warn(&format!("Reconnect failed: {}", e));
            }
        }
    }
}
