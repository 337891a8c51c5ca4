//! Test helpers for SDK integration tests
//!
//! `MockTransport` stands in for the WebSocket: tests script connect
//! failures, inject inbound frames and drops, and inspect what was sent.
#![allow(dead_code)]

use async_trait::async_trait;
use dex_sdk::logger::NoopLogger;
use dex_sdk::{
    ConnectionState, SdkConfig, SdkError, SdkResult, SubscriptionEngine, Transport, TransportEvent,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub const TEST_URL: &str = "ws://mock.invalid/ws";

pub struct MockTransport {
    state: Mutex<ConnectionState>,
    events: broadcast::Sender<TransportEvent>,
    sent: Mutex<Vec<String>>,
    connects: AtomicUsize,
    failures_remaining: AtomicUsize,
    // Some(report_failure) drops the link inside the next send
    drop_on_send: Mutex<Option<bool>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            state: Mutex::new(ConnectionState::Closed),
            events,
            sent: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(0),
            drop_on_send: Mutex::new(None),
        })
    }

    /// Make the next `n` connect calls fail
    pub fn fail_next_connects(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Drop the link while the next frame is being sent; the send itself
    /// reports success and the frame is lost
    pub fn drop_during_next_send(&self) {
        *self.drop_on_send.lock() = Some(false);
    }

    /// Drop the link while the next frame is being sent and fail the send
    pub fn fail_during_next_send(&self) {
        *self.drop_on_send.lock() = Some(true);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Every frame sent so far, parsed
    pub fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|raw| serde_json::from_str(raw).expect("engine sent invalid JSON"))
            .collect()
    }

    /// Subscription payloads of frames sent with the given method
    pub fn sent_with_method(&self, method: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|frame| frame["method"] == method)
            .map(|frame| frame["subscription"].clone())
            .collect()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }

    /// Simulate the server dropping the connection
    pub fn drop_connection(&self, reason: &str) {
        *self.state.lock() = ConnectionState::Closed;
        let _ = self
            .events
            .send(TransportEvent::Closed(Some(reason.to_string())));
    }

    /// Simulate an inbound frame
    pub fn push_message(&self, raw: &str) {
        let _ = self.events.send(TransportEvent::Message(raw.to_string()));
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, _url: &str) -> SdkResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = ConnectionState::Connecting;

        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            *self.state.lock() = ConnectionState::Closed;
            return Err(SdkError::ConnectionError("connection refused".to_string()));
        }

        *self.state.lock() = ConnectionState::Open;
        let _ = self.events.send(TransportEvent::Opened);
        Ok(())
    }

    async fn disconnect(&self) {
        *self.state.lock() = ConnectionState::Closed;
    }

    async fn send(&self, message: String) -> SdkResult<()> {
        let drop_mode = self.drop_on_send.lock().take();
        if let Some(report_failure) = drop_mode {
            self.drop_connection("connection reset mid-send");
            tokio::task::yield_now().await;
            return if report_failure {
                Err(SdkError::NotConnected)
            } else {
                Ok(())
            };
        }
        if *self.state.lock() != ConnectionState::Open {
            return Err(SdkError::NotConnected);
        }
        self.sent.lock().push(message);
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}

pub fn test_config() -> SdkConfig {
    SdkConfig {
        ws_url: TEST_URL.to_string(),
        ..SdkConfig::default()
    }
}

/// Engine on a fresh mock transport with the default backoff schedule
pub fn engine_with_mock() -> (SubscriptionEngine, Arc<MockTransport>) {
    let transport = MockTransport::new();
    let engine = SubscriptionEngine::new(
        TEST_URL,
        transport.clone(),
        &test_config(),
        Arc::new(NoopLogger),
    );
    (engine, transport)
}

/// Poll `condition` every 10ms, giving up after `limit`.
///
/// Works under a paused clock too, where each sleep auto-advances time.
pub async fn wait_for<F: Fn() -> bool>(limit: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
