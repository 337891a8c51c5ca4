//! Duplex transport contract the subscription engine runs on

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::SdkResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Event emitted by a transport to its listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    /// Unsolicited close with an optional reason
    Closed(Option<String>),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection and wait for the handshake to complete
    async fn connect(&self, url: &str) -> SdkResult<()>;

    /// Close the connection. Does not emit [`TransportEvent::Closed`].
    async fn disconnect(&self);

    /// Queue a text frame; fails with `NotConnected` unless the state is `Open`
    async fn send(&self, message: String) -> SdkResult<()>;

    fn state(&self) -> ConnectionState;

    fn events(&self) -> broadcast::Receiver<TransportEvent>;
}
