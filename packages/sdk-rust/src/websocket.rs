use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::config::SdkConfig;
use crate::error::{SdkError, SdkResult};
use crate::logger::{LogFacade, Logger};
use crate::transport::{ConnectionState, Transport, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

struct Live {
    outbound: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

struct Shared {
    // Bumped on every connect/disconnect so a superseded task stays silent
    generation: u64,
    state: ConnectionState,
    live: Option<Live>,
}

/// WebSocket transport over tokio-tungstenite
pub struct WsTransport {
    ping_interval: Duration,
    pong_timeout: Duration,
    events: broadcast::Sender<TransportEvent>,
    shared: Arc<Mutex<Shared>>,
    logger: Arc<dyn Logger>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::from_config(&SdkConfig::default())
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            ping_interval: config.ping_interval(),
            pong_timeout: config.pong_timeout(),
            events,
            shared: Arc::new(Mutex::new(Shared {
                generation: 0,
                state: ConnectionState::Closed,
                live: None,
            })),
            logger: Arc::new(LogFacade),
        }
    }

    /// Report connection lifecycle through `logger` instead of the `log` facade
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Override the keepalive settings
    pub fn with_ping_config(mut self, ping_interval: Duration, pong_timeout: Duration) -> Self {
        self.ping_interval = ping_interval;
        self.pong_timeout = pong_timeout;
        self
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, url: &str) -> SdkResult<()> {
        let (generation, previous) = {
            let mut shared = self.shared.lock();
            shared.generation += 1;
            shared.state = ConnectionState::Connecting;
            (shared.generation, shared.live.take())
        };
        if let Some(previous) = previous {
            previous.task.abort();
        }

        let stream = match connect_async(url).await {
            Ok((stream, _)) => stream,
            Err(e) => {
                let mut shared = self.shared.lock();
                if shared.generation == generation {
                    shared.state = ConnectionState::Closed;
                }
                return Err(SdkError::WebSocketError(e.to_string()));
            }
        };

        let (outbound, rx) = mpsc::unbounded_channel();
        {
            let mut shared = self.shared.lock();
            if shared.generation != generation {
                // A disconnect or newer connect won the race
                return Err(SdkError::ConnectionError(
                    "connection superseded while opening".to_string(),
                ));
            }
            let task = tokio::spawn(run_connection(
                stream,
                rx,
                generation,
                self.ping_interval,
                self.pong_timeout,
                Arc::clone(&self.shared),
                self.events.clone(),
                Arc::clone(&self.logger),
            ));
            shared.live = Some(Live { outbound, task });
            shared.state = ConnectionState::Open;
        }

        self.logger.debug(&format!("WebSocket connected to {}", url));
        let _ = self.events.send(TransportEvent::Opened);
        Ok(())
    }

    async fn disconnect(&self) {
        let live = {
            let mut shared = self.shared.lock();
            shared.generation += 1;
            if shared.live.is_some() {
                shared.state = ConnectionState::Closing;
            }
            shared.live.take()
        };

        if let Some(Live { outbound, mut task }) = live {
            let _ = outbound.send(Message::Close(None));
            drop(outbound);
            if tokio::time::timeout(DISCONNECT_GRACE, &mut task).await.is_err() {
                task.abort();
            }
        }

        let mut shared = self.shared.lock();
        if shared.live.is_none() {
            shared.state = ConnectionState::Closed;
        }
    }

    async fn send(&self, message: String) -> SdkResult<()> {
        let shared = self.shared.lock();
        match (&shared.state, &shared.live) {
            (ConnectionState::Open, Some(live)) => live
                .outbound
                .send(Message::Text(message.into()))
                .map_err(|_| SdkError::NotConnected),
            _ => Err(SdkError::NotConnected),
        }
    }

    fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        let mut shared = self.shared.lock();
        shared.generation += 1;
        if let Some(live) = shared.live.take() {
            live.task.abort();
        }
    }
}

async fn run_connection(
    stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    generation: u64,
    ping_interval: Duration,
    pong_timeout: Duration,
    shared: Arc<Mutex<Shared>>,
    events: broadcast::Sender<TransportEvent>,
    logger: Arc<dyn Logger>,
) {
    let (mut write, mut read) = stream.split();
    let mut ping_timer = interval(ping_interval);
    ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ping_timer.tick().await;
    let mut last_pong = Instant::now();

    let reason: Option<String> = loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Message(text.to_string()));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => {
                        let _ = events.send(TransportEvent::Message(text));
                    }
                    Err(_) => logger.debug("Ignoring non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(e) = write.send(Message::Pong(payload)).await {
                        break Some(e.to_string());
                    }
                }
                Some(Ok(Message::Pong(_))) => last_pong = Instant::now(),
                Some(Ok(Message::Close(frame))) => {
                    break frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => break Some(e.to_string()),
                None => break None,
            },
            message = outbound.recv() => match message {
                Some(message) => {
                    let closing = matches!(message, Message::Close(_));
                    if let Err(e) = write.send(message).await {
                        break Some(e.to_string());
                    }
                    if closing {
                        break None;
                    }
                }
                None => break None,
            },
            _ = ping_timer.tick() => {
                if last_pong.elapsed() > pong_timeout {
                    break Some("no pong received within timeout".to_string());
                }
                if let Err(e) = write.send(Message::Ping(Vec::new().into())).await {
                    break Some(e.to_string());
                }
            }
        }
    };

    let unsolicited = {
        let mut shared = shared.lock();
        if shared.generation == generation {
            shared.state = ConnectionState::Closed;
            shared.live = None;
            true
        } else {
            false
        }
    };

    if unsolicited {
        logger.debug(&format!(
            "WebSocket closed: {}",
            reason.as_deref().unwrap_or("no reason")
        ));
        let _ = events.send(TransportEvent::Closed(reason));
    }
}
