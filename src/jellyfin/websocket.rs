//! Reconnecting event channel on the server's `/socket` endpoint.

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace, warn};
use url::Url;

use super::api::redact_url;
use super::ws_incoming_handler::{parse_message, InboundMessage};
use crate::player::PlayerCommand;

pub(crate) const WS_LOG_TARGET: &str = "r_jellyshim::jellyfin::websocket";

const KEEPALIVE_MESSAGE: &str = r#"{"MessageType":"KeepAlive"}"#;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("Websocket transport error: {0}")]
    Transport(String),
    #[error("Gave up connecting after {attempts} attempts")]
    ConnectionExhausted { attempts: u32 },
    #[error("Invalid websocket URL: {0}")]
    InvalidUrl(String),
    #[error("Event channel closed")]
    Closed,
}

impl From<tungstenite::Error> for ChannelError {
    fn from(err: tungstenite::Error) -> Self {
        ChannelError::Transport(err.to_string())
    }
}

impl From<url::ParseError> for ChannelError {
    fn from(err: url::ParseError) -> Self {
        ChannelError::InvalidUrl(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: Url,
    pub keepalive_interval: Duration,
    pub connect_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Consecutive failed attempts before the channel gives up.
    pub max_attempts: u32,
}

impl ChannelConfig {
    pub fn new(url: Url) -> Self {
        ChannelConfig {
            url,
            keepalive_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            max_attempts: 10,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Events delivered to the consumer, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A connection was established; `connection` counts from 1.
    Connected { connection: u64 },
    Directive(PlayerCommand),
    KeepAlive,
    /// Terminal. Nothing follows it.
    Failed(ChannelError),
}

/// Observable reconnect state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelState {
    pub connections: u64,
    pub exhausted: Option<u32>,
    pub closed: bool,
}

pub struct EventChannel {
    cancel: CancellationToken,
    state_rx: watch::Receiver<ChannelState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

enum ConnectionEnd {
    Lost(String),
    Cancelled,
    ReceiverGone,
}

impl EventChannel {
    /// Spawns the connection task. Events arrive on the returned receiver.
    pub fn start(config: ChannelConfig) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ChannelState::default());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_channel(config, events_tx, state_tx, cancel.clone()));

        let channel = EventChannel {
            cancel,
            state_rx,
            task: Mutex::new(Some(task)),
        };
        (channel, events_rx)
    }

    /// Resolves once the first connection is up.
    pub async fn ready(&self) -> Result<(), ChannelError> {
        let mut rx = self.state_rx.clone();
        loop {
            {
                let state = rx.borrow_and_update();
                if state.connections > 0 {
                    return Ok(());
                }
                if let Some(attempts) = state.exhausted {
                    return Err(ChannelError::ConnectionExhausted { attempts });
                }
                if state.closed {
                    return Err(ChannelError::Closed);
                }
            }
            if rx.changed().await.is_err() {
                return Err(ChannelError::Closed);
            }
        }
    }

    pub fn state(&self) -> watch::Receiver<ChannelState> {
        self.state_rx.clone()
    }

    /// Stops the connection task and waits for it. Safe to call more than once.
    pub async fn close(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(target: WS_LOG_TARGET, "Event channel task ended abnormally: {}", e);
            }
            debug!(target: WS_LOG_TARGET, "Event channel closed");
        }
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[instrument(skip_all, fields(url = %redact_url(config.url.as_str())))]
async fn run_channel(
    config: ChannelConfig,
    events: mpsc::UnboundedSender<ChannelEvent>,
    state: watch::Sender<ChannelState>,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    let mut delay = config.initial_backoff;

    loop {
        let connect = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = tokio::time::timeout(config.connect_timeout, connect_async(config.url.as_str())) => result,
        };

        match connect {
            Ok(Ok((stream, _response))) => {
                attempt = 0;
                delay = config.initial_backoff;
                let mut connection = 0;
                state.send_modify(|s| {
                    s.connections += 1;
                    connection = s.connections;
                });
                info!(target: WS_LOG_TARGET, connection, "WebSocket connected");
                if events.send(ChannelEvent::Connected { connection }).is_err() {
                    break;
                }
                match run_connection(stream, &config, &events, &cancel).await {
                    ConnectionEnd::Cancelled | ConnectionEnd::ReceiverGone => break,
                    ConnectionEnd::Lost(reason) => {
                        warn!(target: WS_LOG_TARGET, connection, "WebSocket connection lost: {}", reason);
                    }
                }
            }
            Ok(Err(e)) => {
                warn!(target: WS_LOG_TARGET, "WebSocket connect failed: {}", ChannelError::from(e));
            }
            Err(_) => {
                warn!(target: WS_LOG_TARGET, "WebSocket connect timed out after {:?}", config.connect_timeout);
            }
        }

        attempt += 1;
        if attempt >= config.max_attempts {
            error!(target: WS_LOG_TARGET, attempts = attempt, "Giving up on the event channel");
            state.send_modify(|s| s.exhausted = Some(attempt));
            let _ = events.send(ChannelEvent::Failed(ChannelError::ConnectionExhausted { attempts: attempt }));
            break;
        }

        warn!(
            target: WS_LOG_TARGET,
            "Reconnecting in {:?} (attempt {}/{})",
            delay,
            attempt,
            config.max_attempts
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(config.max_backoff);
    }

    state.send_modify(|s| s.closed = true);
    debug!(target: WS_LOG_TARGET, "Event channel task finished");
}

async fn run_connection(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    config: &ChannelConfig,
    events: &mpsc::UnboundedSender<ChannelEvent>,
    cancel: &CancellationToken,
) -> ConnectionEnd {
    let (mut sink, mut source) = stream.split();

    // The server only registers the session once it has seen a KeepAlive.
    send_keepalive(&mut sink).await;

    let mut period = config.keepalive_interval;
    let mut keepalive = interval_at(Instant::now() + period, period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                if let Err(e) = sink.close().await {
                    debug!(target: WS_LOG_TARGET, "Error closing websocket: {}", e);
                }
                return ConnectionEnd::Cancelled;
            }

            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    trace!(target: WS_LOG_TARGET, "Received WebSocket message text: {}", text);
                    match parse_message(&text) {
                        InboundMessage::Directive(command) => {
                            debug!(target: WS_LOG_TARGET, ?command, "Directive received");
                            if events.send(ChannelEvent::Directive(command)).is_err() {
                                return ConnectionEnd::ReceiverGone;
                            }
                        }
                        InboundMessage::KeepAlive { timeout_secs } => {
                            if let Some(secs) = timeout_secs.filter(|secs| *secs > 0) {
                                let half = Duration::from_secs(secs) / 2;
                                if half != period {
                                    debug!(target: WS_LOG_TARGET, "Keep-alive interval re-armed to {:?}", half);
                                    period = half;
                                    keepalive = interval_at(Instant::now() + period, period);
                                    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
                                }
                            }
                            if events.send(ChannelEvent::KeepAlive).is_err() {
                                return ConnectionEnd::ReceiverGone;
                            }
                        }
                        InboundMessage::Ignored => {}
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    trace!(target: WS_LOG_TARGET, "Received Ping, sending Pong");
                    if let Err(e) = sink.send(Message::Pong(data)).await {
                        warn!(target: WS_LOG_TARGET, "Failed to send pong: {}", e);
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    return ConnectionEnd::Lost(format!("closed by server ({:?})", frame));
                }
                Some(Ok(other)) => {
                    trace!(target: WS_LOG_TARGET, "Ignoring frame: {:?}", other);
                }
                Some(Err(e)) => return ConnectionEnd::Lost(e.to_string()),
                None => return ConnectionEnd::Lost("stream ended".to_string()),
            },

            _ = keepalive.tick() => send_keepalive(&mut sink).await,
        }
    }
}

async fn send_keepalive(sink: &mut WsSink) {
    trace!(target: WS_LOG_TARGET, "Sending KeepAlive");
    if let Err(e) = sink.send(Message::Text(KEEPALIVE_MESSAGE.to_string())).await {
        warn!(target: WS_LOG_TARGET, "Failed to send KeepAlive: {}", e);
    }
}
