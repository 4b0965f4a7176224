use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::ClientVariant;
use crate::error::ClientError;
use crate::protocol::{InboundEvent, OutboundMessage, parse_inbound};

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl ConnectionStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::Error => "Connection error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Status(ConnectionStatus),
    Inbound(InboundEvent),
    TransportError(String),
}

/// Fixed delay between a close and the next connect attempt. The delay never grows and
/// attempts never stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    delay: Duration,
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn for_variant(variant: ClientVariant) -> Self {
        match variant {
            ClientVariant::Report => Self::fixed(Duration::from_secs(1)),
            ClientVariant::Transcript => Self::fixed(Duration::from_secs(3)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Maps the page-style origin the server is hosted at to its channel endpoint.
pub fn endpoint_url(origin: &str, path: &str) -> Result<String, ClientError> {
    let origin = origin.trim();
    let (scheme, rest) = if let Some(rest) = origin.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = origin.strip_prefix("http://") {
        ("ws", rest)
    } else if let Some((scheme, _)) = origin.split_once("://") {
        return Err(ClientError::InvalidOrigin {
            origin: origin.to_string(),
            reason: format!("unsupported scheme '{scheme}'"),
        });
    } else {
        ("ws", origin)
    };
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(ClientError::InvalidOrigin {
            origin: origin.to_string(),
            reason: "missing host".to_string(),
        });
    }
    let path = path.trim();
    if path.starts_with('/') {
        Ok(format!("{scheme}://{host}{path}"))
    } else {
        Ok(format!("{scheme}://{host}/{path}"))
    }
}

/// Where submitted queries go; the connection manager in the binary, a recorder in tests.
pub trait QueryChannel {
    fn send_query(&self, message: &OutboundMessage) -> Result<(), ClientError>;
}

pub struct ConnectionManager {
    endpoint: String,
    policy: ReconnectPolicy,
    event_tx: Sender<ConnectionEvent>,
    event_rx: Receiver<ConnectionEvent>,
    outbound: Arc<Mutex<Option<UnboundedSender<String>>>>,
    shutdown: Arc<AtomicBool>,
    started: bool,
}

impl ConnectionManager {
    pub fn new(endpoint: impl Into<String>, policy: ReconnectPolicy) -> Self {
        let (event_tx, event_rx) = mpsc::channel();
        Self {
            endpoint: endpoint.into(),
            policy,
            event_tx,
            event_rx,
            outbound: Arc::new(Mutex::new(None)),
            shutdown: Arc::new(AtomicBool::new(false)),
            started: false,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Starts the background channel. Calling it again is a no-op; the channel reconnects on
    /// its own for the lifetime of the manager.
    pub fn connect(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        let endpoint = self.endpoint.clone();
        let policy = self.policy;
        let tx = self.event_tx.clone();
        let outbound = self.outbound.clone();
        let shutdown = self.shutdown.clone();
        thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    warn!(error = %err, "failed to start connection runtime");
                    let _ = tx.send(ConnectionEvent::TransportError(err.to_string()));
                    let _ = tx.send(ConnectionEvent::Status(ConnectionStatus::Error));
                    return;
                }
            };
            runtime.block_on(run_channel(endpoint, policy, tx, outbound, shutdown));
        });
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.outbound
            .lock()
            .ok()
            .is_some_and(|slot| slot.as_ref().is_some_and(|tx| !tx.is_closed()))
    }

    /// Hands one message to the open channel. Nothing is queued while the channel is down.
    pub fn send(&self, message: &OutboundMessage) -> Result<(), ClientError> {
        let slot = self.outbound.lock().map_err(|_| ClientError::NotConnected)?;
        let Some(tx) = slot.as_ref().filter(|tx| !tx.is_closed()) else {
            return Err(ClientError::NotConnected);
        };
        let text = message.to_json()?;
        debug!(bytes = text.len(), "sending query");
        tx.send(text).map_err(|_| ClientError::NotConnected)
    }

    pub fn drain_events_limited(&self, max_events: usize) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        while events.len() < max_events {
            let Ok(event) = self.event_rx.try_recv() else {
                break;
            };
            events.push(event);
        }
        events
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<ConnectionEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl QueryChannel for ConnectionManager {
    fn send_query(&self, message: &OutboundMessage) -> Result<(), ClientError> {
        self.send(message)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

async fn run_channel(
    endpoint: String,
    policy: ReconnectPolicy,
    tx: Sender<ConnectionEvent>,
    outbound: Arc<Mutex<Option<UnboundedSender<String>>>>,
    shutdown: Arc<AtomicBool>,
) {
    let mut attempt: u64 = 0;
    while !shutdown.load(Ordering::SeqCst) {
        attempt += 1;
        if tx
            .send(ConnectionEvent::Status(ConnectionStatus::Connecting))
            .is_err()
        {
            return;
        }
        debug!(endpoint = %endpoint, attempt, "connecting");

        match connect_async(endpoint.as_str()).await {
            Ok((stream, _)) => {
                info!(endpoint = %endpoint, "channel open");
                let (mut sink, mut source) = stream.split();
                let (out_tx, mut out_rx) = unbounded_channel::<String>();
                set_outbound(&outbound, Some(out_tx));
                if tx
                    .send(ConnectionEvent::Status(ConnectionStatus::Connected))
                    .is_err()
                {
                    set_outbound(&outbound, None);
                    return;
                }

                let mut ticker = tokio::time::interval(SHUTDOWN_POLL);
                loop {
                    tokio::select! {
                        frame = source.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                if tx.send(ConnectionEvent::Inbound(parse_inbound(&text))).is_err() {
                                    set_outbound(&outbound, None);
                                    return;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                warn!(error = %err, "channel read failed");
                                let _ = tx.send(ConnectionEvent::TransportError(err.to_string()));
                                break;
                            }
                        },
                        outgoing = out_rx.recv() => match outgoing {
                            Some(text) => {
                                if let Err(err) = sink.send(Message::Text(text)).await {
                                    warn!(error = %err, "channel write failed");
                                    let _ = tx.send(ConnectionEvent::TransportError(err.to_string()));
                                    break;
                                }
                            }
                            None => break,
                        },
                        _ = ticker.tick() => {
                            if shutdown.load(Ordering::SeqCst) {
                                let _ = sink.close().await;
                                set_outbound(&outbound, None);
                                return;
                            }
                        }
                    }
                }
                set_outbound(&outbound, None);
                info!(endpoint = %endpoint, "channel closed");
            }
            Err(err) => {
                warn!(endpoint = %endpoint, error = %err, "connect failed");
                let _ = tx.send(ConnectionEvent::TransportError(err.to_string()));
            }
        }

        if tx
            .send(ConnectionEvent::Status(ConnectionStatus::Disconnected))
            .is_err()
        {
            return;
        }
        debug!(delay_ms = policy.delay().as_millis() as u64, "reconnect scheduled");
        sleep_unless_shutdown(policy.delay(), &shutdown).await;
    }
}

fn set_outbound(
    outbound: &Arc<Mutex<Option<UnboundedSender<String>>>>,
    value: Option<UnboundedSender<String>>,
) {
    if let Ok(mut slot) = outbound.lock() {
        *slot = value;
    }
}

async fn sleep_unless_shutdown(delay: Duration, shutdown: &AtomicBool) {
    let deadline = tokio::time::Instant::now() + delay;
    while tokio::time::Instant::now() < deadline {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        tokio::time::sleep(remaining.min(SHUTDOWN_POLL)).await;
    }
}

#[cfg(test)]
#[path = "../tests/unit/connection_tests.rs"]
mod tests;
