//! Live transport: one websocket per open room.
//!
//! A [`Connector`] hands back a [`TransportHandle`] immediately and performs
//! the handshake in a background task. Everything the task observes is
//! reported as a [`TransportEvent`]; dropping the handle ends the task.

use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake finished.
    Ready,
    /// An inbound text frame, not yet parsed.
    Frame(String),
    Error(String),
    Closed,
}

/// The session's end of a transport.
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// The transport task's end of a [`TransportHandle`].
pub struct TransportRemote {
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportHandle {
    pub fn pair() -> (TransportHandle, TransportRemote) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            TransportHandle {
                outbound: outbound_tx,
                events: events_rx,
            },
            TransportRemote {
                outbound: outbound_rx,
                events: events_tx,
            },
        )
    }

    /// Queue an outbound text frame. Fails once the transport task is gone.
    pub fn send(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }

    /// `None` once the transport task has exited.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}

/// Opens a transport for a room.
pub trait Connector: Send + 'static {
    fn connect(&self, room_id: &str, token: &str) -> TransportHandle;
}

#[derive(Debug, Clone)]
pub struct WsConnector {
    base_url: String,
}

impl WsConnector {
    /// Example: `WsConnector::new("ws://localhost:8080")`
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/ws/{room_id}?token={token}`
    pub fn room_url(&self, room_id: &str, token: &str) -> Option<Url> {
        let mut url = Url::parse(&self.base_url).ok()?;
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .push("ws")
            .push(room_id);
        url.query_pairs_mut().append_pair("token", token);
        Some(url)
    }
}

impl Connector for WsConnector {
    fn connect(&self, room_id: &str, token: &str) -> TransportHandle {
        let (handle, remote) = TransportHandle::pair();
        match self.room_url(room_id, token) {
            Some(url) => {
                tracing::debug!(room_id, "opening websocket");
                tokio::spawn(run(url, remote));
            }
            None => {
                let reason = format!("invalid websocket url {}", self.base_url);
                let _ = remote.events.send(TransportEvent::Error(reason));
            }
        }
        handle
    }
}

async fn run(url: Url, remote: TransportRemote) {
    let TransportRemote {
        mut outbound,
        events,
    } = remote;

    let stream = tokio::select! {
        result = connect_async(url.as_str()) => match result {
            Ok((stream, _)) => stream,
            Err(err) => {
                let _ = events.send(TransportEvent::Error(err.to_string()));
                return;
            }
        },
        _ = events.closed() => {
            tracing::debug!("transport released during handshake");
            return;
        }
    };

    if events.send(TransportEvent::Ready).is_err() {
        return;
    }

    let (mut sink, mut stream) = stream.split();
    loop {
        tokio::select! {
            text = outbound.recv() => match text {
                Some(text) => {
                    if let Err(err) = sink.send(WsMessage::Text(text)).await {
                        let _ = events.send(TransportEvent::Error(err.to_string()));
                        break;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    let _ = events.send(TransportEvent::Frame(text));
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    let _ = events.send(TransportEvent::Closed);
                    break;
                }
                Some(Ok(other)) => {
                    tracing::debug!(kind = ?other, "ignoring non-text frame");
                }
                Some(Err(err)) => {
                    let _ = events.send(TransportEvent::Error(err.to_string()));
                    break;
                }
            },
        }
    }
    tracing::debug!("websocket task finished");
}
