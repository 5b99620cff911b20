//! Connection lifecycle for the open room.
//!
//! ```text
//! disconnected --open--> connecting --ready--> connected
//!      ^                     |                     |
//!      +----error/closed-----+-----error/closed----+
//! ```
//!
//! Nothing reconnects on its own; a disconnected connection stays inert
//! until the caller opens it again.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::ws::{Connector, TransportEvent, TransportHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

pub struct Connection {
    status: watch::Sender<ConnectionStatus>,
    transport: Option<TransportHandle>,
}

impl Connection {
    pub fn new() -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            status,
            transport: None,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Close any current transport and start a new one.
    ///
    /// With an empty room id or token nothing is created and the status
    /// stays `Disconnected`. Returns whether a transport was started.
    pub fn open<C: Connector>(&mut self, connector: &C, room_id: &str, token: &str) -> bool {
        self.close();
        if room_id.is_empty() || token.is_empty() {
            tracing::debug!(
                room_id,
                has_token = !token.is_empty(),
                "not connecting without room and token"
            );
            return false;
        }

        self.transport = Some(connector.connect(room_id, token));
        self.set_status(ConnectionStatus::Connecting);
        true
    }

    /// Release the transport. Safe to call in any state, any number of times.
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            tracing::debug!(status = %self.status(), "transport released");
        }
        self.set_status(ConnectionStatus::Disconnected);
    }

    /// Advance the state machine. Returns the frame text for `Frame` events.
    pub fn on_event(&mut self, event: TransportEvent) -> Option<String> {
        match event {
            TransportEvent::Ready => {
                if self.status() == ConnectionStatus::Connecting {
                    self.set_status(ConnectionStatus::Connected);
                }
                None
            }
            TransportEvent::Frame(text) => Some(text),
            TransportEvent::Error(reason) => {
                tracing::warn!(%reason, "transport error");
                self.close();
                None
            }
            TransportEvent::Closed => {
                tracing::info!("transport closed");
                self.close();
                None
            }
        }
    }

    /// Wait for the next transport event. Pends forever without a transport,
    /// and reports `Closed` if the transport task went away silently.
    pub async fn next_event(&mut self) -> TransportEvent {
        match self.transport.as_mut() {
            Some(transport) => transport
                .next_event()
                .await
                .unwrap_or(TransportEvent::Closed),
            None => std::future::pending().await,
        }
    }

    /// Hand an encoded frame to the transport.
    pub(crate) fn forward(&self, frame: String) -> bool {
        self.transport
            .as_ref()
            .is_some_and(|transport| transport.send(frame))
    }

    fn set_status(&self, status: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            tracing::debug!(from = %current, to = %status, "connection status");
            *current = status;
            true
        });
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use super::super::ws::TransportRemote;
    use super::*;

    /// Connector whose transports are driven by the test.
    #[derive(Clone, Default)]
    pub(crate) struct FakeConnector {
        pub(crate) remotes: Arc<Mutex<Vec<(String, TransportRemote)>>>,
    }

    impl FakeConnector {
        pub(crate) fn connects(&self) -> usize {
            self.remotes.lock().unwrap().len()
        }

        pub(crate) fn take(&self, index: usize) -> (String, TransportRemote) {
            let mut remotes = self.remotes.lock().unwrap();
            let (room, remote) = &mut remotes[index];
            let (_, placeholder) = TransportHandle::pair();
            (room.clone(), std::mem::replace(remote, placeholder))
        }
    }

    impl Connector for FakeConnector {
        fn connect(&self, room_id: &str, _token: &str) -> TransportHandle {
            let (handle, remote) = TransportHandle::pair();
            self.remotes.lock().unwrap().push((room_id.to_string(), remote));
            handle
        }
    }

    #[test]
    fn open_without_room_or_token_is_noop() {
        let connector = FakeConnector::default();
        let mut connection = Connection::new();

        assert!(!connection.open(&connector, "", "token"));
        assert!(!connection.open(&connector, "room", ""));

        assert_eq!(connection.status(), ConnectionStatus::Disconnected);
        assert_eq!(connector.connects(), 0);
    }

    #[test]
    fn ready_then_closed() {
        let connector = FakeConnector::default();
        let mut connection = Connection::new();

        assert!(connection.open(&connector, "room", "token"));
        assert_eq!(connection.status(), ConnectionStatus::Connecting);

        connection.on_event(TransportEvent::Ready);
        assert_eq!(connection.status(), ConnectionStatus::Connected);

        connection.on_event(TransportEvent::Closed);
        assert_eq!(connection.status(), ConnectionStatus::Disconnected);
        assert!(!connection.forward("{}".to_string()));
    }

    #[test]
    fn error_while_connecting_disconnects() {
        let connector = FakeConnector::default();
        let mut connection = Connection::new();
        connection.open(&connector, "room", "token");

        connection.on_event(TransportEvent::Error("handshake failed".to_string()));
        assert_eq!(connection.status(), ConnectionStatus::Disconnected);

        // a late ready from a released transport does not revive it
        connection.on_event(TransportEvent::Ready);
        assert_eq!(connection.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn frames_pass_through_without_status_change() {
        let connector = FakeConnector::default();
        let mut connection = Connection::new();
        connection.open(&connector, "room", "token");

        let frame = connection.on_event(TransportEvent::Frame("x".to_string()));
        assert_eq!(frame.as_deref(), Some("x"));
        assert_eq!(connection.status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn close_is_idempotent_and_releases_transport() {
        let connector = FakeConnector::default();
        let mut connection = Connection::new();
        connection.open(&connector, "room", "token");
        connection.on_event(TransportEvent::Ready);

        connection.close();
        connection.close();

        assert_eq!(connection.status(), ConnectionStatus::Disconnected);
        let (_, remote) = connector.take(0);
        assert!(remote.events.is_closed());
    }

    #[test]
    fn reopen_releases_previous_transport() {
        let connector = FakeConnector::default();
        let mut connection = Connection::new();
        connection.open(&connector, "a", "token");
        connection.open(&connector, "b", "token");

        assert_eq!(connector.connects(), 2);
        assert!(connector.take(0).1.events.is_closed());
        assert!(!connector.take(1).1.events.is_closed());
        assert_eq!(connection.status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn drop_releases_transport() {
        let connector = FakeConnector::default();
        let mut connection = Connection::new();
        connection.open(&connector, "room", "token");

        drop(connection);
        assert!(connector.take(0).1.events.is_closed());
    }

    #[tokio::test]
    async fn status_subscribers_see_transitions() {
        let connector = FakeConnector::default();
        let mut connection = Connection::new();
        let mut status = connection.subscribe();

        connection.open(&connector, "room", "token");
        connection.on_event(TransportEvent::Ready);

        status.changed().await.unwrap();
        assert_eq!(*status.borrow_and_update(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn next_event_reports_closed_when_task_vanishes() {
        let connector = FakeConnector::default();
        let mut connection = Connection::new();
        connection.open(&connector, "room", "token");

        let (_, remote) = connector.take(0);
        remote.events.send(TransportEvent::Ready).unwrap();
        drop(remote);

        assert_eq!(connection.next_event().await, TransportEvent::Ready);
        assert_eq!(connection.next_event().await, TransportEvent::Closed);
    }
}
