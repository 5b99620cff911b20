//! The open room: one actor task owning the connection, the reconciler and
//! the store.
//!
//! Commands from [`RoomHandle`], backlog results and transport events are
//! all handled on that task, one at a time, so the store is never seen half
//! merged. Readers get snapshots through `watch` channels.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::{Result, Session};

use super::backlog::Backlog;
use super::connection::{Connection, ConnectionStatus};
use super::msg::{self, InboundFrame, Message};
use super::reconcile::Reconciler;
use super::ws::{Connector, TransportEvent};

pub type Snapshot = Arc<Vec<Message>>;

enum RoomCommand {
    Open { room_id: String, token: Option<String> },
    Leave,
    Send { text: String, reply: oneshot::Sender<bool> },
}

struct BacklogLoaded {
    generation: u64,
    room_id: String,
    result: Result<Vec<Message>>,
}

/// Presentation-side handle to the room actor. Cheap to clone; the actor
/// tears the room down once every handle is dropped.
#[derive(Clone)]
pub struct RoomHandle {
    commands: mpsc::UnboundedSender<RoomCommand>,
    messages: watch::Receiver<Snapshot>,
    status: watch::Receiver<ConnectionStatus>,
}

impl RoomHandle {
    /// Start the actor on the current tokio runtime.
    pub fn spawn<B: Backlog, C: Connector>(backlog: B, connector: C, backlog_limit: u32) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (actor, loaded_rx) = RoomActor::new(backlog, connector, backlog_limit);
        let handle = RoomHandle {
            commands: commands_tx,
            messages: actor.messages.subscribe(),
            status: actor.connection.subscribe(),
        };

        tokio::spawn(actor.run(commands_rx, loaded_rx));
        handle
    }

    /// Tear down the current room, if any, and open `room_id` with the
    /// session's token. Does nothing but tear down when signed out.
    pub fn open(&self, room_id: &str, session: &Session) {
        self.open_with_token(room_id, session.token());
    }

    pub fn open_with_token(&self, room_id: &str, token: Option<&str>) {
        self.command(RoomCommand::Open {
            room_id: room_id.to_string(),
            token: token.map(str::to_string),
        });
    }

    pub fn leave(&self) {
        self.command(RoomCommand::Leave);
    }

    /// Submit text through the send gate. Returns whether a frame went out.
    pub async fn send(&self, text: &str) -> bool {
        let (reply, rx) = oneshot::channel();
        self.command(RoomCommand::Send {
            text: text.to_string(),
            reply,
        });
        rx.await.unwrap_or(false)
    }

    /// Ordered view of the open room.
    pub fn messages(&self) -> Snapshot {
        self.messages.borrow().clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Whether the input should be enabled.
    pub fn can_send(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    pub fn watch_messages(&self) -> watch::Receiver<Snapshot> {
        self.messages.clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    fn command(&self, command: RoomCommand) {
        if self.commands.send(command).is_err() {
            tracing::warn!("room actor is gone");
        }
    }
}

struct RoomActor<B, C> {
    backlog: B,
    connector: C,
    backlog_limit: u32,
    connection: Connection,
    reconciler: Reconciler,
    room: Option<String>,
    /// Bumped on every open and leave; backlog results carry the value they
    /// were requested under.
    generation: u64,
    backlog_task: Option<JoinHandle<()>>,
    loaded: mpsc::UnboundedSender<BacklogLoaded>,
    messages: watch::Sender<Snapshot>,
}

impl<B: Backlog, C: Connector> RoomActor<B, C> {
    fn new(
        backlog: B,
        connector: C,
        backlog_limit: u32,
    ) -> (Self, mpsc::UnboundedReceiver<BacklogLoaded>) {
        let (loaded_tx, loaded_rx) = mpsc::unbounded_channel();
        let (messages, _) = watch::channel(Snapshot::default());
        let actor = RoomActor {
            backlog,
            connector,
            backlog_limit,
            connection: Connection::new(),
            reconciler: Reconciler::new(),
            room: None,
            generation: 0,
            backlog_task: None,
            loaded: loaded_tx,
            messages,
        };
        (actor, loaded_rx)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<RoomCommand>,
        mut loaded: mpsc::UnboundedReceiver<BacklogLoaded>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
                Some(result) = loaded.recv() => self.on_backlog_loaded(result),
                event = self.connection.next_event() => self.on_transport_event(event),
            }
        }

        self.leave();
        tracing::debug!("room actor stopped");
    }

    fn on_command(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Open { room_id, token } => self.open(room_id, token.unwrap_or_default()),
            RoomCommand::Leave => self.leave(),
            RoomCommand::Send { text, reply } => {
                let _ = reply.send(msg::send_msg(&self.connection, &text));
            }
        }
    }

    fn open(&mut self, room_id: String, token: String) {
        self.leave();
        if room_id.is_empty() || token.is_empty() {
            tracing::debug!(room_id = %room_id, "room needs both an id and a token");
            return;
        }

        tracing::info!(room_id = %room_id, "opening room");
        self.connection.open(&self.connector, &room_id, &token);
        self.room = Some(room_id.clone());

        let backlog = self.backlog.clone();
        let limit = self.backlog_limit;
        let generation = self.generation;
        let loaded = self.loaded.clone();
        self.backlog_task = Some(tokio::spawn(async move {
            let result = backlog.fetch_messages(&room_id, &token, limit).await;
            let _ = loaded.send(BacklogLoaded {
                generation,
                room_id,
                result,
            });
        }));
    }

    /// End the current room session. Safe to call with no room open.
    fn leave(&mut self) {
        self.generation += 1;
        if let Some(task) = self.backlog_task.take() {
            task.abort();
        }
        self.connection.close();
        if let Some(room_id) = self.room.take() {
            tracing::info!(room_id = %room_id, "left room");
        }
        if !self.reconciler.store().is_empty() || self.reconciler.deferred_len() > 0 {
            self.reconciler = Reconciler::new();
            self.publish();
        }
    }

    fn on_backlog_loaded(&mut self, loaded: BacklogLoaded) {
        if loaded.generation != self.generation {
            tracing::debug!(room_id = %loaded.room_id, "discarding stale backlog");
            return;
        }
        self.backlog_task = None;

        match loaded.result {
            Ok(messages) => {
                self.reconciler.on_backlog(messages);
                self.publish();
            }
            Err(err) => {
                tracing::warn!(room_id = %loaded.room_id, error = %err, "backlog fetch failed");
            }
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        let Some(text) = self.connection.on_event(event) else {
            return;
        };
        let Some(frame) = InboundFrame::parse(&text) else {
            return;
        };
        if self.reconciler.apply(frame) {
            self.publish();
        }
    }

    fn publish(&self) {
        self.messages
            .send_replace(Arc::new(self.reconciler.store().snapshot()));
    }
}
