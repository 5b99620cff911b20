mod backlog;
mod connection;
mod msg;
mod new;
mod reconcile;
mod room;
mod store;
mod ws;

pub use backlog::{Backlog, DEFAULT_BACKLOG_LIMIT};
pub use connection::{Connection, ConnectionStatus};
pub use msg::{
    FLAGGED_PLACEHOLDER, InboundFrame, Message, ModerationStatus, ModerationUpdate,
    ModerationVerdict, UNSET_TIMESTAMP,
};
pub use new::Room;
pub use reconcile::{DEFERRED_LIMIT, Reconciler};
pub use room::{RoomHandle, Snapshot};
pub use store::MessageStore;
pub use ws::{Connector, TransportEvent, TransportHandle, TransportRemote, WsConnector};
