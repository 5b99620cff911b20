//! Client-side synchronization for moderated chat rooms.
//!
//! A [`RoomHandle`] opens one room at a time: it fetches the recent backlog
//! over HTTP, listens on the room's websocket, and keeps a single ordered,
//! deduplicated view of the room's messages while moderation verdicts arrive.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod rooms;
pub mod session;

pub use api::ApiClient;
pub use config::Config;
pub use error::{Result, SyncError};
pub use rooms::{
    Backlog, ConnectionStatus, Connector, Message, ModerationStatus, ModerationUpdate,
    ModerationVerdict, Room, RoomHandle, UNSET_TIMESTAMP, WsConnector,
};
pub use session::{Credentials, Session, User};
