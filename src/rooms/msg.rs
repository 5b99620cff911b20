use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::datetime;

use super::connection::{Connection, ConnectionStatus};

pub const FLAGGED_PLACEHOLDER: &str = "[This message was flagged by moderation]";

/// `created_at` of a message the server broadcast before storing it.
pub const UNSET_TIMESTAMP: OffsetDateTime = datetime!(0001-01-01 0:00 UTC);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Flagged,
}

/// The outcome a moderation update can carry. A message never moves back
/// to pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationVerdict {
    Approved,
    Flagged,
}

impl From<ModerationVerdict> for ModerationStatus {
    fn from(verdict: ModerationVerdict) -> Self {
        match verdict {
            ModerationVerdict::Approved => ModerationStatus::Approved,
            ModerationVerdict::Flagged => ModerationStatus::Flagged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    pub content: String,
    pub moderation_status: ModerationStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Message {
    /// Content as it should be shown: flagged messages are hidden.
    pub fn display_content(&self) -> &str {
        match self.moderation_status {
            ModerationStatus::Flagged => FLAGGED_PLACEHOLDER,
            ModerationStatus::Pending | ModerationStatus::Approved => &self.content,
        }
    }

    /// False for live messages relayed before the server stamped them.
    pub fn has_timestamp(&self) -> bool {
        self.created_at > UNSET_TIMESTAMP
    }

    pub fn is_own(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationUpdate {
    pub message_id: String,
    pub status: ModerationVerdict,
}

/// A frame received on the room's live stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum InboundFrame {
    Message(Message),
    ModerationUpdate(ModerationUpdate),
}

impl InboundFrame {
    /// `None` for unknown kinds and unparsable bodies.
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(frame) => Some(frame),
            Err(err) => {
                tracing::debug!(error = %err, "dropping malformed frame");
                None
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SendMessage<'a> {
    content: &'a str,
}

/// Forward `text` to the transport if the connection is up.
///
/// The message is not added to the store here; the server echoes it back as
/// a `message` frame carrying its canonical id and timestamp. Returns whether
/// a frame was emitted.
pub(crate) fn send_msg(connection: &Connection, text: &str) -> bool {
    if connection.status() != ConnectionStatus::Connected {
        tracing::debug!(status = ?connection.status(), "send ignored while not connected");
        return false;
    }
    if text.trim().is_empty() {
        return false;
    }

    let frame = match serde_json::to_string(&SendMessage { content: text }) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!(error = %err, "failed to encode outbound message");
            return false;
        }
    };
    connection.forward(frame)
}
