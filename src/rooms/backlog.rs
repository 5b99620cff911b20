use std::future::Future;

use crate::{ApiClient, Result, SyncError};

use super::msg::Message;

pub const DEFAULT_BACKLOG_LIMIT: u32 = 50;

/// Source of a room's message history.
pub trait Backlog: Clone + Send + Sync + 'static {
    /// Up to `limit` recent messages of `room_id`, oldest first.
    fn fetch_messages(
        &self,
        room_id: &str,
        token: &str,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Message>>> + Send;
}

impl Backlog for ApiClient {
    async fn fetch_messages(&self, room_id: &str, token: &str, limit: u32) -> Result<Vec<Message>> {
        if token.is_empty() {
            return Err(SyncError::NotSignedIn);
        }

        let response = self
            .get(&format!("/rooms/{room_id}/messages"))
            .query(&[("limit", limit)])
            .bearer_auth(token)
            .send()
            .await?;
        // the server answers `null` for a room without messages
        let messages: Option<Vec<Message>> = Self::json_response(response).await?;
        let messages = messages.unwrap_or_default();

        tracing::debug!(room_id, count = messages.len(), "backlog fetched");
        Ok(messages)
    }
}
