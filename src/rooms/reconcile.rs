//! Merges the backlog fetch and the live stream into a [`MessageStore`].
//!
//! The backlog request and the websocket start together and race: live
//! messages may land before the backlog does, and moderation updates may
//! reference messages this client has not seen yet.

use std::collections::HashMap;

use time::OffsetDateTime;

use super::msg::{InboundFrame, Message, ModerationStatus, ModerationUpdate, ModerationVerdict};
use super::store::MessageStore;

/// Most moderation updates held for messages not seen yet.
pub const DEFERRED_LIMIT: usize = 256;

pub struct Reconciler {
    store: MessageStore,
    /// Updates whose message has not arrived yet, last one wins. The
    /// sequence number tells the oldest entry apart for eviction.
    deferred: HashMap<String, (u64, ModerationVerdict)>,
    deferred_limit: usize,
    next_deferred: u64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::with_deferred_limit(DEFERRED_LIMIT)
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold at most `limit` early moderation updates; past that the oldest
    /// one is dropped.
    pub fn with_deferred_limit(limit: usize) -> Self {
        Self {
            store: MessageStore::new(),
            deferred: HashMap::new(),
            deferred_limit: limit.max(1),
            next_deferred: 0,
        }
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Number of moderation updates waiting for their message.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Route a live frame. Returns whether the store changed.
    pub fn apply(&mut self, frame: InboundFrame) -> bool {
        match frame {
            InboundFrame::Message(message) => self.on_new_message(message),
            InboundFrame::ModerationUpdate(update) => self.on_moderation_update(update),
        }
    }

    /// Union the backlog with whatever the live stream already delivered.
    ///
    /// A message present on both sides keeps the status that has left
    /// `pending`, preferring the live copy. On equal times backlog entries
    /// sort before live-only ones.
    pub fn on_backlog(&mut self, backlog: Vec<Message>) {
        let mut live: HashMap<String, Message> = self
            .store
            .iter()
            .map(|m| (m.id.clone(), m.clone()))
            .collect();
        let live_order: Vec<String> = self.store.iter().map(|m| m.id.clone()).collect();

        let mut merged = Vec::with_capacity(backlog.len() + live.len());
        for mut message in backlog {
            if let Some(existing) = live.remove(&message.id) {
                if existing.moderation_status != ModerationStatus::Pending {
                    message.moderation_status = existing.moderation_status;
                }
            }
            self.take_deferred(&mut message);
            merged.push(message);
        }
        merged.extend(live_order.iter().filter_map(|id| live.remove(id)));

        let before = self.store.len();
        self.store.replace_all(merged);
        tracing::debug!(before, after = self.store.len(), "backlog merged");
    }

    /// Insert a live message. Redelivery of a known id is ignored.
    pub fn on_new_message(&mut self, message: Message) -> bool {
        self.on_live_message(message, OffsetDateTime::now_utc())
    }

    /// Apply a status change now, or hold it until the message shows up.
    ///
    /// Returns whether the store changed.
    pub fn on_moderation_update(&mut self, update: ModerationUpdate) -> bool {
        if self.store.update_status(&update.message_id, update.status.into()) {
            return true;
        }
        tracing::debug!(id = %update.message_id, "deferring moderation update for unseen message");
        self.defer(update);
        false
    }

    fn on_live_message(&mut self, mut message: Message, received_at: OffsetDateTime) -> bool {
        if self.store.contains(&message.id) {
            tracing::trace!(id = %message.id, "duplicate message ignored");
            return false;
        }
        self.take_deferred(&mut message);
        self.store.insert_live(message, received_at)
    }

    fn defer(&mut self, update: ModerationUpdate) {
        let seq = self.next_deferred;
        self.next_deferred += 1;
        self.deferred.insert(update.message_id, (seq, update.status));

        if self.deferred.len() > self.deferred_limit {
            let oldest = self
                .deferred
                .iter()
                .min_by_key(|(_, entry)| entry.0)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                tracing::debug!(%id, "dropping oldest deferred moderation update");
                self.deferred.remove(&id);
            }
        }
    }

    fn take_deferred(&mut self, message: &mut Message) {
        if let Some((_, verdict)) = self.deferred.remove(&message.id) {
            message.moderation_status = verdict.into();
        }
    }
}
