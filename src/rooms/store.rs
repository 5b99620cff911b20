//! Deduplicated, time-ordered message set for one room.

use std::collections::HashMap;

use time::OffsetDateTime;

use super::msg::{Message, ModerationStatus};

struct Stored {
    arrival: u64,
    /// Position in the ordered view. Equal to `created_at` unless the
    /// message came in live without a timestamp.
    sort_at: OffsetDateTime,
    message: Message,
}

impl Stored {
    fn key(&self) -> (OffsetDateTime, u64) {
        (self.sort_at, self.arrival)
    }
}

/// Messages keyed by id, with an ordered view sorted by time and then by
/// arrival.
///
/// Only [`super::Reconciler`] mutates a store; everything else reads
/// snapshots.
#[derive(Default)]
pub struct MessageStore {
    messages: HashMap<String, Stored>,
    order: Vec<String>,
    next_arrival: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.get(id).map(|s| &s.message)
    }

    /// Messages in display order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.order
            .iter()
            .filter_map(|id| self.messages.get(id))
            .map(|s| &s.message)
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.iter().cloned().collect()
    }

    /// Replace the whole content. Earlier duplicates win.
    ///
    /// Ids already stored keep their place in time, so a live message
    /// without a timestamp stays where it was shown. Arrival is renumbered
    /// in input order: on equal times, earlier input sorts first.
    pub(crate) fn replace_all(&mut self, messages: impl IntoIterator<Item = Message>) {
        let previous = std::mem::take(&mut self.messages);
        self.order.clear();
        for message in messages {
            let sort_at = previous
                .get(&message.id)
                .map_or(message.created_at, |s| s.sort_at);
            self.insert(message, sort_at);
        }
    }

    /// Insert at the message's `created_at` unless the id is already
    /// present. Returns whether it was inserted.
    pub(crate) fn upsert_if_absent(&mut self, message: Message) -> bool {
        let sort_at = message.created_at;
        self.insert(message, sort_at)
    }

    /// Insert a message from the live stream. One without a timestamp goes
    /// last, at `received_at` or the newest time already shown.
    pub(crate) fn insert_live(&mut self, message: Message, received_at: OffsetDateTime) -> bool {
        let sort_at = if message.has_timestamp() {
            message.created_at
        } else {
            self.newest().map_or(received_at, |newest| newest.max(received_at))
        };
        self.insert(message, sort_at)
    }

    /// Set the moderation status of a present message. Returns whether it was found.
    pub(crate) fn update_status(&mut self, id: &str, status: ModerationStatus) -> bool {
        match self.messages.get_mut(id) {
            Some(stored) => {
                stored.message.moderation_status = status;
                true
            }
            None => false,
        }
    }

    fn newest(&self) -> Option<OffsetDateTime> {
        let id = self.order.last()?;
        self.messages.get(id).map(|s| s.sort_at)
    }

    fn insert(&mut self, message: Message, sort_at: OffsetDateTime) -> bool {
        if self.messages.contains_key(&message.id) {
            return false;
        }

        let stored = Stored {
            arrival: self.next_arrival,
            sort_at,
            message,
        };
        self.next_arrival += 1;

        let key = stored.key();
        let at = self
            .order
            .partition_point(|id| self.messages.get(id).is_some_and(|s| s.key() <= key));
        self.order.insert(at, stored.message.id.clone());
        self.messages.insert(stored.message.id.clone(), stored);
        true
    }
}
