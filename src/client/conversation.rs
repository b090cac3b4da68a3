//! In-memory state of the currently displayed chat.

use crate::chat::{ChatId, Message};

/// The one conversation the client is looking at.
///
/// Owns the materialized message sequence exclusively. Switching chats
/// replaces the whole sequence, so two sessions' messages never mix.
#[derive(Debug, Default)]
pub struct Conversation {
    active: Option<ChatId>,
    messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation with no active chat.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently active chat id. `None` while composing a new chat.
    #[must_use]
    pub fn active(&self) -> Option<&ChatId> {
        self.active.as_ref()
    }

    /// Materialized messages, in insertion order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Switch the active chat. Always drops the current messages; the
    /// caller materializes a fresh copy, so a stale one can never show.
    pub fn set_active(&mut self, id: Option<ChatId>) {
        self.active = id;
        self.messages.clear();
    }

    /// Adopt a server-assigned identity for a chat composed locally,
    /// keeping the transcript in place.
    pub fn adopt_identity(&mut self, id: ChatId) {
        self.active = Some(id);
    }

    /// Replace the message sequence wholesale.
    pub fn materialize(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Append a provisional message without a round trip. Used only for
    /// the optimistic echo of a just-submitted turn and the AI
    /// placeholder; both may be removed or replaced.
    pub fn append_local(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replace the most recent message (placeholder resolution).
    pub fn replace_last(&mut self, message: Message) {
        if let Some(last) = self.messages.last_mut() {
            *last = message;
        }
    }

    /// Drop the most recent message (placeholder retraction).
    pub fn pop_last(&mut self) {
        self.messages.pop();
    }

    /// Forget the active chat and all messages.
    pub fn clear(&mut self) {
        self.active = None;
        self.messages.clear();
    }
}
