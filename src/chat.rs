//! Shared chat data model used on the wire and in memory.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque chat session identifier.
///
/// Assigned by the server on the first successful turn of a new chat and
/// treated as an opaque string everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ChatId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ChatId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Message author within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side of the conversation.
    User,
    /// The model side of the conversation.
    Ai,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
        }
    }
}

/// One transcript entry.
///
/// Immutable once created; ordering within a chat is insertion order and is
/// the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the message.
    pub role: Role,
    /// Raw, unrendered text payload.
    pub text: String,
}

impl Message {
    /// Build a user message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Build an AI message.
    #[must_use]
    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            text: text.into(),
        }
    }
}

/// Sidebar projection of a persisted chat: identity plus a preview derived
/// from its first user message.
///
/// The preview travels untruncated; cutting it down for display is a
/// surface concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarEntry {
    /// Session identifier.
    pub chat_id: ChatId,
    /// Preview text.
    pub preview: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        let user = serde_json::to_string(&Role::User).expect("serialize role");
        let ai = serde_json::to_string(&Role::Ai).expect("serialize role");
        assert_eq!(user, "\"user\"");
        assert_eq!(ai, "\"ai\"");
    }

    #[test]
    fn test_chat_id_is_transparent_on_the_wire() {
        let id = ChatId::from("abc123");
        let json = serde_json::to_string(&id).expect("serialize id");
        assert_eq!(json, "\"abc123\"");
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        assert_ne!(ChatId::generate(), ChatId::generate());
    }
}
