//! Server-side chat history: session rows and their ordered messages.
//!
//! The store is the assignment authority's backing state: the dispatcher
//! picks session ids, the store persists turn pairs under them.

pub mod store;

pub use store::SqliteHistoryStore;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::chat::{ChatId, Message, SidebarEntry};

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error type for history store operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Underlying database failure.
    #[error("history database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),
}

/// Result alias for history store operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Storage of persisted chats and their message sequences.
pub trait HistoryStore: Send + Sync {
    /// List sidebar entries, most recently updated first.
    fn sidebar(&self) -> StoreFuture<'_, HistoryResult<Vec<SidebarEntry>>>;

    /// Fetch the ordered messages of a chat. Empty when the id is unknown.
    fn messages(&self, id: &ChatId) -> StoreFuture<'_, HistoryResult<Vec<Message>>>;

    /// Append one user/AI turn pair, creating the chat row when the id is
    /// new. Appending to an id that was deleted concurrently recreates the
    /// chat rather than losing the turn.
    fn append_turn(
        &self,
        id: &ChatId,
        user: Message,
        ai: Message,
        now_ms: i64,
    ) -> StoreFuture<'_, HistoryResult<()>>;

    /// Delete a chat and its messages. Returns whether the chat existed.
    fn delete(&self, id: &ChatId) -> StoreFuture<'_, HistoryResult<bool>>;

    /// Check whether a chat exists.
    fn exists(&self, id: &ChatId) -> StoreFuture<'_, HistoryResult<bool>>;
}
