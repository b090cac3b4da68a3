//! Reconciles the list of known chats with the server and with which chat
//! is active.
//!
//! The server is authoritative: every refresh replaces the in-memory list
//! wholesale, and a selection that no longer matches a known entry is
//! dropped rather than trusted.

use tracing::{info, warn};

use crate::chat::{ChatId, SidebarEntry};
use crate::client::api::HistoryClient;
use crate::client::conversation::Conversation;
use crate::client::surface::Surface;

/// Sidebar synchronizer: the cached entry list and the operations that
/// keep it, the active selection, and the conversation consistent.
pub struct SidebarSync {
    history: HistoryClient,
    entries: Vec<SidebarEntry>,
}

impl SidebarSync {
    /// Create a synchronizer over a session store client.
    #[must_use]
    pub fn new(history: HistoryClient) -> Self {
        Self {
            history,
            entries: Vec::new(),
        }
    }

    /// Entries as of the last successful refresh.
    #[must_use]
    pub fn entries(&self) -> &[SidebarEntry] {
        &self.entries
    }

    /// Whether `id` is currently a known entry.
    #[must_use]
    pub fn contains(&self, id: &ChatId) -> bool {
        self.entries.iter().any(|entry| entry.chat_id == *id)
    }

    /// Fetch the full entry list and replace the cache wholesale.
    ///
    /// On transport failure the surface shows an inline error in place of
    /// the list and the previous entries are kept for the next attempt.
    pub async fn refresh(&mut self, conversation: &mut Conversation, surface: &dyn Surface) {
        match self.history.sidebar().await {
            Ok(entries) => {
                self.entries = entries;
                self.reconcile(conversation, surface);
                surface.show_sidebar(&self.entries, conversation.active());
            }
            Err(err) => {
                warn!("sidebar refresh failed: {err}");
                surface.show_sidebar_error("Failed to load chat history");
            }
        }
    }

    /// Make `id` the active chat and materialize its transcript fresh from
    /// the server. Never an incremental diff.
    pub async fn select(
        &mut self,
        id: ChatId,
        conversation: &mut Conversation,
        surface: &dyn Surface,
    ) {
        conversation.set_active(Some(id.clone()));
        match self.history.messages(&id).await {
            Ok(messages) => {
                conversation.materialize(messages);
                surface.show_transcript(conversation.messages());
                surface.show_sidebar(&self.entries, conversation.active());
            }
            Err(err) => {
                warn!("failed to fetch chat {id}: {err}");
                surface.show_transcript(conversation.messages());
                surface.show_error("Failed to load the chat transcript");
                // The chat may have vanished under us; fall back to server
                // truth, which also invalidates an orphaned selection.
                self.refresh(conversation, surface).await;
            }
        }
    }

    /// Delete a chat: server first, local cleanup second, then an
    /// unconditional refresh so the list reflects server truth even if the
    /// local assumption about the active chat was wrong.
    ///
    /// On failure nothing changes; no partial deletion is assumed.
    pub async fn delete(
        &mut self,
        id: &ChatId,
        conversation: &mut Conversation,
        surface: &dyn Surface,
    ) {
        if let Err(err) = self.history.delete(id).await {
            warn!("failed to delete chat {id}: {err}");
            surface.show_error("Failed to delete the chat");
            return;
        }
        info!("deleted chat {id}");

        if conversation.active() == Some(id) {
            conversation.clear();
            surface.show_transcript(conversation.messages());
        }

        self.refresh(conversation, surface).await;
    }

    /// Drop an active selection that no longer corresponds to a known
    /// entry; an orphaned selection is not a valid state.
    fn reconcile(&self, conversation: &mut Conversation, surface: &dyn Surface) {
        let orphaned = conversation
            .active()
            .is_some_and(|active| !self.contains(active));
        if orphaned {
            conversation.clear();
            surface.show_transcript(conversation.messages());
        }
    }
}
