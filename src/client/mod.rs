//! Client-side session protocol: conversation state, sidebar
//! synchronization, and the turn orchestrator.

pub mod api;
pub mod conversation;
pub mod sidebar;
pub mod surface;
pub mod turn;

pub use api::{ApiError, HistoryClient, ProxyClient, ProxyError, TurnReply};
pub use conversation::Conversation;
pub use sidebar::SidebarSync;
pub use surface::Surface;
pub use turn::{Orchestrator, TurnOutcome};

use std::sync::Arc;
use std::time::Duration;

use crate::chat::{ChatId, SidebarEntry};

/// The whole client-side session context: one conversation, one sidebar,
/// one orchestrator, one presentation surface.
///
/// Owns all mutable session state; nothing is global. Operations run one
/// at a time through `&mut self`, so no two of them can interleave against
/// the same conversation.
pub struct ChatClient {
    conversation: Conversation,
    sidebar: SidebarSync,
    orchestrator: Orchestrator,
    surface: Arc<dyn Surface>,
}

impl ChatClient {
    /// Wire up a client from its collaborators.
    #[must_use]
    pub fn new(history: HistoryClient, proxy: ProxyClient, surface: Arc<dyn Surface>) -> Self {
        Self {
            conversation: Conversation::new(),
            sidebar: SidebarSync::new(history),
            orchestrator: Orchestrator::new(proxy),
            surface,
        }
    }

    /// Load the sidebar on startup.
    pub async fn start(&mut self) {
        self.sidebar
            .refresh(&mut self.conversation, self.surface.as_ref())
            .await;
    }

    /// Submit one user turn.
    pub async fn submit(&mut self, input: &str) -> TurnOutcome {
        self.orchestrator
            .submit(
                input,
                &mut self.conversation,
                &mut self.sidebar,
                &self.surface,
            )
            .await
    }

    /// Make `id` the active chat.
    pub async fn select(&mut self, id: ChatId) {
        self.sidebar
            .select(id, &mut self.conversation, self.surface.as_ref())
            .await;
    }

    /// Delete a chat.
    pub async fn delete(&mut self, id: &ChatId) {
        self.sidebar
            .delete(id, &mut self.conversation, self.surface.as_ref())
            .await;
    }

    /// Re-fetch the sidebar from the server.
    pub async fn refresh(&mut self) {
        self.sidebar
            .refresh(&mut self.conversation, self.surface.as_ref())
            .await;
    }

    /// Start composing a new, not-yet-persisted chat. Pending display
    /// state is simply discarded.
    pub fn new_chat(&mut self) {
        self.conversation.clear();
        self.surface.clear_input();
        self.surface.show_transcript(self.conversation.messages());
        self.surface.show_token_count(0);
        self.surface.show_elapsed(Duration::ZERO);
        self.surface.show_sidebar(self.sidebar.entries(), None);
    }

    /// The conversation, for rendering and assertions.
    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Sidebar entries as of the last successful refresh.
    #[must_use]
    pub fn sidebar_entries(&self) -> &[SidebarEntry] {
        self.sidebar.entries()
    }
}
