//! The request/response state machine for one user turn.
//!
//! `Idle → Submitting → (Resolved | Failed) → Idle`. The `&mut` receiver
//! on [`Orchestrator::submit`] is the concurrency rule made structural:
//! a second submission cannot interleave with one in flight against the
//! same conversation, only queue behind it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::chat::Message;
use crate::client::api::{ProxyClient, ProxyError, TurnReply};
use crate::client::conversation::Conversation;
use crate::client::sidebar::SidebarSync;
use crate::client::surface::{Surface, approx_token_count};

/// Placeholder text shown on the AI side while a turn is pending.
pub const PLACEHOLDER_TEXT: &str = "...";

/// Rendered on transport failures, where no descriptive text exists.
const BACKEND_UNREACHABLE_TEXT: &str = "Could not reach the backend.";

/// Refresh period of the live elapsed-time readout.
const TICK_PERIOD: Duration = Duration::from_millis(31);

/// How a submission attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Rejected before any side effect: the trimmed input was empty.
    RejectedEmpty,
    /// The relay answered; transcript and counters reflect the reply.
    Resolved,
    /// The turn failed. The elapsed readout is frozen at zero and the
    /// backend-unavailable indicator stays up until the next resolution.
    Failed,
}

/// Ephemeral state of one in-flight turn: the submitted text, the round
/// trip's start instant, and the live elapsed-time ticker. Dropping it
/// stops the ticker, so it can never outlive the turn it measures.
struct PendingTurn {
    text: String,
    started: Instant,
    ticker: JoinHandle<()>,
}

impl PendingTurn {
    fn begin(text: String, surface: Arc<dyn Surface>) -> Self {
        let started = Instant::now();
        surface.show_elapsed(Duration::ZERO);
        let ticker = tokio::spawn(async move {
            let mut tick = tokio::time::interval(TICK_PERIOD);
            loop {
                tick.tick().await;
                surface.show_elapsed(started.elapsed());
            }
        });
        Self {
            text,
            started,
            ticker,
        }
    }

    /// Stop the ticker and wait for it to wind down, so no stray tick can
    /// land after the readout is frozen. Returns the measured duration.
    async fn halt(&mut self) -> Duration {
        self.ticker.abort();
        let _ = (&mut self.ticker).await;
        self.started.elapsed()
    }
}

impl Drop for PendingTurn {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

/// Drives the submit round trip for the chat client.
pub struct Orchestrator {
    proxy: ProxyClient,
}

impl Orchestrator {
    /// Create an orchestrator over a proxy client.
    #[must_use]
    pub fn new(proxy: ProxyClient) -> Self {
        Self { proxy }
    }

    /// Run one full submit cycle: optimistic append, round trip, then
    /// resolution or rollback.
    pub async fn submit(
        &mut self,
        input: &str,
        conversation: &mut Conversation,
        sidebar: &mut SidebarSync,
        surface: &Arc<dyn Surface>,
    ) -> TurnOutcome {
        let text = input.trim();
        if text.is_empty() {
            debug!("submission ignored: empty input");
            return TurnOutcome::RejectedEmpty;
        }

        // Optimistic side effects, all in place before the network call.
        let had_active = conversation.active().is_some();
        conversation.append_local(Message::user(text));
        conversation.append_local(Message::ai(PLACEHOLDER_TEXT));
        surface.clear_input();
        surface.show_transcript(conversation.messages());

        let mut pending = PendingTurn::begin(text.to_string(), Arc::clone(surface));

        let chat_id = conversation.active().cloned();
        let reply = self
            .proxy
            .submit(&pending.text, chat_id.as_ref(), !had_active)
            .await;

        match reply {
            Ok(reply) => {
                let elapsed = pending.halt().await;
                Self::resolve(reply, elapsed, had_active, conversation, sidebar, surface).await;
                TurnOutcome::Resolved
            }
            Err(err) => {
                pending.halt().await;
                Self::fail(&err, conversation, surface);
                TurnOutcome::Failed
            }
        }
    }

    /// `Submitting → Resolved`: swap the placeholder for the real reply,
    /// freeze the counters, adopt a newly assigned session id, and bring
    /// the sidebar up to date with the mutated store.
    async fn resolve(
        reply: TurnReply,
        elapsed: Duration,
        had_active: bool,
        conversation: &mut Conversation,
        sidebar: &mut SidebarSync,
        surface: &Arc<dyn Surface>,
    ) {
        conversation.replace_last(Message::ai(reply.response.as_str()));
        surface.show_token_count(approx_token_count(&reply.response));
        surface.show_elapsed(elapsed);
        surface.set_backend_alert(false);

        if !had_active {
            info!("adopted new chat {}", reply.chat_id);
            conversation.adopt_identity(reply.chat_id);
        }
        surface.show_transcript(conversation.messages());

        sidebar.refresh(conversation, surface.as_ref()).await;
    }

    /// `Submitting → Failed`: swap the placeholder for an AI-side error
    /// message, zero the counters, and raise the backend indicator.
    fn fail(err: &ProxyError, conversation: &mut Conversation, surface: &Arc<dyn Surface>) {
        warn!("turn failed: {err}");

        let text = match err {
            // The relay described the failure; render its words.
            ProxyError::Upstream { message, .. } => message.clone(),
            ProxyError::Transport(_) | ProxyError::Malformed => {
                BACKEND_UNREACHABLE_TEXT.to_string()
            }
        };

        conversation.replace_last(Message::ai(text));
        surface.show_transcript(conversation.messages());
        surface.show_token_count(0);
        // Frozen at zero: the duration of a failed call is not meaningful.
        surface.show_elapsed(Duration::ZERO);
        surface.set_backend_alert(true);
    }
}
