//! Narrow presentation interface and display helpers.
//!
//! Everything user-visible goes through [`Surface`]; the protocol core
//! never touches a terminal. Surfaces rebuild wholesale from complete
//! snapshots on every change (materialize, don't patch).

use std::time::Duration;

use crate::chat::{ChatId, Message, SidebarEntry};

/// Maximum preview length shown in the sidebar before truncation.
const PREVIEW_MAX_CHARS: usize = 40;

/// Presentation sink for the chat client.
///
/// Implementations render state; they never mutate it.
pub trait Surface: Send + Sync {
    /// Rebuild the transcript view from the full message list.
    fn show_transcript(&self, messages: &[Message]);

    /// Rebuild the sidebar view from the full entry list.
    fn show_sidebar(&self, entries: &[SidebarEntry], active: Option<&ChatId>);

    /// Show an inline error in place of the sidebar list.
    fn show_sidebar_error(&self, text: &str);

    /// Update the approximate token-count readout.
    fn show_token_count(&self, count: usize);

    /// Update the elapsed-time readout.
    fn show_elapsed(&self, elapsed: Duration);

    /// Set or clear the backend-unavailable indicator.
    fn set_backend_alert(&self, visible: bool);

    /// Clear the input buffer.
    fn clear_input(&self);

    /// Show a transient user-visible error (delete failures and the like).
    fn show_error(&self, text: &str);
}

/// Approximate token count of a response: whitespace-delimited word count.
/// An approximation by design, not a tokenizer.
#[must_use]
pub fn approx_token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Format a duration as `MM:SS.mmm`, prefixed with hours when nonzero.
#[must_use]
pub fn format_duration(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1_000;
    let millis = total_ms % 1_000;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    } else {
        format!("{minutes:02}:{seconds:02}.{millis:03}")
    }
}

/// Truncate a sidebar preview for display.
#[must_use]
pub fn truncate_preview(preview: &str) -> String {
    if preview.chars().count() > PREVIEW_MAX_CHARS {
        let cut: String = preview.chars().take(PREVIEW_MAX_CHARS).collect();
        format!("{cut}...")
    } else {
        preview.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_count_is_whitespace_word_count() {
        assert_eq!(approx_token_count("Hello there, friend"), 3);
        assert_eq!(approx_token_count("pong"), 1);
        assert_eq!(approx_token_count(""), 0);
        assert_eq!(approx_token_count("   "), 0);
        assert_eq!(approx_token_count("a\n b\tc"), 3);
    }

    #[test]
    fn test_format_duration_without_hours() {
        assert_eq!(format_duration(Duration::ZERO), "00:00.000");
        assert_eq!(format_duration(Duration::from_millis(61_234)), "01:01.234");
    }

    #[test]
    fn test_format_duration_with_hours() {
        let elapsed = Duration::from_millis(3_600_000 + 2 * 60_000 + 3_000 + 4);
        assert_eq!(format_duration(elapsed), "01:02:03.004");
    }

    #[test]
    fn test_short_previews_pass_through() {
        assert_eq!(truncate_preview("hello"), "hello");
    }

    #[test]
    fn test_long_previews_get_an_ellipsis() {
        let long = "x".repeat(60);
        let shown = truncate_preview(&long);
        assert_eq!(shown.chars().count(), PREVIEW_MAX_CHARS + 3);
        assert!(shown.ends_with("..."));
    }
}
