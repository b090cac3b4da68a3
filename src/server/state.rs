//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::history::HistoryStore;
use crate::llm::OllamaClient;

/// Default model identifier sent upstream with every generation.
const DEFAULT_MODEL: &str = "gemma3n:e4b";

/// Environment variable overriding the model identifier.
const MODEL_ENV: &str = "LOQUAT_MODEL";

/// Shared application state.
pub struct AppState {
    /// Ollama client for generation calls.
    pub ollama: OllamaClient,
    /// Model identifier to use.
    pub model_name: String,
    /// Persisted chat history.
    pub history: Arc<dyn HistoryStore>,
}

impl AppState {
    /// Create application state, with the model name taken from the
    /// environment when set.
    #[must_use]
    pub fn new(ollama: OllamaClient, history: Arc<dyn HistoryStore>) -> Arc<Self> {
        let model_name = std::env::var(MODEL_ENV).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Arc::new(Self {
            ollama,
            model_name,
            history,
        })
    }
}
