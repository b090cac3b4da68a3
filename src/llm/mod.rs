//! LLM-facing components: the upstream Ollama client.

pub mod ollama;

pub use ollama::{OllamaClient, OllamaError};
