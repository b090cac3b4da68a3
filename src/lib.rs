//! Loquat: a small chat client and relay for local Ollama models.
//!
//! The relay turns one chat turn into one non-streaming Ollama generation
//! call and records the exchange; the client keeps an ordered conversation
//! in sync with the server-held history across create, read, and delete
//! operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Shared chat data model.
pub mod chat;
/// Client-side session protocol.
pub mod client;
/// Server-side chat history store.
pub mod history;
/// LLM-focused components, including the Ollama client.
pub mod llm;
/// HTTP server and API routes.
pub mod server;
/// Entry helpers for the Loquat binaries.
pub mod start_loquat;
