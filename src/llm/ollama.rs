//! Async Ollama client for one-shot, non-streaming generation.
//!
//! Behaviour:
//! - Check whether Ollama is reachable via `GET /api/version`.
//! - Generate via `POST /api/generate` with `stream: false` and wait for
//!   the complete response; no partial-token delivery.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default Ollama base URL.
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Environment variable overriding the Ollama base URL.
const OLLAMA_URL_ENV: &str = "LOQUAT_OLLAMA_URL";

/// Target context length (tokens).
const CONTEXT_LENGTH: u32 = 8_192;

/// Keep the model loaded in memory between turns.
const KEEP_ALIVE: &str = "1h";

/// Connection timeout for all calls.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Full-request timeout for long-running generations.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);
/// Short timeout for the readiness probe.
const READY_TIMEOUT: Duration = Duration::from_secs(3);

/// Conservative batch size for an 8K context.
const NUM_BATCH: u32 = 256;
/// Token budget per generation.
const NUM_PREDICT: u32 = 512;
/// Fallback thread count when `available_parallelism()` is unavailable.
const DEFAULT_NUM_THREAD: u32 = 8;

/// Errors produced by the Ollama client.
#[derive(Debug, Error)]
pub enum OllamaError {
    /// The generation request did not complete in time.
    #[error("ollama request timed out")]
    Timeout,
    /// Ollama answered with a non-success HTTP status.
    #[error("ollama http status not ok: {0}")]
    HttpStatusNotOk(u16),
    /// The response body could not be decoded, or carried no text.
    #[error("ollama response malformed")]
    MalformedResponse,
    /// Transport-level failure talking to Ollama.
    #[error("http client error: {0}")]
    HttpClient(reqwest::Error),
}

impl OllamaError {
    /// Classify a transport error, pulling timeouts out into their own
    /// variant so callers can map them to a distinct status.
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::HttpClient(err)
        }
    }
}

#[derive(Serialize)]
struct GenerateOptions {
    num_ctx: u32,
    num_predict: u32,
    num_batch: u32,
    num_thread: u32,
    f16_kv: bool,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    keep_alive: &'a str,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Async client for a single Ollama server.
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    /// Create a client against the URL from `LOQUAT_OLLAMA_URL`, falling
    /// back to the local default.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_env() -> Result<Self, OllamaError> {
        Self::new(&base_url_from_env())
    }

    /// Create a client against an explicit base URL.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, OllamaError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(GENERATE_TIMEOUT)
            .build()
            .map_err(OllamaError::from_transport)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Probe `GET /api/version` and report whether the server responds.
    pub async fn is_ready(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);
        match self.client.get(&url).timeout(READY_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Generate a complete response for `prompt` and return the raw text.
    ///
    /// The prompt is forwarded as-is; no conversation history travels
    /// upstream, so each turn is stateless from Ollama's perspective.
    ///
    /// # Errors
    /// Returns an error if the request fails, times out, Ollama answers
    /// with a non-success status, or the payload carries no text.
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String, OllamaError> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            keep_alive: KEEP_ALIVE,
            options: GenerateOptions {
                num_ctx: CONTEXT_LENGTH,
                num_predict: NUM_PREDICT,
                num_batch: NUM_BATCH,
                num_thread: detect_num_thread(),
                f16_kv: true,
            },
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(OllamaError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(OllamaError::HttpStatusNotOk(status.as_u16()));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|_| OllamaError::MalformedResponse)?;
        body.response.ok_or(OllamaError::MalformedResponse)
    }
}

/// Ollama base URL from the environment, or the local default.
fn base_url_from_env() -> String {
    std::env::var(OLLAMA_URL_ENV).unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string())
}

fn detect_num_thread() -> u32 {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .map_or(DEFAULT_NUM_THREAD, |v| u32::try_from(v).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = OllamaClient::new("http://127.0.0.1:11434/").expect("build client");
        assert_eq!(client.base_url, "http://127.0.0.1:11434");
    }

    #[test]
    fn test_detect_num_thread_is_nonzero() {
        assert!(detect_num_thread() > 0);
    }
}
