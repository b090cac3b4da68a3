//! HTTP adapters for the relay server: session history and chat turns.
//!
//! Pure I/O; no session state lives here.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::chat::{ChatId, Message, SidebarEntry};

/// Default relay base URL.
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Environment variable overriding the relay base URL.
const SERVER_URL_ENV: &str = "LOQUAT_SERVER_URL";

/// Connection timeout for all calls.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Full-request timeout for history calls.
const HISTORY_TIMEOUT: Duration = Duration::from_secs(10);
/// Full-request timeout for a chat turn; the upstream generation may run
/// long, so this sits above the relay's own generation timeout.
const TURN_TIMEOUT: Duration = Duration::from_secs(150);

/// Errors from the session store client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The configured base URL could not be parsed.
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Transport-level failure reaching the server.
    #[error("http client error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The server answered with an unexpected status.
    #[error("server answered with status {0}")]
    Status(StatusCode),
}

/// Errors from submitting a chat turn to the relay.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The relay, or the network path to it, failed before producing a
    /// normalized response.
    #[error("cannot reach the relay: {0}")]
    Transport(#[from] reqwest::Error),
    /// The relay answered with a non-success status and a descriptive
    /// failure text.
    #[error("relay error ({status}): {message}")]
    Upstream {
        /// HTTP status of the failure.
        status: StatusCode,
        /// Human-readable description from the relay.
        message: String,
    },
    /// The response body did not match the expected shape.
    #[error("malformed relay response")]
    Malformed,
}

/// Relay base URL from `LOQUAT_SERVER_URL`, or the local default.
#[must_use]
pub fn server_url_from_env() -> String {
    std::env::var(SERVER_URL_ENV).unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string())
}

/// Ensure a base URL ends with `/` so joins append instead of replace.
fn parse_base(base_url: &str) -> Result<Url, ApiError> {
    if base_url.ends_with('/') {
        Ok(Url::parse(base_url)?)
    } else {
        Ok(Url::parse(&format!("{base_url}/"))?)
    }
}

#[derive(Debug, Deserialize)]
struct SidebarBody {
    sidebar: Vec<SidebarEntry>,
}

#[derive(Debug, Deserialize)]
struct MessagesBody {
    messages: Vec<Message>,
}

/// Client for the history endpoints of the relay: list, fetch, delete.
pub struct HistoryClient {
    client: Client,
    base_url: Url,
}

impl HistoryClient {
    /// Create a client against an explicit base URL.
    ///
    /// # Errors
    /// Returns an error if the URL cannot be parsed or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(HISTORY_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: parse_base(base_url)?,
        })
    }

    /// Create a client against the URL from `LOQUAT_SERVER_URL`.
    ///
    /// # Errors
    /// Returns an error if the URL cannot be parsed or the HTTP client
    /// cannot be built.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::new(&server_url_from_env())
    }

    /// List sidebar entries.
    ///
    /// # Errors
    /// Returns an error on transport failure, a non-success status, or a
    /// body that doesn't parse.
    pub async fn sidebar(&self) -> Result<Vec<SidebarEntry>, ApiError> {
        let url = self.base_url.join("history")?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        let body: SidebarBody = response.json().await?;
        Ok(body.sidebar)
    }

    /// Fetch the ordered transcript of one chat.
    ///
    /// # Errors
    /// Returns an error on transport failure, a non-success status
    /// (including 404 for an unknown chat), or a body that doesn't parse.
    pub async fn messages(&self, id: &ChatId) -> Result<Vec<Message>, ApiError> {
        let url = self.base_url.join(&format!("history/{id}"))?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        let body: MessagesBody = response.json().await?;
        Ok(body.messages)
    }

    /// Delete one chat.
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success status; no
    /// partial deletion is assumed in that case.
    pub async fn delete(&self, id: &ChatId) -> Result<(), ApiError> {
        let url = self.base_url.join(&format!("history/{id}"))?;
        let response = self.client.delete(url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct TurnRequest<'a> {
    message: &'a str,
    chat_id: Option<&'a ChatId>,
    new_chat: bool,
}

/// Normalized success payload of `POST /chat`.
#[derive(Debug, Deserialize)]
pub struct TurnReply {
    /// The model's full response text.
    pub response: String,
    /// Session the turn was recorded under.
    pub chat_id: ChatId,
}

#[derive(Debug, Deserialize)]
struct TurnFailure {
    response: Option<String>,
}

/// Client for the `/chat` endpoint of the relay.
pub struct ProxyClient {
    client: Client,
    turn_url: Url,
}

impl ProxyClient {
    /// Create a client against an explicit base URL.
    ///
    /// # Errors
    /// Returns an error if the URL cannot be parsed or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TURN_TIMEOUT)
            .build()?;
        let turn_url = parse_base(base_url)?.join("chat")?;
        Ok(Self { client, turn_url })
    }

    /// Create a client against the URL from `LOQUAT_SERVER_URL`.
    ///
    /// # Errors
    /// Returns an error if the URL cannot be parsed or the HTTP client
    /// cannot be built.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::new(&server_url_from_env())
    }

    /// Submit one turn and wait for the complete response.
    ///
    /// # Errors
    /// `ProxyError::Upstream` when the relay answered non-success with a
    /// descriptive body; `Transport` or `Malformed` otherwise.
    pub async fn submit(
        &self,
        message: &str,
        chat_id: Option<&ChatId>,
        new_chat: bool,
    ) -> Result<TurnReply, ProxyError> {
        let response = self
            .client
            .post(self.turn_url.clone())
            .json(&TurnRequest {
                message,
                chat_id,
                new_chat,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<TurnReply>()
                .await
                .map_err(|_| ProxyError::Malformed);
        }

        let description = response
            .json::<TurnFailure>()
            .await
            .ok()
            .and_then(|body| body.response)
            .unwrap_or_else(|| format!("relay answered with status {status}"));
        Err(ProxyError::Upstream {
            status,
            message: description,
        })
    }
}
