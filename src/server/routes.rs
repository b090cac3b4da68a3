//! HTTP route handlers for the Loquat relay API.
//!
//! `/chat` is the dispatcher: it validates a turn, forwards it to Ollama as
//! one non-streaming generation call, records the exchange, and owns
//! session-id assignment for new chats. The `/history` routes expose the
//! store to clients as plain list/fetch/delete.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::chat::{ChatId, Message, SidebarEntry};
use crate::llm::OllamaError;

use super::state::AppState;

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat_turn))
        .route("/history", get(history_sidebar))
        .route("/history/{chat_id}", get(chat_history).delete(delete_chat))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "loquat-relay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// One chat turn from a client.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
    /// Session to continue, absent when composing a new chat.
    #[serde(default)]
    pub chat_id: Option<ChatId>,
    /// Whether the client considers this the first turn of a new chat.
    #[serde(default)]
    pub new_chat: bool,
}

/// Successful chat turn response.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// The model's full response text.
    pub response: String,
    /// Session the turn was recorded under.
    pub chat_id: ChatId,
}

/// Failure body for `/chat`: a human-readable description in the same
/// `response` field a success would carry, never the raw upstream error.
#[derive(Debug, Serialize)]
pub struct ChatError {
    /// Human-readable failure description.
    pub response: String,
}

fn chat_error(status: StatusCode, text: &str) -> (StatusCode, Json<ChatError>) {
    (
        status,
        Json(ChatError {
            response: text.to_string(),
        }),
    )
}

/// Relay one chat turn to Ollama and record the exchange.
async fn chat_turn(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ChatError>)> {
    let message = request.message.trim();
    if message.is_empty() {
        tracing::warn!("chat turn rejected: no message provided");
        return Err(chat_error(StatusCode::BAD_REQUEST, "No message provided."));
    }

    tracing::info!(
        chat_id = ?request.chat_id,
        new_chat = request.new_chat,
        "received chat turn"
    );

    if !state.ollama.is_ready().await {
        tracing::error!("chat turn while the Ollama service is unreachable");
        return Err(chat_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "The Ollama service is not reachable.",
        ));
    }

    let response_text = state
        .ollama
        .generate(&state.model_name, message)
        .await
        .map_err(|err| {
            tracing::error!("ollama generation failed: {err}");
            match err {
                OllamaError::Timeout => chat_error(
                    StatusCode::GATEWAY_TIMEOUT,
                    "The Ollama request took too long to answer (timeout).",
                ),
                OllamaError::HttpStatusNotOk(_) => chat_error(
                    StatusCode::BAD_GATEWAY,
                    "The Ollama service rejected the generation request.",
                ),
                OllamaError::MalformedResponse | OllamaError::HttpClient(_) => chat_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to communicate with the Ollama service.",
                ),
            }
        })?;

    let (chat_id, created) = match request.chat_id {
        Some(id) if !request.new_chat => (id, false),
        _ => (ChatId::generate(), true),
    };

    let now_ms = chrono::Utc::now().timestamp_millis();
    state
        .history
        .append_turn(
            &chat_id,
            Message::user(message),
            Message::ai(response_text.as_str()),
            now_ms,
        )
        .await
        .map_err(|err| {
            tracing::error!("failed to record turn for chat {chat_id}: {err}");
            chat_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to record the conversation.",
            )
        })?;

    if created {
        tracing::info!("created new chat {chat_id}");
    } else {
        tracing::info!("appended turn to chat {chat_id}");
    }

    Ok(Json(ChatResponse {
        response: response_text,
        chat_id,
    }))
}

/// Sidebar list body.
#[derive(Debug, Serialize)]
pub struct SidebarResponse {
    /// Entries, most recently updated first.
    pub sidebar: Vec<SidebarEntry>,
}

/// Full transcript body.
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    /// Ordered transcript of the chat.
    pub messages: Vec<Message>,
}

/// Failure body for history fetches.
#[derive(Debug, Serialize)]
pub struct HistoryErrorBody {
    /// Human-readable failure description.
    pub error: String,
}

fn history_error(status: StatusCode, text: &str) -> (StatusCode, Json<HistoryErrorBody>) {
    (
        status,
        Json(HistoryErrorBody {
            error: text.to_string(),
        }),
    )
}

/// List chats for the sidebar.
async fn history_sidebar(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SidebarResponse>, (StatusCode, Json<HistoryErrorBody>)> {
    let sidebar = state.history.sidebar().await.map_err(|err| {
        tracing::error!("failed to list chats: {err}");
        history_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to list chat history.",
        )
    })?;
    Ok(Json(SidebarResponse { sidebar }))
}

/// Fetch the full transcript of one chat.
async fn chat_history(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> Result<Json<MessagesResponse>, (StatusCode, Json<HistoryErrorBody>)> {
    let id = ChatId::from(chat_id);
    let messages = state.history.messages(&id).await.map_err(|err| {
        tracing::error!("failed to fetch chat {id}: {err}");
        history_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch chat history.",
        )
    })?;

    if messages.is_empty() {
        return Err(history_error(
            StatusCode::NOT_FOUND,
            "Chat history not found.",
        ));
    }

    Ok(Json(MessagesResponse { messages }))
}

/// Delete outcome body, on both success and failure.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    /// Whether the chat was deleted.
    pub ok: bool,
    /// Failure description when `ok` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Delete one chat.
async fn delete_chat(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> Result<Json<DeleteResponse>, (StatusCode, Json<DeleteResponse>)> {
    let id = ChatId::from(chat_id);
    match state.history.delete(&id).await {
        Ok(true) => {
            tracing::info!("deleted chat {id}");
            Ok(Json(DeleteResponse {
                ok: true,
                error: None,
            }))
        }
        Ok(false) => Err((
            StatusCode::NOT_FOUND,
            Json(DeleteResponse {
                ok: false,
                error: Some("Chat not found.".to_string()),
            }),
        )),
        Err(err) => {
            tracing::error!("failed to delete chat {id}: {err}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(DeleteResponse {
                    ok: false,
                    error: Some("Failed to delete the chat.".to_string()),
                }),
            ))
        }
    }
}
