//! End-to-end scenarios: client, relay, and a stub Ollama upstream wired
//! together over real sockets on ephemeral ports.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;

use loquat::chat::{ChatId, Message, SidebarEntry};
use loquat::client::surface::Surface;
use loquat::client::{ChatClient, HistoryClient, ProxyClient, TurnOutcome};
use loquat::history::SqliteHistoryStore;
use loquat::llm::OllamaClient;
use loquat::server::{AppState, create_router};

/// Serve a router on an ephemeral port and return its address.
async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// A stand-in Ollama that always answers `reply`.
fn stub_ollama(reply: &'static str) -> Router {
    Router::new()
        .route(
            "/api/version",
            get(|| async { Json(serde_json::json!({ "version": "0.0.0" })) }),
        )
        .route(
            "/api/generate",
            post(move || async move { Json(serde_json::json!({ "response": reply })) }),
        )
}

/// A stand-in Ollama that is up but fails every generation.
fn broken_ollama() -> Router {
    Router::new()
        .route(
            "/api/version",
            get(|| async { Json(serde_json::json!({ "version": "0.0.0" })) }),
        )
        .route(
            "/api/generate",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        )
}

/// Spin up a real relay over an in-memory store, pointed at `ollama_addr`.
async fn spawn_relay(ollama_addr: SocketAddr) -> SocketAddr {
    let ollama = OllamaClient::new(&format!("http://{ollama_addr}")).expect("ollama client");
    let conn = tokio_rusqlite::Connection::open_in_memory()
        .await
        .expect("open db");
    let store = SqliteHistoryStore::new(Arc::new(conn))
        .await
        .expect("create store");
    let state = AppState::new(ollama, Arc::new(store));
    spawn(create_router(state)).await
}

/// Grab an address nothing listens on.
async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    addr
}

/// Surface that records every call for assertions.
#[derive(Default)]
struct RecordingSurface {
    transcripts: Mutex<Vec<Vec<Message>>>,
    sidebars: Mutex<Vec<Vec<SidebarEntry>>>,
    sidebar_errors: Mutex<Vec<String>>,
    token_counts: Mutex<Vec<usize>>,
    elapsed: Mutex<Vec<Duration>>,
    alerts: Mutex<Vec<bool>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingSurface {
    fn last_tokens(&self) -> Option<usize> {
        self.token_counts.lock().expect("lock").last().copied()
    }

    fn last_alert(&self) -> Option<bool> {
        self.alerts.lock().expect("lock").last().copied()
    }

    fn last_elapsed(&self) -> Option<Duration> {
        self.elapsed.lock().expect("lock").last().copied()
    }
}

impl Surface for RecordingSurface {
    fn show_transcript(&self, messages: &[Message]) {
        self.transcripts
            .lock()
            .expect("lock")
            .push(messages.to_vec());
    }

    fn show_sidebar(&self, entries: &[SidebarEntry], _active: Option<&ChatId>) {
        self.sidebars.lock().expect("lock").push(entries.to_vec());
    }

    fn show_sidebar_error(&self, text: &str) {
        self.sidebar_errors
            .lock()
            .expect("lock")
            .push(text.to_string());
    }

    fn show_token_count(&self, count: usize) {
        self.token_counts.lock().expect("lock").push(count);
    }

    fn show_elapsed(&self, elapsed: Duration) {
        self.elapsed.lock().expect("lock").push(elapsed);
    }

    fn set_backend_alert(&self, visible: bool) {
        self.alerts.lock().expect("lock").push(visible);
    }

    fn clear_input(&self) {}

    fn show_error(&self, text: &str) {
        self.errors.lock().expect("lock").push(text.to_string());
    }
}

fn client_against(base: &str, surface: Arc<RecordingSurface>) -> ChatClient {
    ChatClient::new(
        HistoryClient::new(base).expect("history client"),
        ProxyClient::new(base).expect("proxy client"),
        surface,
    )
}

#[tokio::test]
async fn test_new_chat_turn_adopts_server_id_and_appears_in_sidebar() {
    let ollama_addr = spawn(stub_ollama("pong")).await;
    let relay_addr = spawn_relay(ollama_addr).await;
    let base = format!("http://{relay_addr}");

    let surface = Arc::new(RecordingSurface::default());
    let mut client = client_against(&base, surface.clone());
    client.start().await;

    let outcome = client.submit("ping").await;
    assert_eq!(outcome, TurnOutcome::Resolved);

    // The optimistic render happened before the reply: user echo plus
    // placeholder, later replaced in place.
    {
        let transcripts = surface.transcripts.lock().expect("lock");
        assert_eq!(
            transcripts[0],
            vec![Message::user("ping"), Message::ai("...")]
        );
    }

    assert_eq!(
        client.conversation().messages(),
        &[Message::user("ping"), Message::ai("pong")]
    );
    let active = client
        .conversation()
        .active()
        .cloned()
        .expect("server-assigned id adopted");

    assert_eq!(surface.last_tokens(), Some(1));
    assert_eq!(surface.last_alert(), Some(false));

    // The resolve path already refreshed the sidebar; the new id is there.
    assert!(
        client
            .sidebar_entries()
            .iter()
            .any(|entry| entry.chat_id == active)
    );
    assert_eq!(client.sidebar_entries()[0].preview, "ping");
}

#[tokio::test]
async fn test_continuing_a_chat_reuses_its_id_and_appends() {
    let ollama_addr = spawn(stub_ollama("pong")).await;
    let relay_addr = spawn_relay(ollama_addr).await;
    let base = format!("http://{relay_addr}");

    let surface = Arc::new(RecordingSurface::default());
    let mut client = client_against(&base, surface);
    client.start().await;

    client.submit("first").await;
    let first_id = client.conversation().active().cloned().expect("first id");
    client.submit("second").await;
    let second_id = client.conversation().active().cloned().expect("second id");
    assert_eq!(first_id, second_id);

    // Exactly one sidebar entry, and the server transcript holds both
    // turns in order.
    assert_eq!(client.sidebar_entries().len(), 1);
    let history = HistoryClient::new(&base).expect("history client");
    let messages = history.messages(&first_id).await.expect("fetch transcript");
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0], Message::user("first"));
    assert_eq!(messages[1], Message::ai("pong"));
    assert_eq!(messages[2], Message::user("second"));
}

#[tokio::test]
async fn test_each_submission_appends_exactly_one_turn_pair() {
    let ollama_addr = spawn(stub_ollama("pong")).await;
    let relay_addr = spawn_relay(ollama_addr).await;
    let base = format!("http://{relay_addr}");

    let surface = Arc::new(RecordingSurface::default());
    let mut client = client_against(&base, surface);
    client.start().await;

    assert_eq!(client.submit("   ").await, TurnOutcome::RejectedEmpty);
    assert!(client.conversation().messages().is_empty());

    client.submit("one").await;
    assert_eq!(client.conversation().messages().len(), 2);
    client.submit("two").await;
    assert_eq!(client.conversation().messages().len(), 4);
}

#[tokio::test]
async fn test_failed_turn_renders_the_relay_description() {
    let router = Router::new()
        .route(
            "/history",
            get(|| async { Json(serde_json::json!({ "sidebar": [] })) }),
        )
        .route(
            "/chat",
            post(|| async {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(serde_json::json!({ "response": "model unavailable" })),
                )
            }),
        );
    let relay_addr = spawn(router).await;
    let base = format!("http://{relay_addr}");

    let surface = Arc::new(RecordingSurface::default());
    let mut client = client_against(&base, surface.clone());
    client.start().await;

    let outcome = client.submit("ping").await;
    assert_eq!(outcome, TurnOutcome::Failed);

    assert_eq!(
        client.conversation().messages(),
        &[
            Message::user("ping"),
            Message::ai("model unavailable"),
        ]
    );
    assert_eq!(surface.last_tokens(), Some(0));
    assert_eq!(surface.last_alert(), Some(true));
    assert_eq!(surface.last_elapsed(), Some(Duration::ZERO));
}

#[tokio::test]
async fn test_unreachable_relay_marks_backend_unavailable() {
    let base = format!("http://{}", dead_addr().await);

    let surface = Arc::new(RecordingSurface::default());
    let mut client = client_against(&base, surface.clone());

    let outcome = client.submit("ping").await;
    assert_eq!(outcome, TurnOutcome::Failed);

    let messages = client.conversation().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0], Message::user("ping"));
    assert_eq!(messages[1], Message::ai("Could not reach the backend."));
    assert_eq!(surface.last_alert(), Some(true));
    assert_eq!(surface.last_tokens(), Some(0));
}

#[tokio::test]
async fn test_alert_clears_on_the_next_resolved_turn() {
    let ollama_addr = spawn(stub_ollama("pong")).await;
    let relay_addr = spawn_relay(ollama_addr).await;
    let base = format!("http://{relay_addr}");

    let surface = Arc::new(RecordingSurface::default());
    let mut client = client_against(&base, surface.clone());
    client.start().await;

    // Fail once against a dead relay, then succeed against the live one.
    let dead = format!("http://{}", dead_addr().await);
    let mut dead_client = client_against(&dead, surface.clone());
    dead_client.submit("ping").await;
    assert_eq!(surface.last_alert(), Some(true));

    client.submit("ping").await;
    assert_eq!(surface.last_alert(), Some(false));
}

#[tokio::test]
async fn test_select_shows_exactly_the_selected_chats_messages() {
    let ollama_addr = spawn(stub_ollama("pong")).await;
    let relay_addr = spawn_relay(ollama_addr).await;
    let base = format!("http://{relay_addr}");

    let surface = Arc::new(RecordingSurface::default());
    let mut client = client_against(&base, surface);
    client.start().await;

    client.submit("apples").await;
    let apples = client.conversation().active().cloned().expect("apples id");
    client.new_chat();
    client.submit("oranges").await;
    let oranges = client.conversation().active().cloned().expect("oranges id");
    assert_ne!(apples, oranges);

    client.select(apples.clone()).await;
    assert_eq!(
        client.conversation().messages(),
        &[Message::user("apples"), Message::ai("pong")]
    );

    client.select(oranges).await;
    assert_eq!(
        client.conversation().messages(),
        &[Message::user("oranges"), Message::ai("pong")]
    );
}

#[tokio::test]
async fn test_deleting_the_active_chat_clears_selection_and_state() {
    let ollama_addr = spawn(stub_ollama("pong")).await;
    let relay_addr = spawn_relay(ollama_addr).await;
    let base = format!("http://{relay_addr}");

    let surface = Arc::new(RecordingSurface::default());
    let mut client = client_against(&base, surface.clone());
    client.start().await;

    client.submit("ping").await;
    let id = client.conversation().active().cloned().expect("active id");

    client.delete(&id).await;
    assert!(client.conversation().active().is_none());
    assert!(client.conversation().messages().is_empty());
    assert!(client.sidebar_entries().is_empty());

    // The sidebar view was rebuilt from the post-delete server truth.
    let sidebars = surface.sidebars.lock().expect("lock");
    assert_eq!(sidebars.last(), Some(&Vec::new()));
}

#[tokio::test]
async fn test_failed_delete_leaves_state_unchanged() {
    let ollama_addr = spawn(stub_ollama("pong")).await;
    let relay_addr = spawn_relay(ollama_addr).await;
    let base = format!("http://{relay_addr}");

    let surface = Arc::new(RecordingSurface::default());
    let mut client = client_against(&base, surface.clone());
    client.start().await;

    client.submit("ping").await;
    let active = client.conversation().active().cloned().expect("active id");

    client.delete(&ChatId::from("not-a-chat")).await;

    assert_eq!(client.conversation().active(), Some(&active));
    assert_eq!(client.conversation().messages().len(), 2);
    assert_eq!(client.sidebar_entries().len(), 1);
    assert!(!surface.errors.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn test_sidebar_refresh_failure_shows_an_inline_error() {
    let base = format!("http://{}", dead_addr().await);

    let surface = Arc::new(RecordingSurface::default());
    let mut client = client_against(&base, surface.clone());
    client.start().await;

    assert!(client.sidebar_entries().is_empty());
    assert!(!surface.sidebar_errors.lock().expect("lock").is_empty());
    // The list view itself was never rebuilt from a failed fetch.
    assert!(surface.sidebars.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn test_stale_selection_is_dropped_when_the_list_empties() {
    let sidebar = Arc::new(Mutex::new(serde_json::json!([
        { "chat_id": "abc123", "preview": "hello" }
    ])));
    let sidebar_for_list = Arc::clone(&sidebar);
    let router = Router::new()
        .route(
            "/history",
            get(move || {
                let sidebar = Arc::clone(&sidebar_for_list);
                async move {
                    let entries = sidebar.lock().expect("lock").clone();
                    Json(serde_json::json!({ "sidebar": entries }))
                }
            }),
        )
        .route(
            "/history/{chat_id}",
            get(|| async {
                Json(serde_json::json!({
                    "messages": [
                        { "role": "user", "text": "hello" },
                        { "role": "ai", "text": "hi" }
                    ]
                }))
            }),
        );
    let relay_addr = spawn(router).await;
    let base = format!("http://{relay_addr}");

    let surface = Arc::new(RecordingSurface::default());
    let mut client = client_against(&base, surface);
    client.start().await;
    client.select(ChatId::from("abc123")).await;
    assert_eq!(client.conversation().messages().len(), 2);

    // The session vanishes server-side; the next refresh must not leave an
    // orphaned selection behind.
    *sidebar.lock().expect("lock") = serde_json::json!([]);
    client.refresh().await;

    assert!(client.conversation().active().is_none());
    assert!(client.conversation().messages().is_empty());
    assert!(client.sidebar_entries().is_empty());
}

#[tokio::test]
async fn test_relay_rejects_empty_messages() {
    let ollama_addr = spawn(stub_ollama("pong")).await;
    let relay_addr = spawn_relay(ollama_addr).await;

    let response = reqwest::Client::new()
        .post(format!("http://{relay_addr}/chat"))
        .json(&serde_json::json!({ "message": "   " }))
        .send()
        .await
        .expect("send");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await.expect("body");
    assert_eq!(body["response"], "No message provided.");
}

#[tokio::test]
async fn test_upstream_failure_maps_to_bad_gateway_with_description() {
    let ollama_addr = spawn(broken_ollama()).await;
    let relay_addr = spawn_relay(ollama_addr).await;

    let response = reqwest::Client::new()
        .post(format!("http://{relay_addr}/chat"))
        .json(&serde_json::json!({ "message": "hi", "new_chat": true }))
        .send()
        .await
        .expect("send");
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);

    let body: serde_json::Value = response.json().await.expect("body");
    assert_eq!(
        body["response"],
        "The Ollama service rejected the generation request."
    );
}

#[tokio::test]
async fn test_offline_ollama_maps_to_service_unavailable() {
    let relay_addr = spawn_relay(dead_addr().await).await;

    let response = reqwest::Client::new()
        .post(format!("http://{relay_addr}/chat"))
        .json(&serde_json::json!({ "message": "hi" }))
        .send()
        .await
        .expect("send");
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    let body: serde_json::Value = response.json().await.expect("body");
    assert_eq!(body["response"], "The Ollama service is not reachable.");
}

#[tokio::test]
async fn test_unknown_chat_history_is_not_found() {
    let ollama_addr = spawn(stub_ollama("pong")).await;
    let relay_addr = spawn_relay(ollama_addr).await;

    let response = reqwest::get(format!("http://{relay_addr}/history/nope"))
        .await
        .expect("send");
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    let body: serde_json::Value = response.json().await.expect("body");
    assert_eq!(body["error"], "Chat history not found.");
}

#[tokio::test]
async fn test_delete_round_trip_over_http() {
    let ollama_addr = spawn(stub_ollama("pong")).await;
    let relay_addr = spawn_relay(ollama_addr).await;
    let base = format!("http://{relay_addr}");

    let proxy = ProxyClient::new(&base).expect("proxy client");
    let reply = proxy
        .submit("hello", None, true)
        .await
        .expect("turn resolves");

    let history = HistoryClient::new(&base).expect("history client");
    assert_eq!(history.sidebar().await.expect("sidebar").len(), 1);

    history.delete(&reply.chat_id).await.expect("delete");
    assert!(history.sidebar().await.expect("sidebar").is_empty());

    // Deleting again reports not-found.
    assert!(history.delete(&reply.chat_id).await.is_err());
}
