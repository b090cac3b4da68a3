//! Terminal chat client for the Loquat relay.
//!
//! Thin presentation layer: all protocol behavior lives in the library's
//! `client` module. Input is line-based; end a line with `\` to insert a
//! literal newline and keep composing.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use loquat::chat::{ChatId, Message, Role, SidebarEntry};
use loquat::client::surface::{Surface, format_duration, truncate_preview};
use loquat::client::{ChatClient, HistoryClient, ProxyClient};
use loquat::start_loquat;

/// Renders client state as plain terminal output.
struct TermSurface;

impl Surface for TermSurface {
    fn show_transcript(&self, messages: &[Message]) {
        println!();
        for message in messages {
            let tag = match message.role {
                Role::User => "you",
                Role::Ai => " ai",
            };
            println!("[{tag}] {}", message.text);
        }
    }

    fn show_sidebar(&self, entries: &[SidebarEntry], active: Option<&ChatId>) {
        println!("-- chats --");
        if entries.is_empty() {
            println!("   (none)");
        }
        for (index, entry) in entries.iter().enumerate() {
            let marker = if Some(&entry.chat_id) == active {
                '*'
            } else {
                ' '
            };
            println!("{marker}{index}: {}", truncate_preview(&entry.preview));
        }
    }

    fn show_sidebar_error(&self, text: &str) {
        println!("-- chats unavailable: {text} --");
    }

    fn show_token_count(&self, count: usize) {
        println!("tokens: {count}");
    }

    fn show_elapsed(&self, elapsed: Duration) {
        // The live readout overwrites itself in place on stderr.
        eprint!("\rtime: {}   ", format_duration(elapsed));
        let _ = io::stderr().flush();
    }

    fn set_backend_alert(&self, visible: bool) {
        if visible {
            println!("!! backend unavailable");
        }
    }

    fn clear_input(&self) {
        // Line-based input; there is no persistent buffer to clear.
    }

    fn show_error(&self, text: &str) {
        println!("error: {text}");
    }
}

fn print_help() {
    println!("commands:");
    println!("  /new        start a new chat");
    println!("  /open N     open the Nth chat from the list");
    println!("  /delete N   delete the Nth chat from the list");
    println!("  /refresh    re-fetch the chat list");
    println!("  /quit       exit");
    println!("anything else is sent as a message; end a line with \\ for a newline");
}

/// Resolve a `/open N` or `/delete N` argument against the current list.
fn entry_at(client: &ChatClient, arg: &str) -> Option<ChatId> {
    let index: usize = arg.trim().parse().ok()?;
    client
        .sidebar_entries()
        .get(index)
        .map(|entry| entry.chat_id.clone())
}

fn main() -> ExitCode {
    start_loquat::init_client_tracing();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let history = match HistoryClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("failed to set up the history client: {e}");
            return ExitCode::from(1);
        }
    };
    let proxy = match ProxyClient::from_env() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("failed to set up the proxy client: {e}");
            return ExitCode::from(1);
        }
    };

    let surface: Arc<dyn Surface> = Arc::new(TermSurface);
    let mut client = ChatClient::new(history, proxy, surface);

    println!("loquat: type a message, or /help for commands");
    rt.block_on(client.start());

    let stdin = io::stdin();
    let mut composed = String::new();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };

        if let Some(stripped) = line.strip_suffix('\\') {
            // Literal newline: keep composing.
            composed.push_str(stripped);
            composed.push('\n');
            continue;
        }
        composed.push_str(&line);
        let input = std::mem::take(&mut composed);

        match input.trim() {
            "/quit" => break,
            "/help" => print_help(),
            "/new" => client.new_chat(),
            "/refresh" => rt.block_on(client.refresh()),
            command if command.starts_with("/open") => {
                match entry_at(&client, command.trim_start_matches("/open")) {
                    Some(id) => rt.block_on(client.select(id)),
                    None => println!("no such chat; try /refresh"),
                }
            }
            command if command.starts_with("/delete") => {
                match entry_at(&client, command.trim_start_matches("/delete")) {
                    Some(id) => rt.block_on(client.delete(&id)),
                    None => println!("no such chat; try /refresh"),
                }
            }
            _ => {
                rt.block_on(client.submit(&input));
                eprintln!();
            }
        }
    }

    ExitCode::SUCCESS
}
