//! SQLite-backed history store.

use std::sync::Arc;

use tokio_rusqlite::Connection;

use crate::chat::{ChatId, Message, Role, SidebarEntry};

use super::{HistoryResult, HistoryStore, StoreFuture};

/// Preview shown for a chat that somehow has no user message.
const UNTITLED_PREVIEW: &str = "Untitled chat";

/// Upper bound on sidebar entries returned in one listing.
const SIDEBAR_LIMIT: u32 = 100;

/// SQLite implementation of the history store.
pub struct SqliteHistoryStore {
    conn: Arc<Connection>,
}

impl SqliteHistoryStore {
    /// Initialize the store and create the schema if it doesn't exist.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub async fn new(conn: Arc<Connection>) -> HistoryResult<Self> {
        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS chats (
                    id TEXT PRIMARY KEY,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS messages (
                    chat_id TEXT NOT NULL,
                    seq INTEGER NOT NULL,
                    role TEXT NOT NULL,
                    text TEXT NOT NULL,
                    PRIMARY KEY (chat_id, seq)
                );
                CREATE INDEX IF NOT EXISTS idx_chats_updated
                    ON chats (updated_at DESC);",
            )?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }
}

/// The messages table only ever receives the two wire roles.
fn role_from_db(s: &str) -> Role {
    if s == "user" { Role::User } else { Role::Ai }
}

impl HistoryStore for SqliteHistoryStore {
    fn sidebar(&self) -> StoreFuture<'_, HistoryResult<Vec<SidebarEntry>>> {
        Box::pin(async move {
            let rows = self
                .conn
                .call(|conn| {
                    let mut stmt = conn.prepare(
                        "SELECT c.id,
                                COALESCE((SELECT m.text FROM messages m
                                          WHERE m.chat_id = c.id AND m.role = 'user'
                                          ORDER BY m.seq LIMIT 1), ?1)
                         FROM chats c
                         ORDER BY c.updated_at DESC
                         LIMIT ?2",
                    )?;
                    let rows = stmt
                        .query_map(rusqlite::params![UNTITLED_PREVIEW, SIDEBAR_LIMIT], |row| {
                            Ok(SidebarEntry {
                                chat_id: ChatId::from(row.get::<_, String>(0)?),
                                preview: row.get(1)?,
                            })
                        })?
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(rows)
                })
                .await?;
            Ok(rows)
        })
    }

    fn messages(&self, id: &ChatId) -> StoreFuture<'_, HistoryResult<Vec<Message>>> {
        let id_str = id.as_str().to_owned();
        Box::pin(async move {
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(
                        "SELECT role, text FROM messages
                         WHERE chat_id = ?1
                         ORDER BY seq",
                    )?;
                    let rows = stmt
                        .query_map([&id_str], |row| {
                            let role: String = row.get(0)?;
                            Ok(Message {
                                role: role_from_db(&role),
                                text: row.get(1)?,
                            })
                        })?
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(rows)
                })
                .await?;
            Ok(rows)
        })
    }

    fn append_turn(
        &self,
        id: &ChatId,
        user: Message,
        ai: Message,
        now_ms: i64,
    ) -> StoreFuture<'_, HistoryResult<()>> {
        let id_str = id.as_str().to_owned();
        Box::pin(async move {
            self.conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    tx.execute(
                        "INSERT INTO chats (id, created_at, updated_at)
                         VALUES (?1, ?2, ?2)
                         ON CONFLICT(id) DO UPDATE SET updated_at = ?2",
                        rusqlite::params![id_str, now_ms],
                    )?;
                    let next_seq: i64 = tx.query_row(
                        "SELECT COALESCE(MAX(seq) + 1, 0) FROM messages WHERE chat_id = ?1",
                        rusqlite::params![id_str],
                        |row| row.get(0),
                    )?;
                    tx.execute(
                        "INSERT INTO messages (chat_id, seq, role, text)
                         VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params![id_str, next_seq, user.role.as_str(), user.text],
                    )?;
                    tx.execute(
                        "INSERT INTO messages (chat_id, seq, role, text)
                         VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params![id_str, next_seq + 1, ai.role.as_str(), ai.text],
                    )?;
                    tx.commit()?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn delete(&self, id: &ChatId) -> StoreFuture<'_, HistoryResult<bool>> {
        let id_str = id.as_str().to_owned();
        Box::pin(async move {
            let existed = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let removed =
                        tx.execute("DELETE FROM chats WHERE id = ?1", rusqlite::params![id_str])?;
                    tx.execute(
                        "DELETE FROM messages WHERE chat_id = ?1",
                        rusqlite::params![id_str],
                    )?;
                    tx.commit()?;
                    Ok(removed > 0)
                })
                .await?;
            Ok(existed)
        })
    }

    fn exists(&self, id: &ChatId) -> StoreFuture<'_, HistoryResult<bool>> {
        let id_str = id.as_str().to_owned();
        Box::pin(async move {
            let exists = self
                .conn
                .call(move |conn| {
                    let count: i64 = conn.query_row(
                        "SELECT COUNT(*) FROM chats WHERE id = ?1",
                        rusqlite::params![id_str],
                        |row| row.get(0),
                    )?;
                    Ok(count > 0)
                })
                .await?;
            Ok(exists)
        })
    }
}
