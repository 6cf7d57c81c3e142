//! libSQL backend — async `ConversationStore` implementation.
//!
//! Supports local file and in-memory databases; the schema is created on open.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::traits::{Conversation, ConversationStore, NewMessage, Role, StoredMessage};

/// libSQL database backend.
///
/// Holds a single connection reused for all operations; `libsql::Connection`
/// is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS conversations (
                     id         TEXT PRIMARY KEY,
                     user_id    TEXT NOT NULL UNIQUE,
                     created_at TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS messages (
                     id              TEXT PRIMARY KEY,
                     conversation_id TEXT NOT NULL REFERENCES conversations(id),
                     role            TEXT NOT NULL,
                     content         TEXT NOT NULL,
                     created_at      TEXT NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_messages_conversation
                     ON messages(conversation_id);",
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("init_schema: {e}")))?;
        Ok(())
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Parse an RFC 3339 datetime string written by this backend.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

fn str_to_role(s: &str) -> Role {
    match s {
        "bot" => Role::Bot,
        _ => Role::User,
    }
}

fn row_to_conversation(row: &libsql::Row) -> Result<Conversation, libsql::Error> {
    let id_str: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let created_str: String = row.get(2)?;

    Ok(Conversation {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        user_id,
        created_at: parse_datetime(&created_str),
    })
}

fn row_to_message(row: &libsql::Row) -> Result<StoredMessage, libsql::Error> {
    let id_str: String = row.get(0)?;
    let conversation_str: String = row.get(1)?;
    let role_str: String = row.get(2)?;
    let content: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    Ok(StoredMessage {
        id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::nil()),
        conversation_id: Uuid::parse_str(&conversation_str).unwrap_or_else(|_| Uuid::nil()),
        role: str_to_role(&role_str),
        content,
        created_at: parse_datetime(&created_str),
    })
}

// ── ConversationStore implementation ────────────────────────────────

#[async_trait]
impl ConversationStore for LibSqlBackend {
    async fn find_conversation(
        &self,
        user_id: &str,
    ) -> Result<Option<Conversation>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT id, user_id, created_at FROM conversations WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_conversation: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let conversation = row_to_conversation(&row)
                    .map_err(|e| DatabaseError::Query(format!("find_conversation: {e}")))?;
                Ok(Some(conversation))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_conversation: {e}"))),
        }
    }

    async fn create_conversation(&self, user_id: &str) -> Result<Conversation, DatabaseError> {
        let conn = self.conn();
        let id = Uuid::new_v4();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO conversations (id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![id.to_string(), user_id, now.to_rfc3339()],
        )
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE") {
                DatabaseError::Constraint(format!("conversation already exists for {user_id}"))
            } else {
                DatabaseError::Query(format!("create_conversation: {e}"))
            }
        })?;

        debug!(user_id, conversation_id = %id, "Conversation created");
        Ok(Conversation {
            id,
            user_id: user_id.to_string(),
            created_at: now,
        })
    }

    async fn append_messages(
        &self,
        conversation_id: Uuid,
        messages: &[NewMessage],
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        for message in messages {
            let id = Uuid::new_v4();
            conn.execute(
                "INSERT INTO messages (id, conversation_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    conversation_id.to_string(),
                    message.role.as_str(),
                    message.content.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append_messages: {e}")))?;
        }
        Ok(())
    }

    async fn list_messages(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<StoredMessage>, DatabaseError> {
        let conn = self.conn();
        // rowid tiebreak keeps user/bot order for same-instant appends
        let mut rows = conn
            .query(
                "SELECT id, conversation_id, role, content, created_at FROM messages
                 WHERE conversation_id = ?1 ORDER BY created_at ASC, rowid ASC",
                params![conversation_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_message(&row) {
                Ok(msg) => messages.push(msg),
                Err(e) => {
                    tracing::warn!("Skipping message row: {e}");
                }
            }
        }
        Ok(messages)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    #[tokio::test]
    async fn find_missing_conversation() {
        let store = test_store().await;
        assert!(store.find_conversation("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_and_find_conversation() {
        let store = test_store().await;
        let created = store.create_conversation("chat-42").await.unwrap();

        let found = store.find_conversation("chat-42").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.user_id, "chat-42");
    }

    #[tokio::test]
    async fn duplicate_conversation_rejected() {
        let store = test_store().await;
        store.create_conversation("chat-42").await.unwrap();

        let err = store.create_conversation("chat-42").await.unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn append_preserves_order() {
        let store = test_store().await;
        let conversation = store.create_conversation("chat-42").await.unwrap();

        store
            .append_messages(
                conversation.id,
                &[NewMessage::user("yes"), NewMessage::bot("Great!")],
            )
            .await
            .unwrap();
        store
            .append_messages(
                conversation.id,
                &[NewMessage::user("3"), NewMessage::bot("Thanks!")],
            )
            .await
            .unwrap();

        let messages = store.list_messages(conversation.id).await.unwrap();
        assert_eq!(messages.len(), 4);
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::User, Role::Bot, Role::User, Role::Bot]);
        assert_eq!(messages[0].content, "yes");
        assert_eq!(messages[3].content, "Thanks!");
    }

    #[tokio::test]
    async fn conversations_do_not_leak_messages() {
        let store = test_store().await;
        let a = store.create_conversation("alice").await.unwrap();
        let b = store.create_conversation("bob").await.unwrap();

        store
            .append_messages(a.id, &[NewMessage::user("hi"), NewMessage::bot("Hi there!")])
            .await
            .unwrap();

        assert_eq!(store.list_messages(a.id).await.unwrap().len(), 2);
        assert!(store.list_messages(b.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_file_backend_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intake.db");

        {
            let store = LibSqlBackend::new_local(&path).await.unwrap();
            let conversation = store.create_conversation("chat-42").await.unwrap();
            store
                .append_messages(conversation.id, &[NewMessage::user("hello")])
                .await
                .unwrap();
        }

        let store = LibSqlBackend::new_local(&path).await.unwrap();
        let conversation = store.find_conversation("chat-42").await.unwrap().unwrap();
        let messages = store.list_messages(conversation.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hello");
    }
}
