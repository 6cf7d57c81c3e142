//! Conversation-log store trait — the durable record of every exchange.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A durable conversation record, at most one per user.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// A message to append to a conversation.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            role: Role::Bot,
            content: content.into(),
        }
    }
}

/// A persisted message.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic conversation log. Conversations are created lazily on
/// first contact and never deleted here; messages are append-only.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Look up the conversation for a user, if one exists.
    async fn find_conversation(&self, user_id: &str)
    -> Result<Option<Conversation>, DatabaseError>;

    /// Create a conversation for a user. Fails if one already exists.
    async fn create_conversation(&self, user_id: &str) -> Result<Conversation, DatabaseError>;

    /// Append messages to a conversation, preserving order.
    async fn append_messages(
        &self,
        conversation_id: Uuid,
        messages: &[NewMessage],
    ) -> Result<(), DatabaseError>;

    /// List a conversation's messages, oldest first.
    async fn list_messages(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<StoredMessage>, DatabaseError>;
}
