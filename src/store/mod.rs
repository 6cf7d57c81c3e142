//! Persistence layer — conversation log backed by libSQL.

pub mod libsql_backend;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Conversation, ConversationStore, NewMessage, Role, StoredMessage};
