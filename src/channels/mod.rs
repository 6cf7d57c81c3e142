//! Transport gateway — message I/O with the messaging platform.

pub mod telegram;

pub use telegram::TelegramGateway;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;

/// An inbound message event from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Stable per-user key derived from the transport's chat id.
    pub chat_id: String,
    pub text: String,
}

/// Stream of inbound messages (polling transport).
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// Outbound delivery to the messaging platform. Best-effort: callers log
/// failures and do not retry.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError>;
}
