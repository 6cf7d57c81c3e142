//! Completion-generation service — the assistant the bot falls back to once
//! the questionnaire is over.

pub mod openai;

pub use openai::{OpenAiConfig, OpenAiProvider};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::LlmError;

/// System instruction for the fallback assistant.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Reply used whenever the provider yields no usable text.
pub const DEFAULT_REPLY: &str = "I'm here to assist you!";

/// A chat message in provider wire order.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat-completion backend. `Ok(None)` means the provider answered but
/// produced no usable text (missing or empty choices).
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Option<String>, LlmError>;
}

/// The assistant fallback, invoked for every message after the questionnaire
/// has terminated.
pub struct CompletionFallback {
    provider: Arc<dyn CompletionProvider>,
    timeout: Duration,
}

impl CompletionFallback {
    pub fn new(provider: Arc<dyn CompletionProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Generate a reply for the user's message. Never fails: provider errors,
    /// timeouts, and empty responses all collapse to [`DEFAULT_REPLY`].
    pub async fn generate_reply(&self, text: &str) -> String {
        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(text)];

        match tokio::time::timeout(self.timeout, self.provider.complete(&messages)).await {
            Ok(Ok(Some(reply))) if !reply.trim().is_empty() => reply,
            Ok(Ok(_)) => {
                tracing::warn!("Completion returned no text, using default reply");
                DEFAULT_REPLY.to_string()
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Completion request failed");
                DEFAULT_REPLY.to_string()
            }
            Err(_) => {
                tracing::error!(timeout = ?self.timeout, "Completion request timed out");
                DEFAULT_REPLY.to_string()
            }
        }
    }
}
