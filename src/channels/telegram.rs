//! Telegram gateway — Bot API client for both transports.
//!
//! Outbound `sendMessage` plus webhook registration and a `getUpdates`
//! long-poll loop; update parsing is shared by the push and pull paths.

use async_trait::async_trait;

use crate::channels::{Gateway, IncomingMessage, MessageStream};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Telegram gateway — talks to the Bot API over HTTPS.
pub struct TelegramGateway {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramGateway {
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }

    /// Register the webhook URL with Telegram (push transport).
    pub async fn set_webhook(&self, url: &str) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.api_url("setWebhook"))
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("setWebhook failed: {detail}"),
            });
        }

        tracing::info!(url, "Telegram webhook registered");
        Ok(())
    }

    /// Remove any registered webhook (required before long-polling).
    pub async fn delete_webhook(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.api_url("deleteWebhook"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("deleteWebhook failed: {detail}"),
            });
        }
        Ok(())
    }

    /// Long-poll `getUpdates` for messages (pull transport).
    ///
    /// Spawns the poll loop and returns a stream of incoming text messages.
    /// Poll and parse errors back off for 5 seconds and continue.
    pub fn start_polling(&self) -> MessageStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bot_token = self.bot_token.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram polling for updates...");

            loop {
                let url = format!("https://api.telegram.org/bot{bot_token}/getUpdates");
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                if let Some(results) = data.get("result").and_then(serde_json::Value::as_array) {
                    for update in results {
                        if let Some(uid) =
                            update.get("update_id").and_then(serde_json::Value::as_i64)
                        {
                            offset = uid + 1;
                        }

                        let Some(incoming) = parse_update(update) else {
                            continue;
                        };

                        if tx.send(incoming).is_err() {
                            tracing::info!("Telegram update consumer dropped, stopping poll");
                            return;
                        }
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Box::pin(stream)
    }

    /// Send a single message chunk (≤4096 chars).
    async fn send_message_chunk(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage failed ({status}): {detail}"),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Gateway for TelegramGateway {
    /// Send a text message, splitting anything over Telegram's 4096 char limit.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_message_chunk(chat_id, &chunk).await?;
        }
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Extract a text message from an update payload. Updates without a text
/// message (stickers, edits, join events) yield `None` and are ignored.
pub fn parse_update(update: &serde_json::Value) -> Option<IncomingMessage> {
    let message = update.get("message")?;
    let text = message.get("text").and_then(serde_json::Value::as_str)?;
    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(serde_json::Value::as_i64)?;

    Some(IncomingMessage {
        chat_id: chat_id.to_string(),
        text: text.to_string(),
    })
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut cut = max_len;
        while !remaining.is_char_boundary(cut) {
            cut -= 1;
        }

        let chunk = &remaining[..cut];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(cut);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { cut } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_embeds_token() {
        let gw = TelegramGateway::new("123:ABC".into());
        assert_eq!(
            gw.api_url("sendMessage"),
            "https://api.telegram.org/bot123:ABC/sendMessage"
        );
        assert_eq!(
            gw.api_url("setWebhook"),
            "https://api.telegram.org/bot123:ABC/setWebhook"
        );
    }

    #[test]
    fn parse_update_text_message() {
        let update = serde_json::json!({
            "update_id": 99,
            "message": {
                "message_id": 1,
                "chat": { "id": 987654321 },
                "from": { "id": 111, "username": "alice" },
                "text": "Yes please"
            }
        });

        let incoming = parse_update(&update).unwrap();
        assert_eq!(incoming.chat_id, "987654321");
        assert_eq!(incoming.text, "Yes please");
    }

    #[test]
    fn parse_update_ignores_non_text() {
        let sticker = serde_json::json!({
            "update_id": 100,
            "message": {
                "chat": { "id": 1 },
                "sticker": { "file_id": "abc" }
            }
        });
        assert!(parse_update(&sticker).is_none());

        let edit = serde_json::json!({
            "update_id": 101,
            "edited_message": {
                "chat": { "id": 1 },
                "text": "edited"
            }
        });
        assert!(parse_update(&edit).is_none());

        assert!(parse_update(&serde_json::json!({})).is_none());
    }

    #[test]
    fn parse_update_requires_chat_id() {
        let update = serde_json::json!({
            "message": { "text": "hello" }
        });
        assert!(parse_update(&update).is_none());
    }

    #[test]
    fn split_message_short() {
        let chunks = split_message("Hello", 4096);
        assert_eq!(chunks, vec!["Hello"]);
    }

    #[test]
    fn split_message_exact_limit() {
        let msg = "a".repeat(4096);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 4096);
    }

    #[test]
    fn split_message_prefers_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }
}
