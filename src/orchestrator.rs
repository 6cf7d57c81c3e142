//! Conversation orchestrator — wires transport events through the stage
//! machine, the conversation log, and the assistant fallback.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::channels::Gateway;
use crate::error::Error;
use crate::intake::{Phase, StageStore, transition};
use crate::llm::CompletionFallback;
use crate::store::{ConversationStore, NewMessage};

/// Generic reply when a turn fails internally. Raw error detail never
/// reaches the user.
pub const APOLOGY: &str = "Something went wrong. Please try again later.";

pub struct Orchestrator {
    conversations: Arc<dyn ConversationStore>,
    stages: Arc<dyn StageStore>,
    fallback: CompletionFallback,
    gateway: Arc<dyn Gateway>,
    // Serializes turns per user; concurrent messages from the same user would
    // otherwise race on the stage read-modify-write.
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Orchestrator {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        stages: Arc<dyn StageStore>,
        fallback: CompletionFallback,
        gateway: Arc<dyn Gateway>,
    ) -> Self {
        Self {
            conversations,
            stages,
            fallback,
            gateway,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one inbound message end to end.
    ///
    /// Never returns an error: failures are logged for operators and the user
    /// receives a single generic apology. Delivery itself is best-effort and
    /// not retried.
    pub async fn handle_message(&self, user_id: &str, raw_text: &str) {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        match self.process(user_id, raw_text).await {
            Ok(reply) => {
                if let Err(e) = self.gateway.send_message(user_id, &reply).await {
                    error!(user_id, error = %e, "Failed to deliver reply");
                }
            }
            Err(e) => {
                error!(user_id, error = %e, "Message handling failed");
                if let Err(send_err) = self.gateway.send_message(user_id, APOLOGY).await {
                    error!(user_id, error = %send_err, "Failed to deliver apology");
                }
            }
        }
    }

    /// One turn: resolve the conversation, run the stage machine or the
    /// fallback, persist the exchange, and return the reply.
    async fn process(&self, user_id: &str, raw_text: &str) -> Result<String, Error> {
        let text = raw_text.trim().to_lowercase();

        let conversation = match self.conversations.find_conversation(user_id).await? {
            Some(conversation) => conversation,
            None => self.conversations.create_conversation(user_id).await?,
        };

        let phase = self.stages.get(user_id).await;
        let reply = match phase {
            Phase::Inactive => self.fallback.generate_reply(raw_text).await,
            Phase::NotStarted | Phase::Active(_) => {
                let stage = match phase {
                    Phase::Active(stage) => Some(stage),
                    _ => None,
                };
                let turn = transition(stage, &text);
                let next = match turn.next {
                    Some(next) => Phase::Active(next),
                    None => Phase::Inactive,
                };
                self.stages.set(user_id, next).await;
                debug!(user_id, ?phase, ?next, "Stage transition");
                turn.reply.to_string()
            }
        };

        self.conversations
            .append_messages(
                conversation.id,
                &[NewMessage::user(&text), NewMessage::bot(&reply)],
            )
            .await?;

        Ok(reply)
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        Arc::clone(locks.entry(user_id.to_string()).or_default())
    }
}
