//! Per-user conversation phase store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::stage::Stage;

/// Where a user sits in the conversation lifecycle.
///
/// `NotStarted` is represented by the absence of a store entry — first contact
/// always gets the greeting. `Inactive` means the questionnaire has terminated
/// (completed or declined) and every later message routes to the assistant
/// fallback instead of re-entering the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    Active(Stage),
    Inactive,
}

impl Phase {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

/// Keyed store for per-user conversation phase.
///
/// Injected into the orchestrator rather than referenced as ambient state, so
/// tests can substitute doubles and a persistent backing can be slotted in
/// later. Implementations need not serialize same-key access; the orchestrator
/// holds a per-user lock across each turn.
#[async_trait]
pub trait StageStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Phase;
    async fn set(&self, user_id: &str, phase: Phase);
    async fn remove(&self, user_id: &str);
}

/// Transient in-process store. Phase does not survive a restart.
#[derive(Default)]
pub struct InMemoryStageStore {
    entries: Mutex<HashMap<String, Phase>>,
}

impl InMemoryStageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StageStore for InMemoryStageStore {
    async fn get(&self, user_id: &str) -> Phase {
        self.entries
            .lock()
            .await
            .get(user_id)
            .copied()
            .unwrap_or(Phase::NotStarted)
    }

    async fn set(&self, user_id: &str, phase: Phase) {
        self.entries.lock().await.insert(user_id.to_string(), phase);
    }

    async fn remove(&self, user_id: &str) {
        self.entries.lock().await.remove(user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_entry_is_not_started() {
        let store = InMemoryStageStore::new();
        assert_eq!(store.get("nobody").await, Phase::NotStarted);
    }

    #[tokio::test]
    async fn set_get_remove_roundtrip() {
        let store = InMemoryStageStore::new();
        store
            .set("alice", Phase::Active(Stage::AwaitingIncome))
            .await;
        assert_eq!(
            store.get("alice").await,
            Phase::Active(Stage::AwaitingIncome)
        );

        store.set("alice", Phase::Inactive).await;
        assert_eq!(store.get("alice").await, Phase::Inactive);

        store.remove("alice").await;
        assert_eq!(store.get("alice").await, Phase::NotStarted);
    }

    #[tokio::test]
    async fn users_are_independent() {
        let store = InMemoryStageStore::new();
        store
            .set("alice", Phase::Active(Stage::Completing))
            .await;
        store.set("bob", Phase::Inactive).await;

        assert_eq!(store.get("alice").await, Phase::Active(Stage::Completing));
        assert_eq!(store.get("bob").await, Phase::Inactive);
        assert_eq!(store.get("carol").await, Phase::NotStarted);
    }
}
