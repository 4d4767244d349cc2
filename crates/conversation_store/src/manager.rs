//! Conversation manager: the list of chats and which one is active

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use outline_core::ConversationRecord;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::kv::{get_as, keys, set_as, KeyValueStore};

/// Anything that can persist one conversation.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn save_conversation(&self, record: &ConversationRecord) -> Result<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub index: usize,
    pub id: String,
    pub title: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
    pub active: bool,
}

struct ConversationState {
    conversations: Vec<ConversationRecord>,
    active: usize,
}

impl ConversationState {
    fn summaries(&self) -> Vec<ConversationSummary> {
        self.conversations
            .iter()
            .enumerate()
            .map(|(index, record)| ConversationSummary {
                index,
                id: record.id.clone(),
                title: record.display_title(),
                message_count: record.messages.len(),
                updated_at: record.updated_at,
                active: index == self.active,
            })
            .collect()
    }
}

pub struct ConversationManager {
    store: Arc<dyn KeyValueStore>,
    state: RwLock<ConversationState>,
}

impl ConversationManager {
    /// Load conversations; an empty store gets one fresh conversation.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let mut conversations: Vec<ConversationRecord> =
            match get_as(store.as_ref(), keys::CONVERSATIONS).await {
                Ok(list) => list.unwrap_or_default(),
                Err(e) => {
                    log::error!("Failed to parse stored conversations, starting fresh: {}", e);
                    Vec::new()
                }
            };

        let mut created = false;
        if conversations.is_empty() {
            conversations.push(ConversationRecord::new());
            created = true;
        }

        let stored_active: Option<usize> = get_as(store.as_ref(), keys::ACTIVE_CONVERSATION)
            .await
            .unwrap_or(None);
        let active = stored_active
            .filter(|i| *i < conversations.len())
            .unwrap_or(conversations.len() - 1);

        let manager = Self {
            store,
            state: RwLock::new(ConversationState {
                conversations,
                active,
            }),
        };
        if created {
            let state = manager.state.read().await;
            manager.persist(&state).await?;
        }
        Ok(manager)
    }

    async fn persist(&self, state: &ConversationState) -> Result<()> {
        set_as(self.store.as_ref(), keys::CONVERSATIONS, &state.conversations).await?;
        set_as(self.store.as_ref(), keys::ACTIVE_CONVERSATION, &state.active).await
    }

    pub async fn active_index(&self) -> usize {
        self.state.read().await.active
    }

    pub async fn active(&self) -> ConversationRecord {
        let state = self.state.read().await;
        state.conversations[state.active].clone()
    }

    pub async fn get(&self, index: usize) -> Result<ConversationRecord> {
        let state = self.state.read().await;
        state
            .conversations
            .get(index)
            .cloned()
            .ok_or(StoreError::ConversationNotFound(index))
    }

    pub async fn all(&self) -> Vec<ConversationRecord> {
        self.state.read().await.conversations.clone()
    }

    pub async fn list(&self) -> Vec<ConversationSummary> {
        self.state.read().await.summaries()
    }

    /// Conversations whose title or messages contain `keyword`.
    pub async fn search(&self, keyword: &str) -> Vec<ConversationSummary> {
        let state = self.state.read().await;
        state
            .summaries()
            .into_iter()
            .filter(|summary| state.conversations[summary.index].matches(keyword))
            .collect()
    }

    /// Save `current` (when given), then start and activate a fresh chat.
    pub async fn new_conversation(&self, current: Option<&ConversationRecord>) -> Result<ConversationRecord> {
        let mut state = self.state.write().await;
        if let Some(current) = current {
            upsert(&mut state, current);
        }

        let record = ConversationRecord::new();
        state.conversations.push(record.clone());
        state.active = state.conversations.len() - 1;
        self.persist(&state).await?;

        log::info!("Started conversation {}", record.id);
        Ok(record)
    }

    pub async fn switch_to(&self, index: usize) -> Result<ConversationRecord> {
        let mut state = self.state.write().await;
        let record = state
            .conversations
            .get(index)
            .cloned()
            .ok_or(StoreError::ConversationNotFound(index))?;
        state.active = index;
        self.persist(&state).await?;
        Ok(record)
    }

    /// Delete a conversation. Deleting the last one leaves a fresh empty
    /// conversation in its place.
    pub async fn delete(&self, index: usize) -> Result<ConversationRecord> {
        let mut state = self.state.write().await;
        if index >= state.conversations.len() {
            return Err(StoreError::ConversationNotFound(index));
        }

        let removed = state.conversations.remove(index);
        if state.conversations.is_empty() {
            state.conversations.push(ConversationRecord::new());
            state.active = 0;
        } else if state.active > index || state.active >= state.conversations.len() {
            state.active = state.active.saturating_sub(1);
        }
        self.persist(&state).await?;

        log::info!("Deleted conversation {} ({})", removed.id, removed.display_title());
        Ok(removed)
    }

    /// Replace everything, e.g. after an import.
    pub async fn replace_all(&self, conversations: Vec<ConversationRecord>) -> Result<()> {
        let mut state = self.state.write().await;
        state.conversations = conversations;
        if state.conversations.is_empty() {
            state.conversations.push(ConversationRecord::new());
        }
        state.active = state.conversations.len() - 1;
        self.persist(&state).await
    }
}

fn upsert(state: &mut ConversationState, record: &ConversationRecord) {
    let mut record = record.clone();
    if record.title.trim().is_empty() {
        record.title = record.display_title();
    }
    match state.conversations.iter().position(|c| c.id == record.id) {
        Some(pos) => state.conversations[pos] = record,
        None => {
            state.conversations.push(record);
        }
    }
}

#[async_trait]
impl HistorySink for ConversationManager {
    async fn save_conversation(&self, record: &ConversationRecord) -> Result<()> {
        let mut state = self.state.write().await;
        upsert(&mut state, record);
        self.persist(&state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;
    use outline_core::{Dialect, Message};

    async fn manager() -> ConversationManager {
        ConversationManager::load(Arc::new(MemoryKeyValueStore::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_store_gets_one_conversation() {
        let manager = manager().await;
        assert_eq!(manager.list().await.len(), 1);
        assert_eq!(manager.active_index().await, 0);
        assert_eq!(manager.active().await.display_title(), "Untitled");
    }

    #[tokio::test]
    async fn test_new_conversation_saves_current_first() {
        let manager = manager().await;
        let mut current = manager.active().await;
        current.messages.push(Message::user("Quarterly hiring plan", &Dialect::sample()));

        let fresh = manager.new_conversation(Some(&current)).await.unwrap();
        let list = manager.list().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].title, "Quarterly ");
        assert!(list[1].active);
        assert_eq!(list[1].id, fresh.id);
    }

    #[tokio::test]
    async fn test_delete_last_conversation_leaves_fresh_one() {
        let manager = manager().await;
        let only = manager.active().await;
        manager.delete(0).await.unwrap();

        let list = manager.list().await;
        assert_eq!(list.len(), 1);
        assert_ne!(list[0].id, only.id);
    }

    #[tokio::test]
    async fn test_delete_before_active_shifts_index() {
        let manager = manager().await;
        manager.new_conversation(None).await.unwrap();
        manager.new_conversation(None).await.unwrap();
        assert_eq!(manager.active_index().await, 2);

        manager.delete(0).await.unwrap();
        assert_eq!(manager.active_index().await, 1);
        assert!(manager.delete(5).await.is_err());
    }

    #[tokio::test]
    async fn test_state_survives_reload() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let manager = ConversationManager::load(store.clone()).await.unwrap();
        manager.new_conversation(None).await.unwrap();
        manager.switch_to(0).await.unwrap();

        let reloaded = ConversationManager::load(store).await.unwrap();
        assert_eq!(reloaded.list().await.len(), 2);
        assert_eq!(reloaded.active_index().await, 0);
    }
}
