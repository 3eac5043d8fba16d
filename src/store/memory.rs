use crate::error::{AppError, AppResult};
use crate::models::{Conversation, Message};
use crate::store::VisibilityStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    conversations: HashMap<Uuid, Conversation>,
    messages: HashMap<Uuid, Message>,
}

/// In-memory ledger store for tests and local runs. A single async mutex
/// over the maps gives the same per-message linearizability the Postgres
/// store gets from single-statement conditional updates.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VisibilityStore for MemoryStore {
    async fn insert_conversation(&self, conversation: &Conversation) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(())
    }

    async fn fetch_conversation(&self, conversation_id: Uuid) -> AppResult<Conversation> {
        let inner = self.inner.lock().await;
        inner
            .conversations
            .get(&conversation_id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn insert_message(&self, message: &Message) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn fetch_message(&self, message_id: Uuid) -> AppResult<Message> {
        let inner = self.inner.lock().await;
        inner
            .messages
            .get(&message_id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn conversation_messages(&self, conversation_id: Uuid) -> AppResult<Vec<Message>> {
        let inner = self.inner.lock().await;
        let mut messages: Vec<Message> = inner
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn add_viewer(&self, message_id: Uuid, user_id: Uuid) -> AppResult<Message> {
        let mut inner = self.inner.lock().await;
        let message = inner.messages.get_mut(&message_id).ok_or(AppError::NotFound)?;
        if !message.is_expired {
            message.viewed_by.insert(user_id);
        }
        Ok(message.clone())
    }

    async fn add_saver(&self, message_id: Uuid, user_id: Uuid) -> AppResult<Message> {
        let mut inner = self.inner.lock().await;
        let message = inner.messages.get_mut(&message_id).ok_or(AppError::NotFound)?;
        message.saved_by.insert(user_id);
        // Reversal path: a save before the sweep un-expires the message
        message.is_expired = false;
        Ok(message.clone())
    }

    async fn remove_saver(&self, message_id: Uuid, user_id: Uuid) -> AppResult<Message> {
        let mut inner = self.inner.lock().await;
        let message = inner.messages.get_mut(&message_id).ok_or(AppError::NotFound)?;
        message.saved_by.remove(&user_id);
        Ok(message.clone())
    }

    async fn set_expired(&self, message_id: Uuid, expired: bool) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        // Already-swept rows are a benign race, not an error
        if let Some(message) = inner.messages.get_mut(&message_id) {
            if expired && !message.saved_by.is_empty() {
                return Ok(());
            }
            message.is_expired = expired;
        }
        Ok(())
    }

    async fn unexpired_messages(&self) -> AppResult<Vec<Message>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .messages
            .values()
            .filter(|m| !m.is_expired)
            .cloned()
            .collect())
    }

    async fn expired_message_ids(&self) -> AppResult<Vec<Uuid>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .messages
            .values()
            .filter(|m| m.is_expired)
            .map(|m| m.id)
            .collect())
    }

    async fn delete_if_expired(&self, message_id: Uuid) -> AppResult<bool> {
        let mut inner = self.inner.lock().await;
        let deletable = inner
            .messages
            .get(&message_id)
            .map(|m| m.is_expired && m.saved_by.is_empty())
            .unwrap_or(false);
        if deletable {
            inner.messages.remove(&message_id);
        }
        Ok(deletable)
    }

    async fn purge_media_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut inner = self.inner.lock().await;
        let doomed: Vec<Uuid> = inner
            .messages
            .values()
            .filter(|m| m.payload.is_media() && m.created_at < cutoff && m.saved_by.is_empty())
            .map(|m| m.id)
            .collect();
        for id in &doomed {
            inner.messages.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}
