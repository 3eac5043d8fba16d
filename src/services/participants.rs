//! Participant set resolution for the visibility engine.

use crate::error::{AppError, AppResult};
use crate::models::Conversation;
use crate::store::VisibilityStore;
use std::sync::Arc;
use uuid::Uuid;

pub struct ParticipantResolver {
    store: Arc<dyn VisibilityStore>,
}

impl ParticipantResolver {
    pub fn new(store: Arc<dyn VisibilityStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, conversation_id: Uuid) -> AppResult<Conversation> {
        self.store.fetch_conversation(conversation_id).await
    }

    /// Resolve the conversation and reject callers outside its participant
    /// set. A viewer or saver not in the set is a caller defect, never
    /// silently dropped.
    pub async fn resolve_for_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Conversation> {
        let conversation = self.resolve(conversation_id).await?;
        if !conversation.is_participant(user_id) {
            return Err(AppError::InvalidParticipant {
                user_id,
                conversation_id,
            });
        }
        Ok(conversation)
    }
}
