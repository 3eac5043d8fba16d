//! Mutation operations: the atomic state transitions of the visibility
//! engine. Per message the lifecycle is
//! `LIVE -> FLAGGED(expired) -> DELETED`, with one re-entrant edge back to
//! `LIVE` when a save lands before the sweeper's delete.
//!
//! `NotFound` from the store means the message's lifecycle already completed
//! under a concurrent sweep; every mutation path here treats that as a
//! benign no-op rather than an error for the caller.

use crate::error::{AppError, AppResult};
use crate::models::{Conversation, Message, MessagePayload};
use crate::services::evaluator::should_expire;
use crate::services::participants::ParticipantResolver;
use crate::store::VisibilityStore;
use chrono::Utc;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct VisibilityService {
    store: Arc<dyn VisibilityStore>,
    participants: ParticipantResolver,
    max_conflict_retries: u32,
}

impl VisibilityService {
    pub fn new(store: Arc<dyn VisibilityStore>, max_conflict_retries: u32) -> Self {
        let participants = ParticipantResolver::new(store.clone());
        Self {
            store,
            participants,
            max_conflict_retries,
        }
    }

    /// Seed a conversation. Glue over the engine: membership mutation after
    /// creation is out of scope, so the participant set is fixed here.
    pub async fn create_conversation(
        &self,
        creator_id: Uuid,
        participant_ids: Vec<Uuid>,
    ) -> AppResult<Conversation> {
        let mut participants = vec![creator_id];
        for id in participant_ids {
            if !participants.contains(&id) {
                participants.push(id);
            }
        }

        if participants.len() < 2 {
            return Err(AppError::BadRequest(
                "a conversation needs at least two participants".into(),
            ));
        }

        let conversation = Conversation {
            id: Uuid::new_v4(),
            creator_id,
            participant_ids: participants,
            created_at: Utc::now(),
        };
        self.store.insert_conversation(&conversation).await?;
        Ok(conversation)
    }

    /// Construct the initial ledger state for a sent message. `viewed_by` is
    /// seeded with exactly the sender; recipients are never eagerly added no
    /// matter their delivery status. If the eligible-viewer set is already
    /// empty the message is flagged expired from the start.
    pub async fn on_message_sent(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        payload: MessagePayload,
    ) -> AppResult<Message> {
        let conversation = self
            .participants
            .resolve_for_participant(conversation_id, sender_id)
            .await?;

        let mut message = Message::new(conversation_id, sender_id, payload);
        message.is_expired = should_expire(&message, &conversation.participant_ids);
        if message.is_expired {
            tracing::debug!(
                message_id = %message.id,
                conversation_id = %conversation_id,
                "message has no eligible viewers, flagged expired at creation"
            );
        }

        self.store.insert_message(&message).await?;
        Ok(message)
    }

    /// Record that a participant opened the message, then re-evaluate
    /// expiration. Hot path: called once per (message, viewer) pair per
    /// chat-open. No-op when the viewer is the sender (already counted at
    /// creation) or the message is already flagged.
    pub async fn mark_viewed(&self, message_id: Uuid, viewer_id: Uuid) -> AppResult<()> {
        let message = match self.store.fetch_message(message_id).await {
            Ok(m) => m,
            Err(AppError::NotFound) => return Ok(()),
            Err(e) => return Err(e),
        };

        if message.sender_id == viewer_id || message.is_expired {
            return Ok(());
        }

        let conversation = match self
            .participants
            .resolve(message.conversation_id)
            .await
        {
            Ok(c) => c,
            // Conversation gone while the message lingers: nothing left to
            // evaluate against, the sweep will catch up
            Err(AppError::NotFound) => return Ok(()),
            Err(e) => return Err(e),
        };
        if !conversation.is_participant(viewer_id) {
            return Err(AppError::InvalidParticipant {
                user_id: viewer_id,
                conversation_id: conversation.id,
            });
        }

        let updated = match self
            .mutate_with_retries(message_id, move |store| async move {
                store.add_viewer(message_id, viewer_id).await
            })
            .await?
        {
            Some(m) => m,
            None => return Ok(()),
        };

        if should_expire(&updated, &conversation.participant_ids) {
            self.store.set_expired(message_id, true).await?;
            tracing::debug!(message_id = %message_id, "all eligible viewers have viewed, flagged expired");
        }

        Ok(())
    }

    /// Fan out `mark_viewed` over every live message in the conversation the
    /// caller has not yet viewed. Best-effort: a failure on one message is
    /// logged and skipped, the next chat-open self-heals it. Returns how many
    /// messages were marked.
    pub async fn on_conversation_opened(
        &self,
        conversation_id: Uuid,
        viewer_id: Uuid,
    ) -> AppResult<usize> {
        self.participants
            .resolve_for_participant(conversation_id, viewer_id)
            .await?;

        let messages = self.store.conversation_messages(conversation_id).await?;
        let pending: Vec<Uuid> = messages
            .iter()
            .filter(|m| {
                !m.is_expired && m.sender_id != viewer_id && !m.is_viewed_by(viewer_id)
            })
            .map(|m| m.id)
            .collect();

        let results = futures::future::join_all(
            pending.iter().map(|id| self.mark_viewed(*id, viewer_id)),
        )
        .await;

        let mut marked = 0usize;
        for (message_id, result) in pending.iter().zip(results) {
            match result {
                Ok(()) => marked += 1,
                Err(e) => {
                    tracing::warn!(
                        message_id = %message_id,
                        viewer_id = %viewer_id,
                        error = %e,
                        "mark_viewed failed during conversation open, skipping"
                    );
                }
            }
        }
        Ok(marked)
    }

    /// Toggle the save pin. Saving clears the expired flag; unsaving
    /// re-evaluates immediately, so a message whose view condition already
    /// holds expires without waiting for another view event. Returns the new
    /// saved state.
    pub async fn toggle_saved(&self, message_id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let message = match self.store.fetch_message(message_id).await {
            Ok(m) => m,
            // Lifecycle already completed; nothing is saved
            Err(AppError::NotFound) => return Ok(false),
            Err(e) => return Err(e),
        };

        let conversation = match self
            .participants
            .resolve(message.conversation_id)
            .await
        {
            Ok(c) => c,
            Err(AppError::NotFound) => return Ok(false),
            Err(e) => return Err(e),
        };
        if !conversation.is_participant(user_id) {
            return Err(AppError::InvalidParticipant {
                user_id,
                conversation_id: conversation.id,
            });
        }

        if message.is_saved_by(user_id) {
            let updated = match self
                .mutate_with_retries(message_id, move |store| async move {
                    store.remove_saver(message_id, user_id).await
                })
                .await?
            {
                Some(m) => m,
                None => return Ok(false),
            };
            if should_expire(&updated, &conversation.participant_ids) {
                self.store.set_expired(message_id, true).await?;
                tracing::debug!(message_id = %message_id, "unsave re-flagged fully-viewed message");
            }
            Ok(false)
        } else {
            let saved = self
                .mutate_with_retries(message_id, move |store| async move {
                    store.add_saver(message_id, user_id).await
                })
                .await?;
            Ok(saved.is_some())
        }
    }

    /// Bounded retry around one atomic ledger mutation. `None` means the
    /// message vanished mid-operation (benign race with the sweeper).
    /// Retryable errors that outlast the attempts surface as `Unavailable`;
    /// the raw `Conflict` never reaches the caller.
    async fn mutate_with_retries<F, Fut>(
        &self,
        message_id: Uuid,
        op: F,
    ) -> AppResult<Option<Message>>
    where
        F: Fn(Arc<dyn VisibilityStore>) -> Fut,
        Fut: Future<Output = AppResult<Message>>,
    {
        let mut attempt = 0u32;
        loop {
            match op(self.store.clone()).await {
                Ok(m) => return Ok(Some(m)),
                Err(AppError::NotFound) => return Ok(None),
                Err(e) if e.is_retryable() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    let jitter = rand::rng().random_range(0..10u64);
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(attempt) + jitter))
                        .await;
                }
                Err(e) if e.is_retryable() => {
                    return Err(AppError::Unavailable(format!(
                        "ledger update for message {message_id} lost {attempt} races: {e}"
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }
}
