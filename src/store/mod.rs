//! Visibility Ledger storage.
//!
//! The engine never does read-then-write on ledger sets from the service
//! layer; every mutation below is a single atomic operation against the
//! store, so two viewers marking the same message concurrently are both
//! recorded. Implementations must keep per-message mutations linearizable
//! with respect to each other.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::error::AppResult;
use crate::models::{Conversation, Message};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait VisibilityStore: Send + Sync {
    async fn insert_conversation(&self, conversation: &Conversation) -> AppResult<()>;

    /// `NotFound` if the conversation does not exist
    async fn fetch_conversation(&self, conversation_id: Uuid) -> AppResult<Conversation>;

    async fn insert_message(&self, message: &Message) -> AppResult<()>;

    /// `NotFound` if the message was already swept
    async fn fetch_message(&self, message_id: Uuid) -> AppResult<Message>;

    /// All messages still physically present in a conversation, oldest first
    async fn conversation_messages(&self, conversation_id: Uuid) -> AppResult<Vec<Message>>;

    /// Idempotent set insertion into `viewed_by`. No-op when the viewer is
    /// already recorded or the message is already flagged expired. Returns
    /// the resulting snapshot; `NotFound` when the message is gone.
    async fn add_viewer(&self, message_id: Uuid, user_id: Uuid) -> AppResult<Message>;

    /// Idempotent set insertion into `saved_by`. Also clears `is_expired`:
    /// a flagged-but-unswept message becomes visible again.
    async fn add_saver(&self, message_id: Uuid, user_id: Uuid) -> AppResult<Message>;

    /// Idempotent set removal from `saved_by`.
    async fn remove_saver(&self, message_id: Uuid, user_id: Uuid) -> AppResult<Message>;

    /// Conditional flag write. Flagging true refuses while `saved_by` is
    /// non-empty. No-op (Ok) when the row is already gone.
    async fn set_expired(&self, message_id: Uuid, expired: bool) -> AppResult<()>;

    /// All messages with `is_expired = false`, for the sweeper's re-check pass
    async fn unexpired_messages(&self) -> AppResult<Vec<Message>>;

    /// Ids of all messages currently flagged expired
    async fn expired_message_ids(&self) -> AppResult<Vec<Uuid>>;

    /// Physical deletion, re-validating `is_expired = true` and
    /// `saved_by = ∅` at delete time. Returns whether a row was removed.
    async fn delete_if_expired(&self, message_id: Uuid) -> AppResult<bool>;

    /// Hard-TTL purge of unsaved media payloads created before the cutoff,
    /// regardless of view state. Returns the number of rows removed.
    async fn purge_media_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}
