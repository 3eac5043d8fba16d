use crate::error::{AppError, AppResult};
use crate::models::{Conversation, Message, MessagePayload};
use crate::store::VisibilityStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use std::collections::HashSet;
use tokio_postgres::Row;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, payload_kind, payload_body, created_at, viewed_by, saved_by, is_expired";

/// Durable ledger store over Postgres UUID-array columns.
///
/// Every mutation is a single conditional UPDATE, so concurrent viewers and
/// the sweeper serialize on the row without read-modify-write races. This is
/// the service-layer rendering of the original trigger-over-array-columns
/// design.
pub struct PostgresStore {
    pool: Pool,
}

impl PostgresStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn row_to_message(row: &Row) -> AppResult<Message> {
        let kind: String = row.get("payload_kind");
        let body: String = row.get("payload_body");
        let payload = match kind.as_str() {
            "text" => MessagePayload::Text { content: body },
            "media" => MessagePayload::Media { object_key: body },
            other => {
                return Err(AppError::Database(format!(
                    "unknown payload kind in messages row: {other}"
                )))
            }
        };

        let viewed_by: Vec<Uuid> = row.get("viewed_by");
        let saved_by: Vec<Uuid> = row.get("saved_by");

        Ok(Message {
            id: row.get("id"),
            conversation_id: row.get("conversation_id"),
            sender_id: row.get("sender_id"),
            payload,
            created_at: row.get("created_at"),
            viewed_by: viewed_by.into_iter().collect::<HashSet<Uuid>>(),
            saved_by: saved_by.into_iter().collect::<HashSet<Uuid>>(),
            is_expired: row.get("is_expired"),
        })
    }

    fn payload_columns(payload: &MessagePayload) -> (&'static str, &str) {
        match payload {
            MessagePayload::Text { content } => ("text", content.as_str()),
            MessagePayload::Media { object_key } => ("media", object_key.as_str()),
        }
    }
}

#[async_trait]
impl VisibilityStore for PostgresStore {
    async fn insert_conversation(&self, conversation: &Conversation) -> AppResult<()> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO conversations (id, creator_id, participant_ids, created_at) \
                 VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO NOTHING",
                &[
                    &conversation.id,
                    &conversation.creator_id,
                    &conversation.participant_ids,
                    &conversation.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn fetch_conversation(&self, conversation_id: Uuid) -> AppResult<Conversation> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, creator_id, participant_ids, created_at \
                 FROM conversations WHERE id = $1",
                &[&conversation_id],
            )
            .await?
            .ok_or(AppError::NotFound)?;

        Ok(Conversation {
            id: row.get("id"),
            creator_id: row.get("creator_id"),
            participant_ids: row.get("participant_ids"),
            created_at: row.get("created_at"),
        })
    }

    async fn insert_message(&self, message: &Message) -> AppResult<()> {
        let (kind, body) = Self::payload_columns(&message.payload);
        let viewed_by: Vec<Uuid> = message.viewed_by.iter().copied().collect();
        let saved_by: Vec<Uuid> = message.saved_by.iter().copied().collect();

        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO messages \
                 (id, conversation_id, sender_id, payload_kind, payload_body, created_at, viewed_by, saved_by, is_expired) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                &[
                    &message.id,
                    &message.conversation_id,
                    &message.sender_id,
                    &kind,
                    &body,
                    &message.created_at,
                    &viewed_by,
                    &saved_by,
                    &message.is_expired,
                ],
            )
            .await?;
        Ok(())
    }

    async fn fetch_message(&self, message_id: Uuid) -> AppResult<Message> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
        let row = client
            .query_opt(sql.as_str(), &[&message_id])
            .await?
            .ok_or(AppError::NotFound)?;
        Self::row_to_message(&row)
    }

    async fn conversation_messages(&self, conversation_id: Uuid) -> AppResult<Vec<Message>> {
        let client = self.pool.get().await?;
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE conversation_id = $1 ORDER BY created_at ASC"
        );
        let rows = client.query(sql.as_str(), &[&conversation_id]).await?;
        rows.iter().map(Self::row_to_message).collect()
    }

    async fn add_viewer(&self, message_id: Uuid, user_id: Uuid) -> AppResult<Message> {
        let client = self.pool.get().await?;

        // Append-if-absent in one statement; the WHERE clause makes the
        // insertion conditional so concurrent viewers cannot overwrite each
        // other's marks
        let sql = format!(
            "UPDATE messages \
             SET viewed_by = array_append(viewed_by, $2) \
             WHERE id = $1 AND NOT is_expired AND NOT ($2 = ANY(viewed_by)) \
             RETURNING {MESSAGE_COLUMNS}"
        );
        let updated = client.query_opt(sql.as_str(), &[&message_id, &user_id]).await?;

        match updated {
            Some(row) => Self::row_to_message(&row),
            // Zero rows: either already recorded / already expired (no-op,
            // return the current snapshot) or already swept (NotFound)
            None => self.fetch_message(message_id).await,
        }
    }

    async fn add_saver(&self, message_id: Uuid, user_id: Uuid) -> AppResult<Message> {
        let client = self.pool.get().await?;
        let sql = format!(
            "UPDATE messages \
             SET saved_by = CASE WHEN $2 = ANY(saved_by) THEN saved_by \
                                 ELSE array_append(saved_by, $2) END, \
                 is_expired = FALSE \
             WHERE id = $1 \
             RETURNING {MESSAGE_COLUMNS}"
        );
        let row = client
            .query_opt(sql.as_str(), &[&message_id, &user_id])
            .await?
            .ok_or(AppError::NotFound)?;
        Self::row_to_message(&row)
    }

    async fn remove_saver(&self, message_id: Uuid, user_id: Uuid) -> AppResult<Message> {
        let client = self.pool.get().await?;
        let sql = format!(
            "UPDATE messages SET saved_by = array_remove(saved_by, $2) \
             WHERE id = $1 RETURNING {MESSAGE_COLUMNS}"
        );
        let row = client
            .query_opt(sql.as_str(), &[&message_id, &user_id])
            .await?
            .ok_or(AppError::NotFound)?;
        Self::row_to_message(&row)
    }

    async fn set_expired(&self, message_id: Uuid, expired: bool) -> AppResult<()> {
        let client = self.pool.get().await?;
        // Flagging refuses while any saver holds the message; rows already
        // swept match nothing and stay a no-op
        client
            .execute(
                "UPDATE messages SET is_expired = $2 \
                 WHERE id = $1 AND (NOT $2 OR cardinality(saved_by) = 0)",
                &[&message_id, &expired],
            )
            .await?;
        Ok(())
    }

    async fn unexpired_messages(&self) -> AppResult<Vec<Message>> {
        let client = self.pool.get().await?;
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE NOT is_expired");
        let rows = client.query(sql.as_str(), &[]).await?;
        rows.iter().map(Self::row_to_message).collect()
    }

    async fn expired_message_ids(&self) -> AppResult<Vec<Uuid>> {
        let client = self.pool.get().await?;
        let rows = client
            .query("SELECT id FROM messages WHERE is_expired", &[])
            .await?;
        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    async fn delete_if_expired(&self, message_id: Uuid) -> AppResult<bool> {
        let client = self.pool.get().await?;
        // The save/expire condition is re-validated at delete time, not
        // trusted from whenever the flag was set
        let deleted = client
            .execute(
                "DELETE FROM messages \
                 WHERE id = $1 AND is_expired AND cardinality(saved_by) = 0",
                &[&message_id],
            )
            .await?;
        Ok(deleted > 0)
    }

    async fn purge_media_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let client = self.pool.get().await?;
        let purged = client
            .execute(
                "DELETE FROM messages \
                 WHERE payload_kind = 'media' AND created_at < $1 \
                   AND cardinality(saved_by) = 0",
                &[&cutoff],
            )
            .await?;
        Ok(purged)
    }
}
