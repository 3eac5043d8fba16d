use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Message payload discriminator. Media messages carry only a reference to
/// the uploaded object; upload and storage formats are owned by the media
/// layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePayload {
    Text { content: String },
    Media { object_key: String },
}

impl MessagePayload {
    pub fn is_media(&self) -> bool {
        matches!(self, MessagePayload::Media { .. })
    }
}

/// Message record with the visibility ledger embedded: who has viewed it,
/// who has pinned it, and whether it is flagged for deletion.
///
/// `is_expired = true` is a pre-deletion state, not deletion itself; only the
/// sweeper physically removes rows. A save landing before the sweep clears
/// the flag again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub payload: MessagePayload,
    pub created_at: DateTime<Utc>,
    pub viewed_by: HashSet<Uuid>,
    pub saved_by: HashSet<Uuid>,
    pub is_expired: bool,
}

impl Message {
    /// Seed a new message. The sender implicitly views their own message at
    /// creation; this is the only place `viewed_by` is seeded, and it is
    /// seeded with exactly the sender regardless of recipient delivery state.
    pub fn new(conversation_id: Uuid, sender_id: Uuid, payload: MessagePayload) -> Self {
        let mut viewed_by = HashSet::new();
        viewed_by.insert(sender_id);

        Self {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            payload,
            created_at: Utc::now(),
            viewed_by,
            saved_by: HashSet::new(),
            is_expired: false,
        }
    }

    pub fn is_saved_by(&self, user_id: Uuid) -> bool {
        self.saved_by.contains(&user_id)
    }

    pub fn is_viewed_by(&self, user_id: Uuid) -> bool {
        self.viewed_by.contains(&user_id)
    }
}
