//! Visibility evaluator: the pure decision function at the core of the
//! engine. Order-independent and side-effect free, so the mutation path and
//! the sweeper can both run it redundantly against the same snapshot; the
//! second evaluation is a correctness re-check, not a retry.

use crate::models::Message;
use uuid::Uuid;

/// Decide whether a message has become expired.
///
/// A non-empty `saved_by` is an absolute override. Otherwise the message
/// expires once every participant other than the sender appears in
/// `viewed_by`. An empty eligible-viewer set (degenerate single-party
/// conversation) vacuously satisfies the subset condition, so such a message
/// expires immediately; that reading is intentional.
pub fn should_expire(message: &Message, participants: &[Uuid]) -> bool {
    if !message.saved_by.is_empty() {
        return false;
    }

    participants
        .iter()
        .filter(|p| **p != message.sender_id)
        .all(|p| message.viewed_by.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessagePayload;

    fn text_message(conversation_id: Uuid, sender_id: Uuid) -> Message {
        Message::new(
            conversation_id,
            sender_id,
            MessagePayload::Text {
                content: "hi".into(),
            },
        )
    }

    #[test]
    fn unviewed_message_does_not_expire() {
        let sender = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let msg = text_message(Uuid::new_v4(), sender);
        assert!(!should_expire(&msg, &[sender, viewer]));
    }

    #[test]
    fn expires_once_all_eligible_viewers_have_viewed() {
        let sender = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut msg = text_message(Uuid::new_v4(), sender);

        msg.viewed_by.insert(a);
        assert!(!should_expire(&msg, &[sender, a, b]));

        msg.viewed_by.insert(b);
        assert!(should_expire(&msg, &[sender, a, b]));
    }

    #[test]
    fn save_overrides_view_count() {
        let sender = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let mut msg = text_message(Uuid::new_v4(), sender);
        msg.viewed_by.insert(viewer);
        msg.saved_by.insert(viewer);
        assert!(!should_expire(&msg, &[sender, viewer]));
    }

    #[test]
    fn sender_self_view_never_counts() {
        let sender = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let msg = text_message(Uuid::new_v4(), sender);
        // Sender is in viewed_by from creation, but that alone is not enough
        assert!(msg.viewed_by.contains(&sender));
        assert!(!should_expire(&msg, &[sender, viewer]));
    }

    #[test]
    fn empty_eligible_set_expires_vacuously() {
        let sender = Uuid::new_v4();
        let msg = text_message(Uuid::new_v4(), sender);
        assert!(should_expire(&msg, &[sender]));
        assert!(should_expire(&msg, &[]));
    }

    #[test]
    fn non_participant_views_do_not_satisfy_condition() {
        let sender = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let mut msg = text_message(Uuid::new_v4(), sender);
        msg.viewed_by.insert(stranger);
        assert!(!should_expire(&msg, &[sender, viewer]));
    }
}
