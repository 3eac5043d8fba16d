use crate::{
    error::AppError,
    middleware::guards::User,
    models::{Message, MessagePayload},
    state::AppState,
};
use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub payload: MessagePayload,
}

#[derive(Serialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub payload: MessagePayload,
    pub created_at: String,
    pub viewed: bool,
    pub saved: bool,
}

impl MessageDto {
    pub fn from_message(message: &Message, user_id: Uuid) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            payload: message.payload.clone(),
            created_at: message.created_at.to_rfc3339(),
            viewed: message.is_viewed_by(user_id),
            saved: message.is_saved_by(user_id),
        }
    }
}

#[derive(Serialize)]
pub struct ToggleSaveResponse {
    pub message_id: Uuid,
    pub saved: bool,
}

/// POST /conversations/{id}/messages
/// Send a message; the ledger is seeded with the sender as the only viewer
#[post("/conversations/{id}/messages")]
pub async fn send_message(
    state: web::Data<AppState>,
    conversation_id: web::Path<Uuid>,
    user: User,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let payload = body.into_inner().payload;
    if let MessagePayload::Text { content } = &payload {
        if content.is_empty() {
            return Err(AppError::BadRequest("message content cannot be empty".into()));
        }
    }

    let message = state
        .visibility
        .on_message_sent(conversation_id.into_inner(), user.id, payload)
        .await?;

    Ok(HttpResponse::Created().json(MessageDto::from_message(&message, user.id)))
}

/// POST /messages/{id}/save
/// Toggle the caller's save pin; returns the new saved state
#[post("/messages/{id}/save")]
pub async fn toggle_save(
    state: web::Data<AppState>,
    message_id: web::Path<Uuid>,
    user: User,
) -> Result<HttpResponse, AppError> {
    let message_id = message_id.into_inner();
    let saved = state.visibility.toggle_saved(message_id, user.id).await?;

    Ok(HttpResponse::Ok().json(ToggleSaveResponse { message_id, saved }))
}
