use crate::{error::AppError, middleware::guards::User, routes::messages::MessageDto, state::AppState};
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateConversationRequest {
    pub participant_ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct ConversationDto {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub participant_ids: Vec<Uuid>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct OpenConversationResponse {
    pub marked_viewed: usize,
}

/// POST /conversations
/// Seed a conversation with a fixed participant set (creator always included)
#[post("/conversations")]
pub async fn create_conversation(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<CreateConversationRequest>,
) -> Result<HttpResponse, AppError> {
    let conversation = state
        .visibility
        .create_conversation(user.id, body.into_inner().participant_ids)
        .await?;

    Ok(HttpResponse::Created().json(ConversationDto {
        id: conversation.id,
        creator_id: conversation.creator_id,
        participant_ids: conversation.participant_ids,
        created_at: conversation.created_at.to_rfc3339(),
    }))
}

/// POST /conversations/{id}/open
/// The caller opened the chat: mark every message they have not yet viewed.
/// Best-effort; partially applied batches self-heal on the next open.
#[post("/conversations/{id}/open")]
pub async fn open_conversation(
    state: web::Data<AppState>,
    conversation_id: web::Path<Uuid>,
    user: User,
) -> Result<HttpResponse, AppError> {
    let marked = state
        .visibility
        .on_conversation_opened(conversation_id.into_inner(), user.id)
        .await?;

    Ok(HttpResponse::Ok().json(OpenConversationResponse {
        marked_viewed: marked,
    }))
}

/// GET /conversations/{id}/messages
/// Messages still visible to the caller. Flagged-expired messages are
/// omitted; they are pending deletion unless a save reverses the flag.
#[get("/conversations/{id}/messages")]
pub async fn get_messages(
    state: web::Data<AppState>,
    conversation_id: web::Path<Uuid>,
    user: User,
) -> Result<HttpResponse, AppError> {
    let conversation_id = conversation_id.into_inner();

    let conversation = state.store.fetch_conversation(conversation_id).await?;
    if !conversation.is_participant(user.id) {
        return Err(AppError::InvalidParticipant {
            user_id: user.id,
            conversation_id,
        });
    }

    let messages = state.store.conversation_messages(conversation_id).await?;
    let out: Vec<MessageDto> = messages
        .into_iter()
        .filter(|m| !m.is_expired)
        .map(|m| MessageDto::from_message(&m, user.id))
        .collect();

    Ok(HttpResponse::Ok().json(out))
}
