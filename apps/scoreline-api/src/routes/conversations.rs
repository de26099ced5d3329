use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::chat;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::chat::ChatMessage;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/conversations/{conversation_id}/messages", post(send_message))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub content: String,
}

// ---------------------------------------------------------------------------
// POST /api/v1/conversations/{conversation_id}/messages
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/conversations/{conversation_id}/messages",
    tag = "Chat",
    security(("bearer" = [])),
    params(("conversation_id" = String, Path, description = "Conversation ID")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored and broadcast", body = ChatMessage),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not a participant", body = ApiErrorBody),
    ),
)]
pub async fn send_message(
    AuthUser { user_id }: AuthUser,
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    let message = chat::create_message(&state, &user_id, &conversation_id, &body.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
