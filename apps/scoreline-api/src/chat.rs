//! Conversation messages: persisted first, then pushed to the
//! conversation's subscribers.

use chrono::Utc;

use crate::error::{ApiError, FieldError};
use crate::hub::{Category, EventName, HubEvent, Topic};
use crate::models::chat::ChatMessage;
use crate::scoring::publish::publish_event;
use crate::AppState;

pub const MAX_MESSAGE_LEN: usize = 4000;

fn validate_content(content: &str) -> Result<&str, ApiError> {
    let content = content.trim();
    let problem = if content.is_empty() {
        "Message content is required"
    } else if content.chars().count() > MAX_MESSAGE_LEN {
        "Message content must be at most 4000 characters"
    } else {
        return Ok(content);
    };
    Err(ApiError::validation(vec![FieldError {
        field: "content".to_string(),
        message: problem.to_string(),
    }]))
}

/// Stores a message from a conversation participant and broadcasts
/// `MESSAGE_CREATED` on the conversation topic.
pub async fn create_message(
    state: &AppState,
    sender_id: &str,
    conversation_id: &str,
    content: &str,
) -> Result<ChatMessage, ApiError> {
    let content = validate_content(content)?;
    if !state.chat.is_participant(conversation_id, sender_id).await? {
        return Err(ApiError::forbidden("Not a participant of this conversation"));
    }

    let message = ChatMessage {
        id: state.snowflake.generate(),
        conversation_id: conversation_id.to_string(),
        sender_id: sender_id.to_string(),
        content: content.to_string(),
        created_at: Utc::now(),
    };
    state.chat.insert_message(&message).await?;

    let payload = serde_json::to_value(&message).map_err(|_| ApiError::internal("serialization"))?;
    let event = HubEvent::new(
        Category::Chat,
        EventName::MESSAGE_CREATED,
        Some(Topic::conversation(conversation_id)),
        payload,
    );
    publish_event(state, event).await;

    tracing::debug!(
        conversation_id = %conversation_id,
        message_id = message.id,
        "chat message created"
    );
    Ok(message)
}
