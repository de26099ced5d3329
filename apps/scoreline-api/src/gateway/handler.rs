//! Frame dispatch: AUTHENTICATE first, then subscriptions, chat messages,
//! and scoring events. Every client frame after authentication gets exactly
//! one reply frame.

use scoreline_common::id::{prefix, prefixed_ulid};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::auth::tokens;
use crate::chat;
use crate::engine::cricket::CricketAction;
use crate::engine::football::FootballAction;
use crate::error::ApiError;
use crate::hub::{Category, ClientHandle, Topic, TopicKind};
use crate::scoring::{self, ScoreEvent, Submission};
use crate::AppState;

use super::events::{
    AuthenticatePayload, ClientFrame, ClientFrameType, CreateMessagePayload, ServerFrame,
    ServerFrameType, TopicPayload,
};
use super::session::GatewaySession;

/// Resolves the token and registers a new hub client. The returned receiver
/// is the client's outbound queue.
pub async fn handle_authenticate(
    state: &AppState,
    payload: AuthenticatePayload,
) -> Result<(GatewaySession, mpsc::Receiver<std::sync::Arc<str>>), &'static str> {
    let token = tokens::lookup_token(state.kv.as_ref(), payload.token.trim())
        .await
        .map_err(|_| "Token lookup failed")?
        .ok_or("Invalid or expired token")?;

    let (handle, rx) = ClientHandle::new(
        prefixed_ulid(prefix::CLIENT),
        token.user_id,
        state.hub.client_send_buffer(),
    );
    let session = GatewaySession::for_client(&handle);
    state.hub.register(handle);
    Ok((session, rx))
}

pub async fn handle_frame(state: &AppState, session: &GatewaySession, frame: ClientFrame) -> ServerFrame {
    match frame.frame_type.as_str() {
        ClientFrameType::SUBSCRIBE => handle_subscribe(state, session, frame).await,
        ClientFrameType::UNSUBSCRIBE => handle_unsubscribe(state, session, frame.payload),
        ClientFrameType::CREATE_MESSAGE => handle_create_message(state, session, frame.payload).await,
        ClientFrameType::CRICKET_EVENT => {
            match parse::<Submission<CricketAction>>(frame.payload) {
                Ok(submission) => handle_score_event(state, session, submission.into_event(None, &session.user_id)).await,
                Err(reply) => reply,
            }
        }
        ClientFrameType::FOOTBALL_EVENT => {
            match parse::<Submission<FootballAction>>(frame.payload) {
                Ok(submission) => handle_score_event(state, session, submission.into_event(None, &session.user_id)).await,
                Err(reply) => reply,
            }
        }
        ClientFrameType::AUTHENTICATE => ServerFrame::error("ALREADY_AUTHENTICATED", "Already authenticated"),
        other => ServerFrame::error("UNKNOWN_FRAME_TYPE", format!("Unknown frame type `{other}`")),
    }
}

fn parse<T: DeserializeOwned>(payload: Value) -> Result<T, ServerFrame> {
    serde_json::from_value(payload)
        .map_err(|e| ServerFrame::error("BAD_REQUEST", format!("Invalid payload: {e}")))
}

fn parse_topic(payload: Value) -> Result<Topic, ServerFrame> {
    let TopicPayload { topic } = parse(payload)?;
    topic
        .parse::<Topic>()
        .map_err(|e| ServerFrame::error("INVALID_TOPIC", e.to_string()))
}

async fn handle_subscribe(state: &AppState, session: &GatewaySession, frame: ClientFrame) -> ServerFrame {
    if let Some(category) = &frame.category {
        if let Err(e) = category.parse::<Category>() {
            return ServerFrame::error("UNKNOWN_CATEGORY", e.to_string());
        }
    }
    let topic = match parse_topic(frame.payload) {
        Ok(topic) => topic,
        Err(reply) => return reply,
    };

    if topic.kind() == TopicKind::Conversation {
        match state.chat.is_participant(topic.target(), &session.user_id).await {
            Ok(true) => {}
            Ok(false) => {
                return ServerFrame::error("FORBIDDEN", "Not a participant of this conversation");
            }
            Err(e) => return ServerFrame::from_api_error(&ApiError::from(e)),
        }
    }

    match state.hub.subscribe(&session.client_id, topic.clone()) {
        Ok(()) => {
            tracing::debug!(client_id = %session.client_id, topic = %topic, "subscribed");
            ServerFrame::topic(ServerFrameType::SUBSCRIBED, topic.as_str())
        }
        Err(e) => ServerFrame::error("NOT_CONNECTED", e.to_string()),
    }
}

fn handle_unsubscribe(state: &AppState, session: &GatewaySession, payload: Value) -> ServerFrame {
    match parse_topic(payload) {
        Ok(topic) => {
            state.hub.unsubscribe(&session.client_id, &topic);
            ServerFrame::topic(ServerFrameType::UNSUBSCRIBED, topic.as_str())
        }
        Err(reply) => reply,
    }
}

async fn handle_create_message(state: &AppState, session: &GatewaySession, payload: Value) -> ServerFrame {
    let body: CreateMessagePayload = match parse(payload) {
        Ok(body) => body,
        Err(reply) => return reply,
    };
    match chat::create_message(state, &session.user_id, &body.conversation_id, &body.content).await {
        Ok(message) => ServerFrame::new(
            ServerFrameType::MESSAGE_ACCEPTED,
            serde_json::to_value(&message).unwrap_or(Value::Null),
        ),
        Err(e) => ServerFrame::from_api_error(&e),
    }
}

async fn handle_score_event(state: &AppState, session: &GatewaySession, event: ScoreEvent) -> ServerFrame {
    tracing::debug!(
        client_id = %session.client_id,
        user_id = %session.user_id,
        match_id = %event.match_id(),
        "scoring event received over socket"
    );
    match scoring::process(state, event).await {
        Ok(outcome) => ServerFrame::new(
            ServerFrameType::EVENT_ACCEPTED,
            serde_json::to_value(&outcome.update).unwrap_or(Value::Null),
        ),
        Err(e) => ServerFrame::from_api_error(&ApiError::from(e)),
    }
}
