//! Socket frame types. Every frame is a JSON text message of the shape
//! `{ "type": ..., "payload": ... }`; client frames may also name a category.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

/// Frame types sent by clients.
pub struct ClientFrameType;

impl ClientFrameType {
    pub const AUTHENTICATE: &'static str = "AUTHENTICATE";
    pub const SUBSCRIBE: &'static str = "SUBSCRIBE";
    pub const UNSUBSCRIBE: &'static str = "UNSUBSCRIBE";
    pub const CREATE_MESSAGE: &'static str = "CREATE_MESSAGE";
    pub const CRICKET_EVENT: &'static str = "CRICKET_EVENT";
    pub const FOOTBALL_EVENT: &'static str = "FOOTBALL_EVENT";
}

/// Frame types sent by the server outside of hub broadcasts.
pub struct ServerFrameType;

impl ServerFrameType {
    pub const AUTHENTICATED: &'static str = "AUTHENTICATED";
    pub const SUBSCRIBED: &'static str = "SUBSCRIBED";
    pub const UNSUBSCRIBED: &'static str = "UNSUBSCRIBED";
    pub const MESSAGE_ACCEPTED: &'static str = "MESSAGE_ACCEPTED";
    pub const EVENT_ACCEPTED: &'static str = "EVENT_ACCEPTED";
    pub const ERROR: &'static str = "ERROR";
}

/// A message received from the client.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
pub struct AuthenticatePayload {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct TopicPayload {
    pub topic: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateMessagePayload {
    pub conversation_id: String,
    pub content: String,
}

/// A reply frame for this connection only.
#[derive(Debug, Clone, Serialize)]
pub struct ServerFrame {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub payload: Value,
}

impl ServerFrame {
    pub fn new(frame_type: &'static str, payload: Value) -> Self {
        Self { frame_type, payload }
    }

    pub fn authenticated(client_id: &str, user_id: &str) -> Self {
        Self::new(
            ServerFrameType::AUTHENTICATED,
            serde_json::json!({ "client_id": client_id, "user_id": user_id }),
        )
    }

    pub fn topic(frame_type: &'static str, topic: &str) -> Self {
        Self::new(frame_type, serde_json::json!({ "topic": topic }))
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(
            ServerFrameType::ERROR,
            serde_json::json!({ "code": code, "message": message.into() }),
        )
    }

    pub fn from_api_error(err: &ApiError) -> Self {
        let payload = serde_json::to_value(err.body()).unwrap_or(Value::Null);
        Self::new(ServerFrameType::ERROR, payload)
    }

    pub fn to_text(&self) -> String {
        serde_json::json!({ "type": self.frame_type, "payload": self.payload }).to_string()
    }
}
