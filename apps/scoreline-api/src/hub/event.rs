//! Hub categories, topics, and the events that flow through the queues.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// An independent event stream with its own intake queue and delivery loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Chat,
    Cricket,
    Football,
    Tournament,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Chat,
        Category::Cricket,
        Category::Football,
        Category::Tournament,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Category::Chat => "chat",
            Category::Cricket => "cricket",
            Category::Football => "football",
            Category::Tournament => "tournament",
        }
    }

    pub(crate) const fn index(&self) -> usize {
        match self {
            Category::Chat => 0,
            Category::Cricket => 1,
            Category::Football => 2,
            Category::Tournament => 3,
        }
    }

    /// The category an outbound event type belongs to, if any.
    pub fn of_event(event_type: &str) -> Option<Self> {
        match event_type {
            EventName::MESSAGE_CREATED => Some(Category::Chat),
            EventName::CRICKET_SCORE_UPDATED => Some(Category::Cricket),
            EventName::FOOTBALL_SCORE_UPDATED => Some(Category::Football),
            EventName::STANDINGS_UPDATED => Some(Category::Tournament),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| TopicError::UnknownCategory(s.to_string()))
    }
}

/// Event types pushed to clients.
pub struct EventName;

impl EventName {
    pub const MESSAGE_CREATED: &'static str = "MESSAGE_CREATED";
    pub const CRICKET_SCORE_UPDATED: &'static str = "CRICKET_SCORE_UPDATED";
    pub const FOOTBALL_SCORE_UPDATED: &'static str = "FOOTBALL_SCORE_UPDATED";
    pub const STANDINGS_UPDATED: &'static str = "STANDINGS_UPDATED";
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("topic `{0}` must look like match:<id>, conversation:<id> or tournament:<id>")]
    Malformed(String),
    #[error("unknown category `{0}`")]
    UnknownCategory(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Match,
    Conversation,
    Tournament,
}

impl TopicKind {
    const fn prefix(&self) -> &'static str {
        match self {
            TopicKind::Match => "match",
            TopicKind::Conversation => "conversation",
            TopicKind::Tournament => "tournament",
        }
    }
}

/// An addressable broadcast target, written `<kind>:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    fn new(kind: TopicKind, id: &str) -> Self {
        Self(format!("{}:{id}", kind.prefix()))
    }

    pub fn fixture(match_id: &str) -> Self {
        Self::new(TopicKind::Match, match_id)
    }

    pub fn conversation(conversation_id: &str) -> Self {
        Self::new(TopicKind::Conversation, conversation_id)
    }

    pub fn tournament(tournament_id: &str) -> Self {
        Self::new(TopicKind::Tournament, tournament_id)
    }

    pub fn kind(&self) -> TopicKind {
        self.split().0
    }

    /// The id after the kind prefix.
    pub fn target(&self) -> &str {
        self.split().1
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split(&self) -> (TopicKind, &str) {
        // Construction guarantees the prefix.
        let (prefix, id) = self.0.split_once(':').unwrap_or(("match", &self.0));
        let kind = match prefix {
            "conversation" => TopicKind::Conversation,
            "tournament" => TopicKind::Tournament,
            _ => TopicKind::Match,
        };
        (kind, id)
    }
}

impl FromStr for Topic {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TopicError::Malformed(s.to_string());
        let (prefix, id) = s.split_once(':').ok_or_else(malformed)?;
        if id.is_empty() || id.contains(char::is_whitespace) {
            return Err(malformed());
        }
        let kind = match prefix {
            "match" => TopicKind::Match,
            "conversation" => TopicKind::Conversation,
            "tournament" => TopicKind::Tournament,
            _ => return Err(malformed()),
        };
        Ok(Self::new(kind, id))
    }
}

impl TryFrom<String> for Topic {
    type Error = TopicError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One payload queued for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct HubEvent {
    pub category: Category,
    pub event_type: String,
    /// Required for topic fan-out; ignored when the category goes to everyone.
    pub topic: Option<Topic>,
    pub payload: Value,
}

impl HubEvent {
    pub fn new(category: Category, event_type: &str, topic: Option<Topic>, payload: Value) -> Self {
        Self {
            category,
            event_type: event_type.to_string(),
            topic,
            payload,
        }
    }

    /// The `{type, payload}` frame written to client sockets.
    pub fn to_frame(&self) -> String {
        serde_json::json!({
            "type": self.event_type,
            "payload": self.payload,
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_parse_and_print() {
        let topic: Topic = "match:mat_1".parse().unwrap();
        assert_eq!(topic, Topic::fixture("mat_1"));
        assert_eq!(topic.kind(), TopicKind::Match);
        assert_eq!(topic.target(), "mat_1");
        assert_eq!(topic.to_string(), "match:mat_1");

        let convo = Topic::conversation("cnv_9");
        assert_eq!(convo.kind(), TopicKind::Conversation);
        assert_eq!(convo.target(), "cnv_9");
    }

    #[test]
    fn bad_topics_are_rejected() {
        for raw in ["mat_1", "match:", "team:x", "match:a b", ""] {
            assert!(raw.parse::<Topic>().is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn topic_serde_validates() {
        let topic: Topic = serde_json::from_str("\"tournament:trn_1\"").unwrap();
        assert_eq!(topic.kind(), TopicKind::Tournament);
        assert!(serde_json::from_str::<Topic>("\"nope\"").is_err());
        assert_eq!(serde_json::to_string(&topic).unwrap(), "\"tournament:trn_1\"");
    }

    #[test]
    fn frame_shape() {
        let event = HubEvent::new(
            Category::Chat,
            EventName::MESSAGE_CREATED,
            Some(Topic::conversation("cnv_1")),
            serde_json::json!({ "content": "hi" }),
        );
        let frame: Value = serde_json::from_str(&event.to_frame()).unwrap();
        assert_eq!(
            frame,
            serde_json::json!({ "type": "MESSAGE_CREATED", "payload": { "content": "hi" } })
        );
    }

    #[test]
    fn event_types_map_to_categories() {
        assert_eq!(Category::of_event("STANDINGS_UPDATED"), Some(Category::Tournament));
        assert_eq!(Category::of_event("CRICKET_SCORE_UPDATED"), Some(Category::Cricket));
        assert_eq!(Category::of_event("TYPING"), None);
        assert_eq!("football".parse::<Category>(), Ok(Category::Football));
    }
}
