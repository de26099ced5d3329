//! The normalized scoring event. REST bodies and socket frames both end up
//! here before anything touches storage.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ScoringError;
use crate::engine::cricket::CricketAction;
use crate::engine::football::FootballAction;
use crate::models::fixture::Sport;

/// Actions accepted in one event. Every action of an event commits or rolls
/// back together.
pub const MAX_ACTIONS_PER_EVENT: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "sport", rename_all = "snake_case")]
pub enum ScoreEvent {
    Cricket {
        match_id: String,
        team_id: String,
        actions: Vec<CricketAction>,
        /// Authenticated submitter, set by the transport.
        #[serde(default)]
        submitted_by: Option<String>,
    },
    Football {
        match_id: String,
        team_id: String,
        actions: Vec<FootballAction>,
        #[serde(default)]
        submitted_by: Option<String>,
    },
}

/// Body of a sport-specific submission: `{ match_id?, team_id, actions }`.
/// REST takes the match id from the path instead. The submitter always comes
/// from the authenticated caller, never from the body.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Submission<A> {
    #[serde(default)]
    pub match_id: Option<String>,
    pub team_id: String,
    pub actions: Vec<A>,
}

impl Submission<CricketAction> {
    pub fn into_event(self, path_match_id: Option<&str>, submitted_by: &str) -> ScoreEvent {
        ScoreEvent::Cricket {
            match_id: pick_match_id(path_match_id, self.match_id),
            team_id: self.team_id,
            actions: self.actions,
            submitted_by: Some(submitted_by.to_string()),
        }
    }
}

impl Submission<FootballAction> {
    pub fn into_event(self, path_match_id: Option<&str>, submitted_by: &str) -> ScoreEvent {
        ScoreEvent::Football {
            match_id: pick_match_id(path_match_id, self.match_id),
            team_id: self.team_id,
            actions: self.actions,
            submitted_by: Some(submitted_by.to_string()),
        }
    }
}

fn pick_match_id(path: Option<&str>, body: Option<String>) -> String {
    match path {
        Some(id) => id.to_string(),
        None => body.unwrap_or_default(),
    }
}

impl ScoreEvent {
    pub fn match_id(&self) -> &str {
        match self {
            ScoreEvent::Cricket { match_id, .. } | ScoreEvent::Football { match_id, .. } => match_id,
        }
    }

    pub fn team_id(&self) -> &str {
        match self {
            ScoreEvent::Cricket { team_id, .. } | ScoreEvent::Football { team_id, .. } => team_id,
        }
    }

    pub fn submitted_by(&self) -> Option<&str> {
        match self {
            ScoreEvent::Cricket { submitted_by, .. } | ScoreEvent::Football { submitted_by, .. } => {
                submitted_by.as_deref()
            }
        }
    }

    pub fn sport(&self) -> Sport {
        match self {
            ScoreEvent::Cricket { .. } => Sport::Cricket,
            ScoreEvent::Football { .. } => Sport::Football,
        }
    }

    pub fn action_count(&self) -> usize {
        match self {
            ScoreEvent::Cricket { actions, .. } => actions.len(),
            ScoreEvent::Football { actions, .. } => actions.len(),
        }
    }

    /// Shape checks that need no match state.
    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.match_id().trim().is_empty() {
            return Err(ScoringError::validation("match_id", "is required"));
        }
        if self.team_id().trim().is_empty() {
            return Err(ScoringError::validation("team_id", "is required"));
        }
        match self.action_count() {
            0 => Err(ScoringError::validation("actions", "must not be empty")),
            n if n > MAX_ACTIONS_PER_EVENT => Err(ScoringError::validation(
                "actions",
                format!("at most {MAX_ACTIONS_PER_EVENT} actions per event"),
            )),
            _ => Ok(()),
        }
    }
}
