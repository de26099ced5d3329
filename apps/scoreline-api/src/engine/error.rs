use thiserror::Error;

/// A scoring event that is inconsistent with the current match state.
///
/// Never retried: the submitter is told and the transaction is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("{0}")]
    InvalidStateTransition(String),
    #[error("invalid delivery: {0}")]
    InvalidDelivery(String),
    #[error("invalid incident: {0}")]
    InvalidIncident(String),
    #[error("team {0} is not playing in this match")]
    UnknownTeam(String),
    #[error("player {0} is not available for this team")]
    UnknownPlayer(String),
    #[error("innings {0} is already completed")]
    InningsCompleted(i32),
    #[error("all {0} wickets have already fallen")]
    WicketLimitReached(i32),
    #[error("match is already finished")]
    MatchFinished,
    #[error("match is not finished")]
    MatchNotFinished,
    #[error("unsupported format `{0}`")]
    UnsupportedFormat(String),
}

impl EngineError {
    pub fn transition(message: impl Into<String>) -> Self {
        Self::InvalidStateTransition(message.into())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
