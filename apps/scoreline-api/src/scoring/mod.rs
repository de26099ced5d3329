//! Event transaction coordinator: one scoring event, one transaction, then
//! publication of the committed result.

pub mod coordinator;
pub mod event;
pub mod publish;

use thiserror::Error;

use crate::engine::EngineError;
use crate::store::StoreError;

pub use coordinator::{Coordinator, Outcome, ScoreUpdate, SettleReport, StandingsUpdate};
pub use event::{ScoreEvent, Submission};
pub use publish::{process, publish_outcome, settle_and_publish};

#[derive(Debug, Error)]
pub enum ScoringError {
    /// Malformed input, rejected before a transaction is opened.
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("match {0} not found")]
    NotFound(String),
    /// The event contradicts the persisted match state.
    #[error(transparent)]
    Conflict(#[from] EngineError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ScoringError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}
