//! Match state engine: pure decision logic over rows read inside a
//! scoring transaction. Nothing here touches storage or the hub.

pub mod cricket;
pub mod error;
pub mod football;
pub mod format;
pub mod settlement;

#[cfg(test)]
pub(crate) mod testing;

use chrono::{DateTime, Utc};
use scoreline_common::SnowflakeGenerator;

pub use error::{EngineError, EngineResult};

/// Inputs an engine operation needs besides match state.
pub struct EngineContext<'a> {
    /// Ids for append-only rows.
    pub ids: &'a SnowflakeGenerator,
    pub now: DateTime<Utc>,
    /// Authenticated user behind the event, stamped on appended rows.
    pub submitted_by: Option<&'a str>,
}
