//! Persistence gateway used by the scoring coordinator.
//!
//! Every scoring event runs inside one [`MatchTx`]: reads happen through the
//! transaction, writes are applied as [`Change`]s, and the coordinator ends it
//! with exactly one of `commit` or `rollback`.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use diesel_async::pooled_connection::deadpool::PoolError;
use thiserror::Error;

use crate::models::chat::ChatMessage;
use crate::models::cricket::{Ball, BatterInnings, BowlerSpell, Innings};
use crate::models::fixture::{Fixture, Player};
use crate::models::football::{Incident, PeriodScore, TeamStats};
use crate::models::standing::Standing;
use crate::models::Change;

pub use memory::MemoryDatabase;
pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),
    #[error("duplicate {0}")]
    Duplicate(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn MatchTx>>;
}

/// One open transaction. Reads see the transaction's own writes.
#[async_trait]
pub trait MatchTx: Send {
    /// Reads the fixture and holds it locked until the transaction ends, so
    /// two events for the same match never interleave.
    async fn lock_fixture(&mut self, match_id: &str) -> StoreResult<Option<Fixture>>;
    /// Plain read that takes no row lock.
    async fn fixture(&mut self, match_id: &str) -> StoreResult<Option<Fixture>>;
    async fn players(&mut self, team_ids: &[String]) -> StoreResult<Vec<Player>>;
    async fn innings(&mut self, match_id: &str) -> StoreResult<Vec<Innings>>;
    async fn batters(&mut self, match_id: &str) -> StoreResult<Vec<BatterInnings>>;
    async fn bowlers(&mut self, match_id: &str) -> StoreResult<Vec<BowlerSpell>>;
    async fn last_ball(&mut self, innings_id: &str) -> StoreResult<Option<Ball>>;
    async fn periods(&mut self, match_id: &str) -> StoreResult<Vec<PeriodScore>>;
    async fn incidents(&mut self, match_id: &str) -> StoreResult<Vec<Incident>>;
    async fn stats(&mut self, match_id: &str) -> StoreResult<Vec<TeamStats>>;
    async fn standings(&mut self, tournament_id: &str) -> StoreResult<Vec<Standing>>;

    async fn apply(&mut self, change: &Change) -> StoreResult<()>;
    async fn commit(self: Box<Self>) -> StoreResult<()>;
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn is_participant(&self, conversation_id: &str, user_id: &str) -> StoreResult<bool>;
    async fn insert_message(&self, message: &ChatMessage) -> StoreResult<()>;
}
