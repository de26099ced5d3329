//! In-memory gateway for tests and local runs without PostgreSQL.
//!
//! A transaction holds the database lock for its whole lifetime and writes
//! to a private copy; commit swaps the copy in, rollback drops it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{ChatStore, MatchStore, MatchTx, StoreError, StoreResult};
use crate::models::chat::ChatMessage;
use crate::models::cricket::{Ball, BatterInnings, BowlerSpell, Innings, Wicket};
use crate::models::fixture::{Fixture, Player};
use crate::models::football::{Incident, Period, PeriodScore, TeamStats};
use crate::models::standing::Standing;
use crate::models::Change;

type Pair = (String, String);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryState {
    pub fixtures: BTreeMap<String, Fixture>,
    pub players: BTreeMap<String, Player>,
    pub innings: BTreeMap<String, Innings>,
    /// Keyed by `(innings_id, player_id)`.
    pub batters: BTreeMap<Pair, BatterInnings>,
    pub bowlers: BTreeMap<Pair, BowlerSpell>,
    pub balls: BTreeMap<i64, Ball>,
    pub wickets: BTreeMap<i64, Wicket>,
    pub periods: BTreeMap<(String, String, Period), PeriodScore>,
    pub incidents: BTreeMap<i64, Incident>,
    /// Keyed by `(match_id, team_id)`.
    pub stats: BTreeMap<Pair, TeamStats>,
    /// Keyed by `(tournament_id, team_id)`.
    pub standings: BTreeMap<Pair, Standing>,
    /// `(conversation_id, user_id)`.
    pub participants: BTreeSet<Pair>,
    pub messages: BTreeMap<i64, ChatMessage>,
}

impl MemoryState {
    fn apply(&mut self, change: &Change) -> StoreResult<()> {
        match change {
            Change::Fixture(f) => {
                self.fixtures.insert(f.id.clone(), f.clone());
            }
            Change::Innings(i) => {
                self.innings.insert(i.id.clone(), i.clone());
            }
            Change::Batter(b) => {
                self.batters
                    .insert((b.innings_id.clone(), b.player_id.clone()), b.clone());
            }
            Change::Bowler(s) => {
                self.bowlers
                    .insert((s.innings_id.clone(), s.player_id.clone()), s.clone());
            }
            Change::Ball(b) => insert_once(&mut self.balls, b.id, b, "ball")?,
            Change::Wicket(w) => insert_once(&mut self.wickets, w.id, w, "wicket")?,
            Change::Period(p) => {
                self.periods
                    .insert((p.match_id.clone(), p.team_id.clone(), p.period), p.clone());
            }
            Change::Incident(i) => insert_once(&mut self.incidents, i.id, i, "incident")?,
            Change::Stats(s) => {
                self.stats
                    .insert((s.match_id.clone(), s.team_id.clone()), s.clone());
            }
            Change::Standing(s) => {
                self.standings
                    .insert((s.tournament_id.clone(), s.team_id.clone()), s.clone());
            }
        }
        Ok(())
    }
}

fn insert_once<T: Clone>(
    map: &mut BTreeMap<i64, T>,
    id: i64,
    row: &T,
    what: &str,
) -> StoreResult<()> {
    if map.contains_key(&id) {
        return Err(StoreError::Duplicate(format!("{what} {id}")));
    }
    map.insert(id, row.clone());
    Ok(())
}

/// Shared in-memory database. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
    fail_after: Arc<parking_lot::Mutex<Option<usize>>>,
    row_locks: Arc<AtomicUsize>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutates committed state directly, outside any transaction.
    pub async fn seed(&self, f: impl FnOnce(&mut MemoryState)) {
        f(&mut *self.state.lock().await);
    }

    /// A copy of the committed state.
    pub async fn dump(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    pub async fn add_participant(&self, conversation_id: &str, user_id: &str) {
        self.state
            .lock()
            .await
            .participants
            .insert((conversation_id.to_string(), user_id.to_string()));
    }

    /// Makes the next transaction fail on its `n + 1`th write.
    pub fn fail_apply_after(&self, n: usize) {
        *self.fail_after.lock() = Some(n);
    }

    /// How many fixture row locks transactions have taken so far.
    pub fn row_locks(&self) -> usize {
        self.row_locks.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MatchStore for MemoryDatabase {
    async fn begin(&self) -> StoreResult<Box<dyn MatchTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            applied: 0,
            fail_after: self.fail_after.lock().take(),
            row_locks: self.row_locks.clone(),
        }))
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    applied: usize,
    fail_after: Option<usize>,
    row_locks: Arc<AtomicUsize>,
}

#[async_trait]
impl MatchTx for MemoryTx {
    async fn lock_fixture(&mut self, match_id: &str) -> StoreResult<Option<Fixture>> {
        self.row_locks.fetch_add(1, Ordering::Relaxed);
        Ok(self.working.fixtures.get(match_id).cloned())
    }

    async fn fixture(&mut self, match_id: &str) -> StoreResult<Option<Fixture>> {
        Ok(self.working.fixtures.get(match_id).cloned())
    }

    async fn players(&mut self, team_ids: &[String]) -> StoreResult<Vec<Player>> {
        Ok(self
            .working
            .players
            .values()
            .filter(|p| team_ids.contains(&p.team_id))
            .cloned()
            .collect())
    }

    async fn innings(&mut self, match_id: &str) -> StoreResult<Vec<Innings>> {
        let mut rows: Vec<_> = self
            .working
            .innings
            .values()
            .filter(|i| i.match_id == match_id)
            .cloned()
            .collect();
        rows.sort_by_key(|i| i.number);
        Ok(rows)
    }

    async fn batters(&mut self, match_id: &str) -> StoreResult<Vec<BatterInnings>> {
        Ok(self
            .working
            .batters
            .values()
            .filter(|b| b.match_id == match_id)
            .cloned()
            .collect())
    }

    async fn bowlers(&mut self, match_id: &str) -> StoreResult<Vec<BowlerSpell>> {
        Ok(self
            .working
            .bowlers
            .values()
            .filter(|s| s.match_id == match_id)
            .cloned()
            .collect())
    }

    async fn last_ball(&mut self, innings_id: &str) -> StoreResult<Option<Ball>> {
        Ok(self
            .working
            .balls
            .values()
            .filter(|b| b.innings_id == innings_id)
            .max_by_key(|b| b.seq)
            .cloned())
    }

    async fn periods(&mut self, match_id: &str) -> StoreResult<Vec<PeriodScore>> {
        Ok(self
            .working
            .periods
            .values()
            .filter(|p| p.match_id == match_id)
            .cloned()
            .collect())
    }

    async fn incidents(&mut self, match_id: &str) -> StoreResult<Vec<Incident>> {
        Ok(self
            .working
            .incidents
            .values()
            .filter(|i| i.match_id == match_id)
            .cloned()
            .collect())
    }

    async fn stats(&mut self, match_id: &str) -> StoreResult<Vec<TeamStats>> {
        Ok(self
            .working
            .stats
            .values()
            .filter(|s| s.match_id == match_id)
            .cloned()
            .collect())
    }

    async fn standings(&mut self, tournament_id: &str) -> StoreResult<Vec<Standing>> {
        Ok(self
            .working
            .standings
            .values()
            .filter(|s| s.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn apply(&mut self, change: &Change) -> StoreResult<()> {
        if self.fail_after.is_some_and(|n| self.applied >= n) {
            return Err(StoreError::Unavailable(format!(
                "write of {} refused",
                change.kind()
            )));
        }
        self.working.apply(change)?;
        self.applied += 1;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ChatStore for MemoryDatabase {
    async fn is_participant(&self, conversation_id: &str, user_id: &str) -> StoreResult<bool> {
        Ok(self
            .state
            .lock()
            .await
            .participants
            .contains(&(conversation_id.to_string(), user_id.to_string())))
    }

    async fn insert_message(&self, message: &ChatMessage) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        insert_once(&mut state.messages, message.id, message, "message")
    }
}
