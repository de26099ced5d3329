//! Runs each scoring event inside one persistence transaction.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use scoreline_common::SnowflakeGenerator;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use utoipa::ToSchema;

use super::event::ScoreEvent;
use super::ScoringError;
use crate::engine::cricket::{CricketMatch, CricketScoreUpdate};
use crate::engine::football::{FootballMatch, FootballScoreUpdate};
use crate::engine::settlement::{self, MatchOutcome};
use crate::engine::{EngineContext, EngineError};
use crate::hub::{Category, EventName, HubEvent, Topic};
use crate::models::cricket::CricketRecords;
use crate::models::fixture::{Fixture, Sport};
use crate::models::football::FootballRecords;
use crate::models::standing::Standing;
use crate::models::Change;
use crate::store::{MatchStore, MatchTx};

/// Public result of a committed event.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum ScoreUpdate {
    Cricket(CricketScoreUpdate),
    Football(FootballScoreUpdate),
}

impl ScoreUpdate {
    pub fn match_id(&self) -> &str {
        match self {
            ScoreUpdate::Cricket(u) => &u.match_id,
            ScoreUpdate::Football(u) => &u.match_id,
        }
    }

    /// Names the user whose event produced this update.
    pub fn attributed(mut self, submitted_by: Option<&str>) -> Self {
        let by = submitted_by.map(str::to_string);
        match &mut self {
            ScoreUpdate::Cricket(u) => u.submitted_by = by,
            ScoreUpdate::Football(u) => u.submitted_by = by,
        }
        self
    }

    pub fn hub_event(&self) -> Result<HubEvent, serde_json::Error> {
        let (category, event_type) = match self {
            ScoreUpdate::Cricket(_) => (Category::Cricket, EventName::CRICKET_SCORE_UPDATED),
            ScoreUpdate::Football(_) => (Category::Football, EventName::FOOTBALL_SCORE_UPDATED),
        };
        Ok(HubEvent::new(
            category,
            event_type,
            Some(Topic::fixture(self.match_id())),
            serde_json::to_value(self)?,
        ))
    }
}

/// A tournament table after a settlement.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StandingsUpdate {
    pub tournament_id: String,
    pub match_id: String,
    pub table: Vec<Standing>,
}

impl StandingsUpdate {
    pub fn hub_event(&self) -> Result<HubEvent, serde_json::Error> {
        Ok(HubEvent::new(
            Category::Tournament,
            EventName::STANDINGS_UPDATED,
            Some(Topic::tournament(&self.tournament_id)),
            serde_json::to_value(self)?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Outcome {
    pub update: ScoreUpdate,
    /// Present when the event finished a tournament match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standings: Option<StandingsUpdate>,
}

impl Outcome {
    /// Hub events to publish, score first.
    pub fn events(&self) -> Result<Vec<HubEvent>, serde_json::Error> {
        let mut events = vec![self.update.hub_event()?];
        if let Some(standings) = &self.standings {
            events.push(standings.hub_event()?);
        }
        Ok(events)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SettleReport {
    pub match_id: String,
    /// False when the match had already been settled.
    pub settled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standings: Option<StandingsUpdate>,
}

enum Game {
    Cricket(CricketMatch),
    Football(FootballMatch),
}

impl Game {
    fn fixture(&self) -> &Fixture {
        match self {
            Game::Cricket(g) => &g.fixture,
            Game::Football(g) => &g.fixture,
        }
    }

    fn outcome(&self) -> Option<MatchOutcome> {
        match self {
            Game::Cricket(g) => g.outcome(),
            Game::Football(g) => g.outcome(),
        }
    }

    fn public_result(&self) -> ScoreUpdate {
        match self {
            Game::Cricket(g) => ScoreUpdate::Cricket(g.public_result()),
            Game::Football(g) => ScoreUpdate::Football(g.public_result()),
        }
    }

    fn take_changes(&mut self) -> Vec<Change> {
        match self {
            Game::Cricket(g) => g.take_changes(),
            Game::Football(g) => g.take_changes(),
        }
    }

    fn apply(&mut self, ctx: &EngineContext<'_>, event: &ScoreEvent) -> Result<(), EngineError> {
        match (self, event) {
            (Game::Cricket(g), ScoreEvent::Cricket { team_id, actions, .. }) => {
                for action in actions {
                    g.apply(ctx, team_id, action)?;
                }
                Ok(())
            }
            (Game::Football(g), ScoreEvent::Football { team_id, actions, .. }) => {
                for action in actions {
                    g.apply(ctx, team_id, action)?;
                }
                Ok(())
            }
            _ => Err(EngineError::transition("event sport does not match the fixture")),
        }
    }
}

type Turns = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Holds one match's turn. The map entry goes away with the last holder.
pub struct MatchTurn {
    guard: Option<OwnedMutexGuard<()>>,
    turns: Turns,
    match_id: String,
}

impl Drop for MatchTurn {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of one means nobody is queued.
        self.turns
            .remove_if(&self.match_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

pub struct Coordinator {
    store: Arc<dyn MatchStore>,
    ids: Arc<SnowflakeGenerator>,
    turns: Turns,
}

impl Coordinator {
    pub fn new(store: Arc<dyn MatchStore>, ids: Arc<SnowflakeGenerator>) -> Self {
        Self {
            store,
            ids,
            turns: Arc::new(DashMap::new()),
        }
    }

    /// Serializes commit-then-publish for one match inside this process, so
    /// subscribers see its updates in commit order.
    pub async fn turn(&self, match_id: &str) -> MatchTurn {
        let lock = self
            .turns
            .entry(match_id.to_string())
            .or_default()
            .clone();
        MatchTurn {
            guard: Some(lock.lock_owned().await),
            turns: self.turns.clone(),
            match_id: match_id.to_string(),
        }
    }

    /// Applies one event atomically. On any failure nothing is written and
    /// the error is returned as is.
    pub async fn submit(&self, event: &ScoreEvent) -> Result<Outcome, ScoringError> {
        event.validate()?;
        let match_id = event.match_id();
        let mut tx = self.store.begin().await?;

        match self.run(tx.as_mut(), event).await {
            Ok(outcome) => {
                tx.commit().await.inspect_err(|e| {
                    tracing::error!(match_id = %match_id, error = %e, "scoring commit failed");
                })?;
                tracing::debug!(
                    match_id = %match_id,
                    actions = event.action_count(),
                    "scoring event committed"
                );
                Ok(outcome)
            }
            Err(err) => {
                if let Err(e) = tx.rollback().await {
                    tracing::error!(match_id = %match_id, error = %e, "rollback failed");
                }
                log_rejection(match_id, &err);
                Err(err)
            }
        }
    }

    /// Settles a finished match if that has not happened yet.
    pub async fn settle(&self, match_id: &str) -> Result<SettleReport, ScoringError> {
        let mut tx = self.store.begin().await?;
        match self.run_settle(tx.as_mut(), match_id).await {
            Ok(report) if report.settled => {
                tx.commit().await?;
                Ok(report)
            }
            Ok(report) => {
                tx.rollback().await?;
                Ok(report)
            }
            Err(err) => {
                if let Err(e) = tx.rollback().await {
                    tracing::error!(match_id = %match_id, error = %e, "rollback failed");
                }
                log_rejection(match_id, &err);
                Err(err)
            }
        }
    }

    /// Current public result, read without writing anything.
    pub async fn snapshot(&self, match_id: &str) -> Result<ScoreUpdate, ScoringError> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let fixture = tx
                .fixture(match_id)
                .await?
                .ok_or_else(|| ScoringError::NotFound(match_id.to_string()))?;
            let game = load(tx.as_mut(), fixture).await?;
            Ok::<_, ScoringError>(game.public_result())
        }
        .await;
        tx.rollback().await?;
        result
    }

    async fn run(&self, tx: &mut dyn MatchTx, event: &ScoreEvent) -> Result<Outcome, ScoringError> {
        let fixture = lock(tx, event.match_id()).await?;
        if fixture.sport != event.sport() {
            return Err(ScoringError::validation(
                "sport",
                format!("match {} is a {} match", fixture.id, fixture.sport),
            ));
        }

        let ctx = EngineContext {
            ids: &self.ids,
            now: Utc::now(),
            submitted_by: event.submitted_by(),
        };
        let mut game = load(tx, fixture).await?;
        game.apply(&ctx, event)?;
        let mut changes = game.take_changes();

        let mut standings = None;
        if let Some(outcome) = game.outcome() {
            if let Some((settlement_changes, update)) =
                settle_in(tx, game.fixture(), &outcome, &ctx).await?
            {
                changes.extend(settlement_changes);
                standings = update;
            }
        }

        for change in &changes {
            tx.apply(change).await?;
        }

        Ok(Outcome {
            update: game.public_result().attributed(event.submitted_by()),
            standings,
        })
    }

    async fn run_settle(&self, tx: &mut dyn MatchTx, match_id: &str) -> Result<SettleReport, ScoringError> {
        let fixture = lock(tx, match_id).await?;
        let game = load(tx, fixture).await?;
        let outcome = game.outcome().ok_or(EngineError::MatchNotFinished)?;
        let ctx = EngineContext {
            ids: &self.ids,
            now: Utc::now(),
            submitted_by: None,
        };

        match settle_in(tx, game.fixture(), &outcome, &ctx).await? {
            Some((changes, standings)) => {
                for change in &changes {
                    tx.apply(change).await?;
                }
                Ok(SettleReport {
                    match_id: match_id.to_string(),
                    settled: true,
                    standings,
                })
            }
            None => Ok(SettleReport {
                match_id: match_id.to_string(),
                settled: false,
                standings: None,
            }),
        }
    }
}

async fn lock(tx: &mut dyn MatchTx, match_id: &str) -> Result<Fixture, ScoringError> {
    tx.lock_fixture(match_id)
        .await?
        .ok_or_else(|| ScoringError::NotFound(match_id.to_string()))
}

async fn load(tx: &mut dyn MatchTx, fixture: Fixture) -> Result<Game, ScoringError> {
    let players = tx.players(&fixture.team_ids()).await?;
    match fixture.sport {
        Sport::Cricket => {
            let innings = tx.innings(&fixture.id).await?;
            let batters = tx.batters(&fixture.id).await?;
            let bowlers = tx.bowlers(&fixture.id).await?;
            let last_ball = match innings.iter().max_by_key(|i| i.number) {
                Some(current) => tx.last_ball(&current.id).await?,
                None => None,
            };
            let records = CricketRecords {
                fixture,
                players,
                innings,
                batters,
                bowlers,
                last_ball,
            };
            Ok(Game::Cricket(CricketMatch::from_records(records)?))
        }
        Sport::Football => {
            let periods = tx.periods(&fixture.id).await?;
            let incidents = tx.incidents(&fixture.id).await?;
            let stats = tx.stats(&fixture.id).await?;
            let records = FootballRecords {
                fixture,
                players,
                periods,
                incidents,
                stats,
            };
            Ok(Game::Football(FootballMatch::from_records(records)?))
        }
    }
}

/// Settlement inside the open transaction. `None` when already settled.
async fn settle_in(
    tx: &mut dyn MatchTx,
    fixture: &Fixture,
    outcome: &MatchOutcome,
    ctx: &EngineContext<'_>,
) -> Result<Option<(Vec<Change>, Option<StandingsUpdate>)>, ScoringError> {
    let table = match &fixture.tournament_id {
        Some(tournament_id) => tx.standings(tournament_id).await?,
        None => Vec::new(),
    };
    let Some(settlement) = settlement::settle(fixture, outcome, &table, ctx.now)? else {
        return Ok(None);
    };

    tracing::info!(
        match_id = %fixture.id,
        winner = outcome.winner_team_id.as_deref().unwrap_or("none"),
        home_score = outcome.home_score,
        away_score = outcome.away_score,
        "settlement applied"
    );

    let standings = fixture.tournament_id.as_ref().map(|tournament_id| StandingsUpdate {
        tournament_id: tournament_id.clone(),
        match_id: fixture.id.clone(),
        table: settlement.table,
    });
    Ok(Some((settlement.changes, standings)))
}

fn log_rejection(match_id: &str, err: &ScoringError) {
    match err {
        ScoringError::Store(e) => {
            tracing::error!(match_id = %match_id, error = %e, "scoring event rolled back");
        }
        other => {
            tracing::info!(match_id = %match_id, error = %other, "scoring event rejected");
        }
    }
}
