//! Football period and incident state machine.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::{EngineError, EngineResult};
use super::format::FootballFormat;
use super::settlement::MatchOutcome;
use super::EngineContext;
use crate::models::fixture::{Fixture, MatchStatus, PhaseStatus, Player};
use crate::models::football::{
    FootballRecords, Incident, IncidentKind, Period, PeriodScore, Stat, TeamStats,
};
use crate::models::Change;

const MAX_MINUTE: i32 = 150;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IncidentParams {
    pub kind: IncidentKind,
    #[serde(default)]
    pub minute: i32,
    /// Acting player; the player leaving for substitutions.
    #[serde(default)]
    pub player_id: Option<String>,
    /// Entering player for substitutions, assisting player for goals.
    #[serde(default)]
    pub related_player_id: Option<String>,
}

/// One football scoring action, as submitted over REST or the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FootballAction {
    StartPeriod { period: Period },
    EndPeriod { period: Period },
    Incident(IncidentParams),
    EndMatch,
}

impl FootballAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartPeriod { .. } => "start_period",
            Self::EndPeriod { .. } => "end_period",
            Self::Incident(_) => "incident",
            Self::EndMatch => "end_match",
        }
    }
}

/// Fixed effect of each incident kind on the acting team's match statistics.
pub fn stat_deltas(kind: IncidentKind) -> &'static [(Stat, i32)] {
    use IncidentKind::*;
    match kind {
        Goal | PenaltyScored | ShotOnTarget => &[(Stat::Shots, 1), (Stat::ShotsOnTarget, 1)],
        PenaltyMissed | Shot => &[(Stat::Shots, 1)],
        Save => &[(Stat::Saves, 1)],
        Foul => &[(Stat::Fouls, 1)],
        Corner => &[(Stat::Corners, 1)],
        Offside => &[(Stat::Offsides, 1)],
        YellowCard => &[(Stat::YellowCards, 1)],
        RedCard => &[(Stat::RedCards, 1)],
        ShootoutScored | ShootoutMissed | Substitution => &[],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Dirty {
    Fixture,
    Period(usize),
    Stats(usize),
}

/// Football state for one fixture.
#[derive(Debug, Clone)]
pub struct FootballMatch {
    pub fixture: Fixture,
    pub format: FootballFormat,
    players: HashMap<String, Player>,
    pub periods: Vec<PeriodScore>,
    /// Ordered oldest first.
    pub incidents: Vec<Incident>,
    pub stats: Vec<TeamStats>,
    dirty: BTreeSet<Dirty>,
    appended: Vec<Change>,
}

impl FootballMatch {
    pub fn from_records(records: FootballRecords) -> EngineResult<Self> {
        let format = FootballFormat::from_code(&records.fixture.format)?;
        let mut incidents = records.incidents;
        incidents.sort_by_key(|i| i.id);

        Ok(Self {
            fixture: records.fixture,
            format,
            players: records
                .players
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
            periods: records.periods,
            incidents,
            stats: records.stats,
            dirty: BTreeSet::new(),
            appended: Vec::new(),
        })
    }

    pub fn apply(
        &mut self,
        ctx: &EngineContext<'_>,
        team_id: &str,
        action: &FootballAction,
    ) -> EngineResult<()> {
        match action {
            FootballAction::StartPeriod { period } => self.start_period(team_id, *period),
            FootballAction::EndPeriod { period } => self.end_period(team_id, *period),
            FootballAction::Incident(params) => self.record_incident(ctx, team_id, params),
            FootballAction::EndMatch => self.end_match(team_id),
        }
    }

    pub fn start_period(&mut self, team_id: &str, period: Period) -> EngineResult<()> {
        self.ensure_participant(team_id)?;
        if let Some(current) = self.current_period() {
            return Err(EngineError::transition(format!("{current} is still in progress")));
        }
        if self.period_status(period) != PhaseStatus::NotStarted {
            return Err(EngineError::transition(format!("{period} has already started")));
        }
        if let Some(prev) = period.predecessor() {
            if self.period_status(prev) != PhaseStatus::Completed {
                return Err(EngineError::transition(format!(
                    "{prev} must be completed before {period}"
                )));
            }
        }
        if matches!(period, Period::ExtraTimeFirst | Period::PenaltyShootout) {
            let (home, away) = self.regular_goals();
            if home != away {
                return Err(EngineError::transition(format!(
                    "{period} is only played when scores are level"
                )));
            }
        }
        if period == Period::PenaltyShootout
            && self.period_status(Period::ExtraTimeFirst) != PhaseStatus::NotStarted
            && self.period_status(Period::ExtraTimeSecond) != PhaseStatus::Completed
        {
            return Err(EngineError::transition(
                "extra time must be completed before the shootout",
            ));
        }

        for team in self.fixture.team_ids() {
            let idx = self.period_index(&team, period);
            self.periods[idx].status = PhaseStatus::InProgress;
            self.dirty.insert(Dirty::Period(idx));
        }
        if self.fixture.status == MatchStatus::NotStarted {
            self.fixture.status = MatchStatus::InProgress;
            self.dirty.insert(Dirty::Fixture);
        }
        Ok(())
    }

    pub fn end_period(&mut self, team_id: &str, period: Period) -> EngineResult<()> {
        self.ensure_participant(team_id)?;
        if self.period_status(period) != PhaseStatus::InProgress {
            return Err(EngineError::transition(format!("{period} is not in progress")));
        }
        for (idx, row) in self.periods.iter_mut().enumerate() {
            if row.period == period {
                row.status = PhaseStatus::Completed;
                self.dirty.insert(Dirty::Period(idx));
            }
        }
        Ok(())
    }

    pub fn record_incident(
        &mut self,
        ctx: &EngineContext<'_>,
        team_id: &str,
        params: &IncidentParams,
    ) -> EngineResult<()> {
        self.ensure_participant(team_id)?;
        let period = self
            .current_period()
            .ok_or_else(|| EngineError::transition("no period is in progress"))?;
        let kind = params.kind;

        if !(0..=MAX_MINUTE).contains(&params.minute) {
            return Err(EngineError::InvalidIncident(format!(
                "minute must be between 0 and {MAX_MINUTE}"
            )));
        }
        if period.is_shootout() {
            if !(kind.shootout_only() || matches!(kind, IncidentKind::YellowCard | IncidentKind::RedCard)) {
                return Err(EngineError::InvalidIncident(format!(
                    "{kind} cannot happen during the penalty shootout"
                )));
            }
        } else if kind.shootout_only() {
            return Err(EngineError::InvalidIncident(format!(
                "{kind} is only recorded during the penalty shootout"
            )));
        }

        let needs_player = kind.shootout_only()
            || matches!(
                kind,
                IncidentKind::YellowCard | IncidentKind::RedCard | IncidentKind::Substitution
            );
        if needs_player && params.player_id.is_none() {
            return Err(EngineError::InvalidIncident(format!("{kind} needs a player_id")));
        }
        if let Some(player) = params.player_id.as_deref() {
            self.player_of(player, team_id)?;
            self.ensure_on_pitch(player)?;
        }
        if let Some(related) = params.related_player_id.as_deref() {
            self.player_of(related, team_id)?;
            if params.player_id.as_deref() == Some(related) {
                return Err(EngineError::InvalidIncident(
                    "player_id and related_player_id must differ".into(),
                ));
            }
            self.ensure_on_pitch(related)?;
        }

        if kind == IncidentKind::Substitution {
            let Some(entering) = params.related_player_id.as_deref() else {
                return Err(EngineError::InvalidIncident(
                    "a substitution needs the entering related_player_id".into(),
                ));
            };
            let used = self
                .incidents
                .iter()
                .filter(|i| i.team_id == team_id && i.kind == IncidentKind::Substitution)
                .count() as i32;
            if used >= self.format.max_substitutions {
                return Err(EngineError::transition(format!(
                    "{team_id} has used all {} substitutions",
                    self.format.max_substitutions
                )));
            }
            let came_on = self.incidents.iter().any(|i| {
                i.kind == IncidentKind::Substitution
                    && i.related_player_id.as_deref() == Some(entering)
            });
            if came_on {
                return Err(EngineError::transition(format!("{entering} has already come on")));
            }
        }

        let second_yellow = kind == IncidentKind::YellowCard
            && params
                .player_id
                .as_deref()
                .is_some_and(|p| self.cards(p, IncidentKind::YellowCard) == 1);

        self.push_incident(ctx, team_id, period, params, kind);
        if second_yellow {
            self.push_incident(ctx, team_id, period, params, IncidentKind::RedCard);
        }
        Ok(())
    }

    fn push_incident(
        &mut self,
        ctx: &EngineContext<'_>,
        team_id: &str,
        period: Period,
        params: &IncidentParams,
        kind: IncidentKind,
    ) {
        if kind.scores() {
            let idx = self.period_index(team_id, period);
            self.periods[idx].goals += 1;
            self.dirty.insert(Dirty::Period(idx));
        }
        let deltas = stat_deltas(kind);
        if !deltas.is_empty() {
            let idx = self.stats_index(team_id);
            for (stat, delta) in deltas {
                self.stats[idx].bump(*stat, *delta);
            }
            self.dirty.insert(Dirty::Stats(idx));
        }

        let incident = Incident {
            id: ctx.ids.generate(),
            match_id: self.fixture.id.clone(),
            team_id: team_id.to_string(),
            period,
            minute: params.minute,
            kind,
            player_id: params.player_id.clone(),
            related_player_id: match kind {
                IncidentKind::RedCard if params.kind == IncidentKind::YellowCard => None,
                _ => params.related_player_id.clone(),
            },
            submitted_by: ctx.submitted_by.map(str::to_string),
            created_at: ctx.now,
        };
        self.incidents.push(incident.clone());
        self.appended.push(Change::Incident(incident));
    }

    /// Finishes the match once regular time (and anything after it) is over.
    pub fn end_match(&mut self, team_id: &str) -> EngineResult<()> {
        self.ensure_participant(team_id)?;
        if self.fixture.status != MatchStatus::InProgress {
            return Err(EngineError::transition("the match has not started"));
        }
        if let Some(current) = self.current_period() {
            return Err(EngineError::transition(format!("{current} is still in progress")));
        }
        for half in [Period::FirstHalf, Period::SecondHalf] {
            if self.period_status(half) != PhaseStatus::Completed {
                return Err(EngineError::transition(format!("{half} has not been completed")));
            }
        }

        let home_id = self.fixture.home_team_id.clone();
        let away_id = self.fixture.away_team_id.clone();
        let (home, away) = self.regular_goals();
        let shootout = (
            self.goals_in(&home_id, Period::PenaltyShootout),
            self.goals_in(&away_id, Period::PenaltyShootout),
        );
        let shootout_played = self.period_status(Period::PenaltyShootout) == PhaseStatus::Completed;

        let (winner, result) = if home != away {
            let (winner, high, low) = if home > away {
                (home_id, home, away)
            } else {
                (away_id, away, home)
            };
            let result = format!("{winner} won {high}-{low}");
            (Some(winner), result)
        } else if shootout_played && shootout.0 != shootout.1 {
            let (winner, high, low) = if shootout.0 > shootout.1 {
                (home_id, shootout.0, shootout.1)
            } else {
                (away_id, shootout.1, shootout.0)
            };
            let result = format!("{winner} won {high}-{low} on penalties ({home}-{away})");
            (Some(winner), result)
        } else {
            (None, format!("Match drawn {home}-{away}"))
        };

        self.fixture.status = MatchStatus::Finished;
        self.fixture.winner_team_id = winner;
        self.fixture.result = Some(result);
        self.dirty.insert(Dirty::Fixture);
        Ok(())
    }

    pub fn current_period(&self) -> Option<Period> {
        Period::ALL
            .into_iter()
            .find(|p| self.period_status(*p) == PhaseStatus::InProgress)
    }

    fn period_status(&self, period: Period) -> PhaseStatus {
        self.periods
            .iter()
            .find(|row| row.period == period)
            .map_or(PhaseStatus::NotStarted, |row| row.status)
    }

    fn goals_in(&self, team_id: &str, period: Period) -> i32 {
        self.periods
            .iter()
            .filter(|row| row.team_id == team_id && row.period == period)
            .map(|row| row.goals)
            .sum()
    }

    /// Goals outside the shootout, as `(home, away)`.
    pub fn regular_goals(&self) -> (i32, i32) {
        let total = |team: &str| -> i32 {
            self.periods
                .iter()
                .filter(|row| row.team_id == team && !row.period.is_shootout())
                .map(|row| row.goals)
                .sum()
        };
        (total(&self.fixture.home_team_id), total(&self.fixture.away_team_id))
    }

    fn cards(&self, player_id: &str, kind: IncidentKind) -> usize {
        self.incidents
            .iter()
            .filter(|i| i.kind == kind && i.player_id.as_deref() == Some(player_id))
            .count()
    }

    fn sent_off(&self, player_id: &str) -> bool {
        self.cards(player_id, IncidentKind::RedCard) > 0
            || self.cards(player_id, IncidentKind::YellowCard) >= 2
    }

    fn substituted_off(&self, player_id: &str) -> bool {
        self.cards(player_id, IncidentKind::Substitution) > 0
    }

    /// Players who left the field take no further part in the match.
    fn ensure_on_pitch(&self, player_id: &str) -> EngineResult<()> {
        if self.sent_off(player_id) {
            return Err(EngineError::transition(format!("{player_id} has been sent off")));
        }
        if self.substituted_off(player_id) {
            return Err(EngineError::transition(format!(
                "{player_id} has been substituted off"
            )));
        }
        Ok(())
    }

    fn ensure_participant(&self, team_id: &str) -> EngineResult<()> {
        if self.fixture.status == MatchStatus::Finished {
            return Err(EngineError::MatchFinished);
        }
        if !self.fixture.involves(team_id) {
            return Err(EngineError::UnknownTeam(team_id.to_string()));
        }
        Ok(())
    }

    fn player_of(&self, player_id: &str, team_id: &str) -> EngineResult<&Player> {
        self.players
            .get(player_id)
            .filter(|p| p.team_id == team_id)
            .ok_or_else(|| EngineError::UnknownPlayer(player_id.to_string()))
    }

    fn period_index(&mut self, team_id: &str, period: Period) -> usize {
        if let Some(i) = self
            .periods
            .iter()
            .position(|row| row.team_id == team_id && row.period == period)
        {
            return i;
        }
        self.periods.push(PeriodScore {
            match_id: self.fixture.id.clone(),
            team_id: team_id.to_string(),
            period,
            goals: 0,
            status: PhaseStatus::NotStarted,
        });
        self.periods.len() - 1
    }

    fn stats_index(&mut self, team_id: &str) -> usize {
        if let Some(i) = self.stats.iter().position(|s| s.team_id == team_id) {
            return i;
        }
        self.stats.push(TeamStats::new(&self.fixture.id, team_id));
        self.stats.len() - 1
    }

    pub fn outcome(&self) -> Option<MatchOutcome> {
        if self.fixture.status != MatchStatus::Finished {
            return None;
        }
        let (home_score, away_score) = self.regular_goals();
        Some(MatchOutcome {
            winner_team_id: self.fixture.winner_team_id.clone(),
            home_score,
            away_score,
        })
    }

    /// Drains the writes accumulated so far, parents before children.
    pub fn take_changes(&mut self) -> Vec<Change> {
        let mut changes = Vec::with_capacity(self.dirty.len() + self.appended.len());
        for dirty in std::mem::take(&mut self.dirty) {
            changes.push(match dirty {
                Dirty::Fixture => Change::Fixture(self.fixture.clone()),
                Dirty::Period(i) => Change::Period(self.periods[i].clone()),
                Dirty::Stats(i) => Change::Stats(self.stats[i].clone()),
            });
        }
        changes.append(&mut self.appended);
        changes
    }

    pub fn public_result(&self) -> FootballScoreUpdate {
        let line = |team_id: &str| TeamLine {
            team_id: team_id.to_string(),
            goals: self
                .periods
                .iter()
                .filter(|row| row.team_id == team_id && !row.period.is_shootout())
                .map(|row| row.goals)
                .sum(),
            shootout_goals: self.goals_in(team_id, Period::PenaltyShootout),
            stats: self
                .stats
                .iter()
                .find(|s| s.team_id == team_id)
                .cloned()
                .unwrap_or_else(|| TeamStats::new(&self.fixture.id, team_id)),
        };
        let periods = Period::ALL
            .into_iter()
            .filter(|p| self.period_status(*p) != PhaseStatus::NotStarted)
            .map(|period| PeriodLine {
                period,
                status: self.period_status(period),
                home_goals: self.goals_in(&self.fixture.home_team_id, period),
                away_goals: self.goals_in(&self.fixture.away_team_id, period),
            })
            .collect();

        FootballScoreUpdate {
            match_id: self.fixture.id.clone(),
            status: self.fixture.status,
            current_period: self.current_period(),
            home: line(&self.fixture.home_team_id),
            away: line(&self.fixture.away_team_id),
            periods,
            last_incident: self.incidents.last().cloned(),
            winner_team_id: self.fixture.winner_team_id.clone(),
            result: self.fixture.result.clone(),
            submitted_by: None,
        }
    }
}

/// Public view of a football match after an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FootballScoreUpdate {
    pub match_id: String,
    pub status: MatchStatus,
    pub current_period: Option<Period>,
    pub home: TeamLine,
    pub away: TeamLine,
    pub periods: Vec<PeriodLine>,
    pub last_incident: Option<Incident>,
    pub winner_team_id: Option<String>,
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TeamLine {
    pub team_id: String,
    /// Goals outside the shootout.
    pub goals: i32,
    pub shootout_goals: i32,
    pub stats: TeamStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PeriodLine {
    pub period: Period,
    pub status: PhaseStatus,
    pub home_goals: i32,
    pub away_goals: i32,
}
