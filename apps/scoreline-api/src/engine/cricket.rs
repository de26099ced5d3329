//! Ball-by-ball cricket state machine.
//!
//! A [`CricketMatch`] is loaded from the rows read inside the scoring
//! transaction, advanced in place by one or more actions, and then turned
//! into the list of [`Change`]s the coordinator writes back. Every operation
//! validates before it mutates, so a rejected action leaves the snapshot as
//! it was.

use std::collections::{BTreeSet, HashMap};

use scoreline_common::PrefixedId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::error::{EngineError, EngineResult};
use super::format::CricketFormat;
use super::settlement::MatchOutcome;
use super::EngineContext;
use crate::models::cricket::{
    overs_notation, Ball, BatterInnings, BowlerSpell, CricketRecords, DeliveryKind, Innings,
    Wicket, WicketKind, BALLS_PER_OVER,
};
use crate::models::fixture::{Fixture, MatchStatus, PhaseStatus, Player, TossDecision};
use crate::models::Change;

/// Runs any single component of a delivery may carry (off the bat, byes, wides).
const MAX_RUNS_PER_DELIVERY: i32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CreaseEnd {
    Striker,
    NonStriker,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BallParams {
    pub bowler_id: String,
    #[serde(default)]
    pub runs: i32,
    #[serde(default)]
    pub boundary: bool,
    #[serde(default)]
    pub byes: i32,
    #[serde(default)]
    pub leg_byes: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WideParams {
    pub bowler_id: String,
    /// Runs taken on top of the one-run penalty.
    #[serde(default)]
    pub runs: i32,
    #[serde(default)]
    pub boundary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NoBallParams {
    pub bowler_id: String,
    /// Runs off the bat, on top of the one-run penalty.
    #[serde(default)]
    pub runs: i32,
    #[serde(default)]
    pub boundary: bool,
    #[serde(default)]
    pub byes: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WicketParams {
    pub bowler_id: String,
    pub kind: WicketKind,
    /// Defaults to the striker.
    #[serde(default)]
    pub batter_id: Option<String>,
    #[serde(default)]
    pub fielder_id: Option<String>,
    /// Runs completed before the dismissal.
    #[serde(default)]
    pub runs: i32,
    /// Defaults to a regular delivery.
    #[serde(default)]
    pub delivery: Option<DeliveryKind>,
}

/// One cricket scoring action, as submitted over REST or the socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CricketAction {
    Toss {
        decision: TossDecision,
    },
    BatterIn {
        player_id: String,
        #[serde(default)]
        end: Option<CreaseEnd>,
    },
    ChangeBowler {
        player_id: String,
    },
    Ball(BallParams),
    Wide(WideParams),
    NoBall(NoBallParams),
    Wicket(WicketParams),
    EndInnings {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl CricketAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Toss { .. } => "toss",
            Self::BatterIn { .. } => "batter_in",
            Self::ChangeBowler { .. } => "change_bowler",
            Self::Ball(_) => "ball",
            Self::Wide(_) => "wide",
            Self::NoBall(_) => "no_ball",
            Self::Wicket(_) => "wicket",
            Self::EndInnings { .. } => "end_innings",
        }
    }
}

struct Dismissal {
    kind: WicketKind,
    batter_id: Option<String>,
    fielder_id: Option<String>,
}

/// A delivery of any kind, normalized.
struct Delivery {
    bowler_id: String,
    kind: DeliveryKind,
    runs_off_bat: i32,
    boundary: bool,
    byes: i32,
    leg_byes: i32,
    /// Wide runs beyond the penalty.
    wide_runs: i32,
    dismissal: Option<Dismissal>,
}

impl Delivery {
    fn penalty(&self) -> i32 {
        match self.kind {
            DeliveryKind::Regular => 0,
            DeliveryKind::Wide | DeliveryKind::NoBall => 1,
        }
    }

    fn wide_extras(&self) -> i32 {
        match self.kind {
            DeliveryKind::Wide => self.penalty() + self.wide_runs,
            _ => 0,
        }
    }

    fn no_ball_extras(&self) -> i32 {
        match self.kind {
            DeliveryKind::NoBall => self.penalty(),
            _ => 0,
        }
    }

    fn extras(&self) -> i32 {
        self.wide_extras() + self.no_ball_extras() + self.byes + self.leg_byes
    }

    fn total(&self) -> i32 {
        self.runs_off_bat + self.extras()
    }

    /// Runs physically completed between the wickets. Boundaries are not run.
    fn running(&self) -> i32 {
        if self.boundary {
            0
        } else {
            self.runs_off_bat + self.byes + self.leg_byes + self.wide_runs
        }
    }

    fn validate(&self) -> EngineResult<()> {
        let parts = [self.runs_off_bat, self.byes, self.leg_byes, self.wide_runs];
        if parts.iter().any(|r| !(0..=MAX_RUNS_PER_DELIVERY).contains(r)) {
            return Err(EngineError::InvalidDelivery(format!(
                "runs must be between 0 and {MAX_RUNS_PER_DELIVERY}"
            )));
        }
        if self.byes > 0 && self.leg_byes > 0 {
            return Err(EngineError::InvalidDelivery(
                "a delivery cannot carry both byes and leg-byes".into(),
            ));
        }
        if self.kind == DeliveryKind::Wide && self.runs_off_bat + self.byes + self.leg_byes > 0 {
            return Err(EngineError::InvalidDelivery(
                "a wide cannot be hit or carry byes".into(),
            ));
        }
        if self.kind == DeliveryKind::NoBall && self.leg_byes > 0 {
            return Err(EngineError::InvalidDelivery(
                "leg-byes are not scored on a no-ball".into(),
            ));
        }
        if self.boundary {
            let scored = self.runs_off_bat + self.byes + self.leg_byes + self.wide_runs;
            let six_off_bat = self.runs_off_bat == 6;
            if !(scored == 4 || (six_off_bat && scored == 6)) {
                return Err(EngineError::InvalidDelivery(
                    "a boundary scores four, or six off the bat".into(),
                ));
            }
        }
        if let Some(dismissal) = &self.dismissal {
            if !dismissal.kind.allowed_on(self.kind) {
                return Err(EngineError::InvalidDelivery(format!(
                    "{} is not possible on a {} delivery",
                    dismissal.kind, self.kind
                )));
            }
            if self.boundary {
                return Err(EngineError::InvalidDelivery(
                    "a boundary cannot also be a dismissal".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Dirty {
    Fixture,
    Innings(usize),
    Batter(usize),
    Bowler(usize),
}

/// Cricket state for one fixture.
#[derive(Debug, Clone)]
pub struct CricketMatch {
    pub fixture: Fixture,
    pub format: CricketFormat,
    players: HashMap<String, Player>,
    /// Ordered by innings number; the last entry is the current innings.
    pub innings: Vec<Innings>,
    pub batters: Vec<BatterInnings>,
    pub bowlers: Vec<BowlerSpell>,
    pub last_ball: Option<Ball>,
    dirty: BTreeSet<Dirty>,
    appended: Vec<Change>,
}

impl CricketMatch {
    pub fn from_records(records: CricketRecords) -> EngineResult<Self> {
        let format = CricketFormat::from_code(&records.fixture.format)?;
        let mut innings = records.innings;
        innings.sort_by_key(|i| i.number);
        let mut batters = records.batters;
        batters.sort_by(|a, b| (&a.innings_id, a.position).cmp(&(&b.innings_id, b.position)));

        Ok(Self {
            fixture: records.fixture,
            format,
            players: records
                .players
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
            innings,
            batters,
            bowlers: records.bowlers,
            last_ball: records.last_ball,
            dirty: BTreeSet::new(),
            appended: Vec::new(),
        })
    }

    pub fn apply(
        &mut self,
        ctx: &EngineContext<'_>,
        team_id: &str,
        action: &CricketAction,
    ) -> EngineResult<()> {
        match action {
            CricketAction::Toss { decision } => self.toss(team_id, *decision),
            CricketAction::BatterIn { player_id, end } => self.batter_in(team_id, player_id, *end),
            CricketAction::ChangeBowler { player_id } => self.change_bowler(team_id, player_id),
            CricketAction::Ball(params) => self.regular_ball(ctx, team_id, params),
            CricketAction::Wide(params) => self.wide(ctx, team_id, params),
            CricketAction::NoBall(params) => self.no_ball(ctx, team_id, params),
            CricketAction::Wicket(params) => self.wicket(ctx, team_id, params),
            CricketAction::EndInnings { reason } => {
                self.end_innings(team_id)?;
                tracing::info!(
                    match_id = %self.fixture.id,
                    reason = reason.as_deref().unwrap_or("declared"),
                    "innings closed early"
                );
                Ok(())
            }
        }
    }

    /// Records the toss and opens the first innings.
    pub fn toss(&mut self, team_id: &str, decision: TossDecision) -> EngineResult<()> {
        self.ensure_live()?;
        let opponent = self
            .fixture
            .opponent_of(team_id)
            .ok_or_else(|| EngineError::UnknownTeam(team_id.to_string()))?
            .to_string();
        if self.fixture.status != MatchStatus::NotStarted || !self.innings.is_empty() {
            return Err(EngineError::transition("the toss has already been taken"));
        }

        let (batting, bowling) = match decision {
            TossDecision::Bat => (team_id.to_string(), opponent),
            TossDecision::Bowl => (opponent, team_id.to_string()),
        };
        self.fixture.status = MatchStatus::InProgress;
        self.fixture.toss_winner_id = Some(team_id.to_string());
        self.fixture.toss_decision = Some(decision);
        self.dirty.insert(Dirty::Fixture);

        let first = Innings::new(Innings::generate(), self.fixture.id.clone(), 1, batting, bowling);
        self.innings.push(first);
        self.dirty.insert(Dirty::Innings(self.innings.len() - 1));
        Ok(())
    }

    /// Sends a batter to a vacant end; defaults to the striker's end when free.
    pub fn batter_in(
        &mut self,
        team_id: &str,
        player_id: &str,
        end: Option<CreaseEnd>,
    ) -> EngineResult<()> {
        let idx = self.open_innings(team_id)?;
        let innings = &self.innings[idx];
        if innings.wickets >= self.format.max_wickets {
            return Err(EngineError::WicketLimitReached(self.format.max_wickets));
        }
        self.player_of(player_id, &innings.batting_team_id)?;
        let innings_id = innings.id.clone();

        if self
            .batters
            .iter()
            .any(|b| b.innings_id == innings_id && b.player_id == player_id)
        {
            return Err(EngineError::transition(format!(
                "{player_id} has already batted in this innings"
            )));
        }

        let striker_free = self.batter_at(&innings_id, true).is_none();
        let non_striker_free = self.batter_at(&innings_id, false).is_none();
        let on_strike = match end {
            Some(CreaseEnd::Striker) if striker_free => true,
            Some(CreaseEnd::NonStriker) if non_striker_free => false,
            Some(end) => {
                return Err(EngineError::transition(format!(
                    "the {} end is occupied",
                    match end {
                        CreaseEnd::Striker => "striker's",
                        CreaseEnd::NonStriker => "non-striker's",
                    }
                )))
            }
            None if striker_free => true,
            None if non_striker_free => false,
            None => return Err(EngineError::transition("both ends are occupied")),
        };

        let position = self
            .batters
            .iter()
            .filter(|b| b.innings_id == innings_id)
            .count() as i32
            + 1;
        self.batters.push(BatterInnings {
            innings_id,
            player_id: player_id.to_string(),
            match_id: self.fixture.id.clone(),
            position,
            runs: 0,
            balls_faced: 0,
            fours: 0,
            sixes: 0,
            at_crease: true,
            on_strike,
            dismissed: false,
        });
        self.dirty.insert(Dirty::Batter(self.batters.len() - 1));
        Ok(())
    }

    /// Hands the ball to a bowler. Only allowed before a ball of the over has been bowled.
    pub fn change_bowler(&mut self, team_id: &str, player_id: &str) -> EngineResult<()> {
        let idx = self.open_innings(team_id)?;
        let innings = &self.innings[idx];
        self.player_of(player_id, &innings.bowling_team_id)?;
        let innings_id = innings.id.clone();

        let current = self.current_bowler(&innings_id);
        if let Some(cur) = current {
            let cur_id = &self.bowlers[cur].player_id;
            let mid_over = self
                .last_ball
                .as_ref()
                .is_some_and(|b| b.innings_id == innings_id && &b.bowler_id == cur_id);
            if mid_over {
                return Err(EngineError::transition(
                    "the bowler can only be changed at the end of an over",
                ));
            }
            if cur_id == player_id {
                return Ok(());
            }
        }
        if innings.previous_over_bowler_id.as_deref() == Some(player_id) {
            return Err(EngineError::transition(format!(
                "{player_id} bowled the previous over"
            )));
        }
        if let Some(max) = self.format.max_overs_per_bowler {
            let bowled = self
                .bowlers
                .iter()
                .find(|s| s.innings_id == innings_id && s.player_id == player_id)
                .map_or(0, |s| s.balls);
            if bowled >= max * BALLS_PER_OVER {
                return Err(EngineError::transition(format!(
                    "{player_id} has bowled the maximum of {max} overs"
                )));
            }
        }

        if let Some(cur) = current {
            self.bowlers[cur].is_current = false;
            self.dirty.insert(Dirty::Bowler(cur));
        }
        let spell = self.spell_index(&innings_id, player_id);
        self.bowlers[spell].is_current = true;
        self.bowlers[spell].over_runs = 0;
        self.dirty.insert(Dirty::Bowler(spell));
        Ok(())
    }

    pub fn regular_ball(
        &mut self,
        ctx: &EngineContext<'_>,
        team_id: &str,
        params: &BallParams,
    ) -> EngineResult<()> {
        self.deliver(
            ctx,
            team_id,
            Delivery {
                bowler_id: params.bowler_id.clone(),
                kind: DeliveryKind::Regular,
                runs_off_bat: params.runs,
                boundary: params.boundary,
                byes: params.byes,
                leg_byes: params.leg_byes,
                wide_runs: 0,
                dismissal: None,
            },
        )
    }

    pub fn wide(
        &mut self,
        ctx: &EngineContext<'_>,
        team_id: &str,
        params: &WideParams,
    ) -> EngineResult<()> {
        self.deliver(
            ctx,
            team_id,
            Delivery {
                bowler_id: params.bowler_id.clone(),
                kind: DeliveryKind::Wide,
                runs_off_bat: 0,
                boundary: params.boundary,
                byes: 0,
                leg_byes: 0,
                wide_runs: params.runs,
                dismissal: None,
            },
        )
    }

    pub fn no_ball(
        &mut self,
        ctx: &EngineContext<'_>,
        team_id: &str,
        params: &NoBallParams,
    ) -> EngineResult<()> {
        self.deliver(
            ctx,
            team_id,
            Delivery {
                bowler_id: params.bowler_id.clone(),
                kind: DeliveryKind::NoBall,
                runs_off_bat: params.runs,
                boundary: params.boundary,
                byes: params.byes,
                leg_byes: 0,
                wide_runs: 0,
                dismissal: None,
            },
        )
    }

    pub fn wicket(
        &mut self,
        ctx: &EngineContext<'_>,
        team_id: &str,
        params: &WicketParams,
    ) -> EngineResult<()> {
        let kind = params.delivery.unwrap_or(DeliveryKind::Regular);
        let (runs_off_bat, wide_runs) = match kind {
            DeliveryKind::Wide => (0, params.runs),
            _ => (params.runs, 0),
        };
        self.deliver(
            ctx,
            team_id,
            Delivery {
                bowler_id: params.bowler_id.clone(),
                kind,
                runs_off_bat,
                boundary: false,
                byes: 0,
                leg_byes: 0,
                wide_runs,
                dismissal: Some(Dismissal {
                    kind: params.kind,
                    batter_id: params.batter_id.clone(),
                    fielder_id: params.fielder_id.clone(),
                }),
            },
        )
    }

    /// Closes the current innings early (declaration, weather).
    pub fn end_innings(&mut self, team_id: &str) -> EngineResult<()> {
        let idx = self.open_innings(team_id)?;
        self.complete_innings(idx);
        Ok(())
    }

    fn deliver(
        &mut self,
        ctx: &EngineContext<'_>,
        team_id: &str,
        delivery: Delivery,
    ) -> EngineResult<()> {
        let idx = self.open_innings(team_id)?;
        delivery.validate()?;

        let innings_id = self.innings[idx].id.clone();
        let bowling_team = self.innings[idx].bowling_team_id.clone();
        if self.innings[idx].wickets >= self.format.max_wickets {
            return Err(EngineError::WicketLimitReached(self.format.max_wickets));
        }
        let striker = self
            .batter_at(&innings_id, true)
            .ok_or_else(|| EngineError::transition("no batter on strike"))?;
        let non_striker = self
            .batter_at(&innings_id, false)
            .ok_or_else(|| EngineError::transition("no batter at the non-striker's end"))?;
        let bowler = self
            .current_bowler(&innings_id)
            .ok_or_else(|| EngineError::transition("no bowler has been given the ball"))?;
        if self.bowlers[bowler].player_id != delivery.bowler_id {
            return Err(EngineError::transition(format!(
                "{} is not the current bowler",
                delivery.bowler_id
            )));
        }

        let out = match &delivery.dismissal {
            None => None,
            Some(dismissal) => {
                let batter = match dismissal.batter_id.as_deref() {
                    None => striker,
                    Some(id) if self.batters[striker].player_id == id => striker,
                    Some(id) if self.batters[non_striker].player_id == id => non_striker,
                    Some(id) => return Err(EngineError::UnknownPlayer(id.to_string())),
                };
                if batter == non_striker && dismissal.kind != WicketKind::RunOut {
                    return Err(EngineError::InvalidDelivery(
                        "only a run out can dismiss the non-striker".into(),
                    ));
                }
                if let Some(fielder) = dismissal.fielder_id.as_deref() {
                    self.player_of(fielder, &bowling_team)?;
                }
                Some(batter)
            }
        };

        let counts = match delivery.kind {
            DeliveryKind::Regular => true,
            DeliveryKind::Wide => self.format.wide_counts_toward_over,
            DeliveryKind::NoBall => false,
        };
        let total = delivery.total();
        let balls_before = self.innings[idx].balls;

        let innings = &mut self.innings[idx];
        if innings.status == PhaseStatus::NotStarted {
            innings.status = PhaseStatus::InProgress;
        }
        innings.deliveries += 1;
        innings.runs += total;
        innings.wides += delivery.wide_extras();
        innings.no_balls += delivery.no_ball_extras();
        innings.byes += delivery.byes;
        innings.leg_byes += delivery.leg_byes;
        if counts {
            innings.balls += 1;
        }
        let seq = innings.deliveries;
        let balls_after = innings.balls;

        let batter = &mut self.batters[striker];
        batter.runs += delivery.runs_off_bat;
        if delivery.kind != DeliveryKind::Wide {
            batter.balls_faced += 1;
        }
        if delivery.boundary {
            match delivery.runs_off_bat {
                4 => batter.fours += 1,
                6 => batter.sixes += 1,
                _ => {}
            }
        }

        let spell = &mut self.bowlers[bowler];
        let conceded = total - delivery.byes - delivery.leg_byes;
        spell.runs_conceded += conceded;
        spell.over_runs += conceded;
        spell.wides += delivery.wide_extras();
        spell.no_balls += delivery.no_ball_extras();
        if counts {
            spell.balls += 1;
        }

        let over_number = balls_before / BALLS_PER_OVER;
        let ball = Ball {
            id: ctx.ids.generate(),
            innings_id: innings_id.clone(),
            match_id: self.fixture.id.clone(),
            seq,
            over_number,
            ball_in_over: balls_after - over_number * BALLS_PER_OVER,
            bowler_id: delivery.bowler_id.clone(),
            striker_id: self.batters[striker].player_id.clone(),
            non_striker_id: self.batters[non_striker].player_id.clone(),
            kind: delivery.kind,
            runs_off_bat: delivery.runs_off_bat,
            extras: delivery.extras(),
            total_runs: total,
            counts_toward_over: counts,
            boundary: delivery.boundary,
            is_wicket: out.is_some(),
            submitted_by: ctx.submitted_by.map(str::to_string),
            created_at: ctx.now,
        };

        let mut wicket = None;
        if let (Some(out), Some(dismissal)) = (out, &delivery.dismissal) {
            let innings = &mut self.innings[idx];
            innings.wickets += 1;
            let wicket_number = innings.wickets;

            let batter = &mut self.batters[out];
            batter.dismissed = true;
            batter.at_crease = false;
            batter.on_strike = false;

            let credited = dismissal.kind.credited_to_bowler();
            if credited {
                self.bowlers[bowler].wickets += 1;
            }
            wicket = Some(Wicket {
                id: ctx.ids.generate(),
                innings_id: innings_id.clone(),
                ball_id: ball.id,
                batter_id: self.batters[out].player_id.clone(),
                bowler_id: credited.then(|| delivery.bowler_id.clone()),
                fielder_id: dismissal.fielder_id.clone(),
                kind: dismissal.kind,
                wicket_number,
                created_at: ctx.now,
            });
        }

        // Odd running and the end of an over are one condition: at most one swap.
        let over_complete = counts && balls_after % BALLS_PER_OVER == 0;
        if delivery.running() % 2 == 1 || over_complete {
            self.rotate_strike(&innings_id);
        }

        if over_complete {
            let spell = &mut self.bowlers[bowler];
            if spell.over_runs == 0 {
                spell.maidens += 1;
            }
            spell.over_runs = 0;
            spell.is_current = false;
            self.innings[idx].previous_over_bowler_id = Some(delivery.bowler_id.clone());
        }

        self.dirty.extend([
            Dirty::Innings(idx),
            Dirty::Batter(striker),
            Dirty::Batter(non_striker),
            Dirty::Bowler(bowler),
        ]);
        self.last_ball = Some(ball.clone());
        self.appended.push(Change::Ball(ball));
        if let Some(wicket) = wicket {
            self.appended.push(Change::Wicket(wicket));
        }

        let innings = &self.innings[idx];
        let all_out = innings.wickets >= self.format.max_wickets;
        let overs_up = self.format.max_balls().is_some_and(|max| innings.balls >= max);
        let chased = innings.target.is_some_and(|target| innings.runs >= target);
        if all_out || overs_up || chased {
            self.complete_innings(idx);
        }
        Ok(())
    }

    fn rotate_strike(&mut self, innings_id: &str) {
        for (i, batter) in self.batters.iter_mut().enumerate() {
            if batter.innings_id == innings_id && batter.at_crease {
                batter.on_strike = !batter.on_strike;
                self.dirty.insert(Dirty::Batter(i));
            }
        }
    }

    /// Closes innings `idx` and either opens the next one or finishes the match.
    fn complete_innings(&mut self, idx: usize) {
        let innings_id = self.innings[idx].id.clone();
        self.innings[idx].status = PhaseStatus::Completed;
        self.dirty.insert(Dirty::Innings(idx));
        if let Some(bowler) = self.current_bowler(&innings_id) {
            self.bowlers[bowler].is_current = false;
            self.dirty.insert(Dirty::Bowler(bowler));
        }

        let finished = &self.innings[idx];
        let chased = finished.target.is_some_and(|target| finished.runs >= target);
        let total = self.format.total_innings();
        if chased || finished.number >= total {
            self.finish_match();
            return;
        }

        let number = finished.number + 1;
        let batting = finished.bowling_team_id.clone();
        let bowling = finished.batting_team_id.clone();
        let mut next = Innings::new(
            Innings::generate(),
            self.fixture.id.clone(),
            number,
            batting.clone(),
            bowling.clone(),
        );
        if number == total {
            let target = self.aggregate(&bowling) - self.aggregate(&batting) + 1;
            if target <= 0 {
                // Already ahead without batting again.
                self.finish_match();
                return;
            }
            next.target = Some(target);
        }
        self.innings.push(next);
        self.dirty.insert(Dirty::Innings(self.innings.len() - 1));
    }

    fn finish_match(&mut self) {
        let Some(last) = self.innings.last() else {
            return;
        };
        let total = self.format.total_innings();
        let chasing = last.batting_team_id.clone();
        let defending = last.bowling_team_id.clone();
        let chase = self.aggregate(&chasing);
        let defend = self.aggregate(&defending);
        let all_out = last.wickets >= self.format.max_wickets;
        let timeless = self.format.max_overs.is_none();

        let (winner, result) = if last.number < total {
            // The side due to bat next already leads on aggregate.
            let diff = defend - chase;
            (
                Some(defending.clone()),
                format!("{defending} won by an innings and {diff} runs"),
            )
        } else if chase > defend {
            let margin = self.format.max_wickets - last.wickets;
            (Some(chasing.clone()), format!("{chasing} won by {margin} wickets"))
        } else if timeless && !all_out {
            (None, "Match drawn".to_string())
        } else if chase == defend {
            (None, "Match tied".to_string())
        } else {
            let margin = defend - chase;
            (Some(defending.clone()), format!("{defending} won by {margin} runs"))
        };

        self.fixture.status = MatchStatus::Finished;
        self.fixture.winner_team_id = winner;
        self.fixture.result = Some(result);
        self.dirty.insert(Dirty::Fixture);
    }

    /// Total runs a team has scored across all its innings.
    pub fn aggregate(&self, team_id: &str) -> i32 {
        self.innings
            .iter()
            .filter(|i| i.batting_team_id == team_id)
            .map(|i| i.runs)
            .sum()
    }

    pub fn current_innings(&self) -> Option<&Innings> {
        self.innings.last()
    }

    pub fn outcome(&self) -> Option<MatchOutcome> {
        if self.fixture.status != MatchStatus::Finished {
            return None;
        }
        Some(MatchOutcome {
            winner_team_id: self.fixture.winner_team_id.clone(),
            home_score: self.aggregate(&self.fixture.home_team_id),
            away_score: self.aggregate(&self.fixture.away_team_id),
        })
    }

    /// Drains the writes accumulated so far, parents before children.
    pub fn take_changes(&mut self) -> Vec<Change> {
        let mut changes = Vec::with_capacity(self.dirty.len() + self.appended.len());
        for dirty in std::mem::take(&mut self.dirty) {
            changes.push(match dirty {
                Dirty::Fixture => Change::Fixture(self.fixture.clone()),
                Dirty::Innings(i) => Change::Innings(self.innings[i].clone()),
                Dirty::Batter(i) => Change::Batter(self.batters[i].clone()),
                Dirty::Bowler(i) => Change::Bowler(self.bowlers[i].clone()),
            });
        }
        changes.append(&mut self.appended);
        changes
    }

    fn ensure_live(&self) -> EngineResult<()> {
        if self.fixture.status == MatchStatus::Finished {
            return Err(EngineError::MatchFinished);
        }
        Ok(())
    }

    /// Index of the current innings, checked open and batted by `team_id`.
    fn open_innings(&self, team_id: &str) -> EngineResult<usize> {
        self.ensure_live()?;
        if !self.fixture.involves(team_id) {
            return Err(EngineError::UnknownTeam(team_id.to_string()));
        }
        let idx = self
            .innings
            .len()
            .checked_sub(1)
            .ok_or_else(|| EngineError::transition("the toss has not been taken"))?;
        let innings = &self.innings[idx];
        if innings.is_completed() {
            return Err(EngineError::InningsCompleted(innings.number));
        }
        if innings.batting_team_id != team_id {
            return Err(EngineError::transition(format!(
                "{team_id} is not batting in innings {}",
                innings.number
            )));
        }
        Ok(idx)
    }

    fn player_of(&self, player_id: &str, team_id: &str) -> EngineResult<&Player> {
        self.players
            .get(player_id)
            .filter(|p| p.team_id == team_id)
            .ok_or_else(|| EngineError::UnknownPlayer(player_id.to_string()))
    }

    fn batter_at(&self, innings_id: &str, on_strike: bool) -> Option<usize> {
        self.batters
            .iter()
            .position(|b| b.innings_id == innings_id && b.at_crease && b.on_strike == on_strike)
    }

    fn current_bowler(&self, innings_id: &str) -> Option<usize> {
        self.bowlers
            .iter()
            .position(|s| s.innings_id == innings_id && s.is_current)
    }

    fn spell_index(&mut self, innings_id: &str, player_id: &str) -> usize {
        if let Some(i) = self
            .bowlers
            .iter()
            .position(|s| s.innings_id == innings_id && s.player_id == player_id)
        {
            return i;
        }
        self.bowlers
            .push(BowlerSpell::new(innings_id, player_id, &self.fixture.id));
        self.bowlers.len() - 1
    }

    pub fn public_result(&self) -> CricketScoreUpdate {
        let current = self.current_innings();
        let batter_line = |on_strike: bool| {
            current
                .and_then(|i| self.batter_at(&i.id, on_strike))
                .map(|b| BatterLine::from(&self.batters[b]))
        };
        let bowler = current.and_then(|i| {
            self.current_bowler(&i.id).or_else(|| {
                // Between overs, show whoever bowled the last one.
                let prev = i.previous_over_bowler_id.as_deref()?;
                self.bowlers
                    .iter()
                    .position(|s| s.innings_id == i.id && s.player_id == prev)
            })
        });

        CricketScoreUpdate {
            match_id: self.fixture.id.clone(),
            status: self.fixture.status,
            format: self.format.code.to_string(),
            toss_winner_id: self.fixture.toss_winner_id.clone(),
            toss_decision: self.fixture.toss_decision,
            innings: self.innings.iter().map(InningsSummary::from).collect(),
            current_innings: current.map(|i| i.number),
            striker: batter_line(true),
            non_striker: batter_line(false),
            bowler: bowler.map(|b| BowlerLine::from(&self.bowlers[b])),
            last_ball: self.last_ball.clone(),
            winner_team_id: self.fixture.winner_team_id.clone(),
            result: self.fixture.result.clone(),
            submitted_by: None,
        }
    }
}

/// Public view of a cricket match after an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CricketScoreUpdate {
    pub match_id: String,
    pub status: MatchStatus,
    pub format: String,
    pub toss_winner_id: Option<String>,
    pub toss_decision: Option<TossDecision>,
    pub innings: Vec<InningsSummary>,
    pub current_innings: Option<i32>,
    pub striker: Option<BatterLine>,
    pub non_striker: Option<BatterLine>,
    pub bowler: Option<BowlerLine>,
    pub last_ball: Option<Ball>,
    pub winner_team_id: Option<String>,
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InningsSummary {
    pub number: i32,
    pub batting_team_id: String,
    pub bowling_team_id: String,
    pub runs: i32,
    pub wickets: i32,
    pub overs: String,
    pub balls: i32,
    pub extras: i32,
    pub run_rate: f64,
    pub target: Option<i32>,
    pub status: PhaseStatus,
}

impl From<&Innings> for InningsSummary {
    fn from(i: &Innings) -> Self {
        Self {
            number: i.number,
            batting_team_id: i.batting_team_id.clone(),
            bowling_team_id: i.bowling_team_id.clone(),
            runs: i.runs,
            wickets: i.wickets,
            overs: i.overs(),
            balls: i.balls,
            extras: i.extras(),
            run_rate: i.run_rate(),
            target: i.target,
            status: i.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BatterLine {
    pub player_id: String,
    pub runs: i32,
    pub balls_faced: i32,
    pub fours: i32,
    pub sixes: i32,
}

impl From<&BatterInnings> for BatterLine {
    fn from(b: &BatterInnings) -> Self {
        Self {
            player_id: b.player_id.clone(),
            runs: b.runs,
            balls_faced: b.balls_faced,
            fours: b.fours,
            sixes: b.sixes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BowlerLine {
    pub player_id: String,
    pub overs: String,
    pub runs_conceded: i32,
    pub wickets: i32,
    pub maidens: i32,
}

impl From<&BowlerSpell> for BowlerLine {
    fn from(s: &BowlerSpell) -> Self {
        Self {
            player_id: s.player_id.clone(),
            overs: overs_notation(s.balls),
            runs_conceded: s.runs_conceded,
            wickets: s.wickets,
            maidens: s.maidens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{cricket_records, ctx_parts};

    const HOME: &str = "team_home";
    const AWAY: &str = "team_away";

    fn started(format: CricketFormat) -> CricketMatch {
        let mut m = CricketMatch::from_records(cricket_records("t20")).unwrap();
        m.format = format;
        m.toss(HOME, TossDecision::Bat).unwrap();
        m.batter_in(HOME, "home_1", None).unwrap();
        m.batter_in(HOME, "home_2", None).unwrap();
        m.change_bowler(HOME, "away_1").unwrap();
        m
    }

    fn ball(runs: i32) -> BallParams {
        BallParams {
            bowler_id: "away_1".into(),
            runs,
            boundary: false,
            byes: 0,
            leg_byes: 0,
        }
    }

    fn striker(m: &CricketMatch) -> Option<String> {
        let id = &m.current_innings()?.id;
        m.batter_at(id, true).map(|i| m.batters[i].player_id.clone())
    }

    fn spell<'a>(m: &'a CricketMatch, player: &str) -> &'a BowlerSpell {
        m.bowlers.iter().find(|s| s.player_id == player).unwrap()
    }

    #[test]
    fn toss_opens_first_innings_at_zero() {
        let mut m = CricketMatch::from_records(cricket_records("t20")).unwrap();
        m.toss(AWAY, TossDecision::Bowl).unwrap();

        assert_eq!(m.fixture.status, MatchStatus::InProgress);
        let first = m.current_innings().unwrap();
        assert_eq!(first.number, 1);
        assert_eq!(first.batting_team_id, HOME);
        assert_eq!((first.runs, first.wickets, first.balls), (0, 0, 0));
        assert_eq!(
            m.toss(HOME, TossDecision::Bat),
            Err(EngineError::transition("the toss has already been taken"))
        );
    }

    #[test]
    fn first_over_with_uncounted_wide() {
        let (ids, now) = ctx_parts();
        let ctx = EngineContext { ids: &ids, now, submitted_by: Some("usr_scorer") };
        let format = CricketFormat {
            wide_counts_toward_over: false,
            ..CricketFormat::T20
        };
        let mut m = started(format);

        let four = BallParams {
            boundary: true,
            ..ball(4)
        };
        m.regular_ball(&ctx, HOME, &four).unwrap();
        let innings = m.current_innings().unwrap();
        assert_eq!((innings.runs, innings.wickets, innings.balls), (4, 0, 1));
        assert_eq!(striker(&m).as_deref(), Some("home_1"));

        let wide = WideParams {
            bowler_id: "away_1".into(),
            runs: 0,
            boundary: false,
        };
        m.wide(&ctx, HOME, &wide).unwrap();
        let innings = m.current_innings().unwrap();
        assert_eq!((innings.runs, innings.balls, innings.wides), (5, 1, 1));
        assert_eq!(spell(&m, "away_1").balls, 1);
        assert_eq!(striker(&m).as_deref(), Some("home_1"));

        for _ in 0..4 {
            m.regular_ball(&ctx, HOME, &ball(0)).unwrap();
        }
        let bowled = WicketParams {
            bowler_id: "away_1".into(),
            kind: WicketKind::Bowled,
            batter_id: None,
            fielder_id: None,
            runs: 0,
            delivery: None,
        };
        m.wicket(&ctx, HOME, &bowled).unwrap();

        let innings = m.current_innings().unwrap();
        assert_eq!((innings.runs, innings.wickets, innings.balls), (5, 1, 6));
        assert_eq!(innings.previous_over_bowler_id.as_deref(), Some("away_1"));
        // The survivor moved to the striker's end at the change of ends.
        assert_eq!(striker(&m).as_deref(), Some("home_2"));
        let figures = spell(&m, "away_1");
        assert_eq!((figures.balls, figures.wickets, figures.runs_conceded), (6, 1, 5));
        assert!(!figures.is_current);
    }

    #[test]
    fn wide_counts_under_default_policy() {
        let (ids, now) = ctx_parts();
        let ctx = EngineContext { ids: &ids, now, submitted_by: Some("usr_scorer") };
        let mut m = started(CricketFormat::T20);
        let wide = WideParams {
            bowler_id: "away_1".into(),
            runs: 2,
            boundary: false,
        };
        m.wide(&ctx, HOME, &wide).unwrap();

        let innings = m.current_innings().unwrap();
        assert_eq!((innings.runs, innings.balls, innings.wides), (3, 1, 3));
        let figures = spell(&m, "away_1");
        assert_eq!((figures.balls, figures.runs_conceded, figures.wides), (1, 3, 3));
        // The batter does not face a wide.
        assert_eq!(m.batters[0].balls_faced, 0);
        // Two wide runs were run: no swap.
        assert_eq!(striker(&m).as_deref(), Some("home_1"));
    }

    #[test]
    fn no_ball_never_counts_toward_the_over() {
        let (ids, now) = ctx_parts();
        let ctx = EngineContext { ids: &ids, now, submitted_by: Some("usr_scorer") };
        let mut m = started(CricketFormat::T20);
        let no_ball = NoBallParams {
            bowler_id: "away_1".into(),
            runs: 1,
            boundary: false,
            byes: 0,
        };
        m.no_ball(&ctx, HOME, &no_ball).unwrap();

        let innings = m.current_innings().unwrap();
        assert_eq!((innings.runs, innings.balls, innings.no_balls), (2, 0, 1));
        assert_eq!(innings.deliveries, 1);
        let figures = spell(&m, "away_1");
        assert_eq!((figures.balls, figures.runs_conceded, figures.no_balls), (0, 2, 1));
        let batter = &m.batters[0];
        assert_eq!((batter.runs, batter.balls_faced), (1, 1));
        assert_eq!(striker(&m).as_deref(), Some("home_2"));
    }

    #[test]
    fn odd_run_off_last_ball_swaps_once() {
        let (ids, now) = ctx_parts();
        let ctx = EngineContext { ids: &ids, now, submitted_by: Some("usr_scorer") };
        let mut m = started(CricketFormat::T20);
        for _ in 0..5 {
            m.regular_ball(&ctx, HOME, &ball(0)).unwrap();
        }
        m.regular_ball(&ctx, HOME, &ball(1)).unwrap();

        let innings_id = m.current_innings().unwrap().id.clone();
        let on_strike: Vec<_> = m
            .batters
            .iter()
            .filter(|b| b.innings_id == innings_id && b.on_strike)
            .collect();
        assert_eq!(on_strike.len(), 1);
        assert_eq!(on_strike[0].player_id, "home_2");
    }

    #[test]
    fn byes_go_to_the_team_only() {
        let (ids, now) = ctx_parts();
        let ctx = EngineContext { ids: &ids, now, submitted_by: Some("usr_scorer") };
        let mut m = started(CricketFormat::T20);
        let byes = BallParams {
            byes: 3,
            ..ball(0)
        };
        m.regular_ball(&ctx, HOME, &byes).unwrap();

        let innings = m.current_innings().unwrap();
        assert_eq!((innings.runs, innings.byes, innings.extras()), (3, 3, 3));
        assert_eq!(m.batters[0].runs, 0);
        assert_eq!(spell(&m, "away_1").runs_conceded, 0);
        assert_eq!(striker(&m).as_deref(), Some("home_2"));
    }

    #[test]
    fn wrong_bowler_is_rejected_without_mutation() {
        let (ids, now) = ctx_parts();
        let ctx = EngineContext { ids: &ids, now, submitted_by: Some("usr_scorer") };
        let mut m = started(CricketFormat::T20);
        let before = m.innings.clone();
        let params = BallParams {
            bowler_id: "away_2".into(),
            ..ball(2)
        };
        let err = m.regular_ball(&ctx, HOME, &params).unwrap_err();
        assert!(matches!(err, EngineError::InvalidStateTransition(_)));
        assert_eq!(m.innings, before);
        assert!(m.last_ball.is_none());
    }

    #[test]
    fn maiden_and_over_boundary_rules() {
        let (ids, now) = ctx_parts();
        let ctx = EngineContext { ids: &ids, now, submitted_by: Some("usr_scorer") };
        let mut m = started(CricketFormat::T20);
        m.regular_ball(&ctx, HOME, &ball(0)).unwrap();
        assert!(m.change_bowler(HOME, "away_2").is_err());
        for _ in 0..5 {
            m.regular_ball(&ctx, HOME, &ball(0)).unwrap();
        }
        assert_eq!(spell(&m, "away_1").maidens, 1);

        // Same bowler may not bowl the next over.
        assert!(m.change_bowler(HOME, "away_1").is_err());
        assert!(m.regular_ball(&ctx, HOME, &ball(0)).is_err());
        m.change_bowler(HOME, "away_2").unwrap();
        let next = BallParams {
            bowler_id: "away_2".into(),
            ..ball(0)
        };
        m.regular_ball(&ctx, HOME, &next).unwrap();
        let last = m.last_ball.as_ref().unwrap();
        assert_eq!((last.over_number, last.ball_in_over), (1, 1));
    }

    #[test]
    fn wicket_types_are_checked_per_delivery() {
        let (ids, now) = ctx_parts();
        let ctx = EngineContext { ids: &ids, now, submitted_by: Some("usr_scorer") };
        let mut m = started(CricketFormat::T20);
        let bowled_off_wide = WicketParams {
            bowler_id: "away_1".into(),
            kind: WicketKind::Bowled,
            batter_id: None,
            fielder_id: None,
            runs: 0,
            delivery: Some(DeliveryKind::Wide),
        };
        assert!(matches!(
            m.wicket(&ctx, HOME, &bowled_off_wide),
            Err(EngineError::InvalidDelivery(_))
        ));

        let run_out = WicketParams {
            kind: WicketKind::RunOut,
            batter_id: Some("home_2".into()),
            fielder_id: Some("away_5".into()),
            runs: 1,
            delivery: Some(DeliveryKind::NoBall),
            ..bowled_off_wide
        };
        m.wicket(&ctx, HOME, &run_out).unwrap();
        let innings = m.current_innings().unwrap();
        assert_eq!((innings.runs, innings.wickets, innings.balls), (2, 1, 0));
        assert_eq!(spell(&m, "away_1").wickets, 0);
        let changes = m.take_changes();
        let wicket = changes.iter().find_map(|c| match c {
            Change::Wicket(w) => Some(w),
            _ => None,
        });
        assert_eq!(wicket.unwrap().bowler_id, None);
    }

    #[test]
    fn reaching_the_wicket_limit_closes_the_innings_once() {
        let (ids, now) = ctx_parts();
        let ctx = EngineContext { ids: &ids, now, submitted_by: Some("usr_scorer") };
        let format = CricketFormat {
            max_wickets: 2,
            ..CricketFormat::T20
        };
        let mut m = started(format);
        let out = WicketParams {
            bowler_id: "away_1".into(),
            kind: WicketKind::Lbw,
            batter_id: None,
            fielder_id: None,
            runs: 0,
            delivery: None,
        };
        m.wicket(&ctx, HOME, &out).unwrap();
        m.batter_in(HOME, "home_3", None).unwrap();
        m.wicket(&ctx, HOME, &out).unwrap();

        assert_eq!(m.innings.len(), 2);
        assert_eq!(m.innings[0].wickets, 2);
        assert!(m.innings[0].is_completed());
        assert_eq!(m.innings[1].batting_team_id, AWAY);
        assert_eq!(m.innings[1].target, Some(1));
        assert!(matches!(
            m.batter_in(HOME, "home_4", None),
            Err(EngineError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn chase_finishes_the_match() {
        let (ids, now) = ctx_parts();
        let ctx = EngineContext { ids: &ids, now, submitted_by: Some("usr_scorer") };
        let format = CricketFormat {
            max_overs: Some(1),
            ..CricketFormat::T20
        };
        let mut m = started(format);
        for runs in [4, 0, 0, 0, 0, 2] {
            m.regular_ball(&ctx, HOME, &ball(runs)).unwrap();
        }
        assert!(m.innings[0].is_completed());
        assert_eq!(m.innings[1].target, Some(7));

        m.batter_in(AWAY, "away_1", None).unwrap();
        m.batter_in(AWAY, "away_2", None).unwrap();
        m.change_bowler(AWAY, "home_1").unwrap();
        let six = BallParams {
            bowler_id: "home_1".into(),
            runs: 6,
            boundary: true,
            byes: 0,
            leg_byes: 0,
        };
        m.regular_ball(&ctx, AWAY, &six).unwrap();
        assert_eq!(m.fixture.status, MatchStatus::InProgress);
        let single = BallParams { runs: 1, boundary: false, ..six };
        m.regular_ball(&ctx, AWAY, &single).unwrap();

        assert_eq!(m.fixture.status, MatchStatus::Finished);
        assert_eq!(m.fixture.winner_team_id.as_deref(), Some(AWAY));
        assert_eq!(m.fixture.result.as_deref(), Some("team_away won by 10 wickets"));
        let outcome = m.outcome().unwrap();
        assert_eq!((outcome.home_score, outcome.away_score), (6, 7));
        assert_eq!(
            m.regular_ball(&ctx, AWAY, &single),
            Err(EngineError::MatchFinished)
        );
    }

    #[test]
    fn defended_total_wins_by_runs() {
        let (ids, now) = ctx_parts();
        let ctx = EngineContext { ids: &ids, now, submitted_by: Some("usr_scorer") };
        let format = CricketFormat {
            max_overs: Some(1),
            ..CricketFormat::T20
        };
        let mut m = started(format);
        m.regular_ball(&ctx, HOME, &ball(3)).unwrap();
        m.end_innings(HOME).unwrap();

        m.batter_in(AWAY, "away_1", None).unwrap();
        m.batter_in(AWAY, "away_2", None).unwrap();
        m.change_bowler(AWAY, "home_1").unwrap();
        m.end_innings(AWAY).unwrap();

        assert_eq!(m.fixture.winner_team_id.as_deref(), Some(HOME));
        assert_eq!(m.fixture.result.as_deref(), Some("team_home won by 3 runs"));
    }

    /// Sends in the side's first two batters and hands the ball to the
    /// other side's first player.
    fn openers(m: &mut CricketMatch, batting: &str) -> &'static str {
        let (side, bowler) = if batting == HOME {
            ("home", "away_1")
        } else {
            ("away", "home_1")
        };
        m.batter_in(batting, &format!("{side}_1"), None).unwrap();
        m.batter_in(batting, &format!("{side}_2"), None).unwrap();
        m.change_bowler(batting, bowler).unwrap();
        bowler
    }

    fn score(m: &mut CricketMatch, ctx: &EngineContext<'_>, batting: &str, bowler: &str, runs: &[i32]) {
        for r in runs {
            let params = BallParams {
                bowler_id: bowler.into(),
                ..ball(*r)
            };
            m.regular_ball(ctx, batting, &params).unwrap();
        }
    }

    #[test]
    fn limited_overs_tie() {
        let (ids, now) = ctx_parts();
        let ctx = EngineContext { ids: &ids, now, submitted_by: Some("usr_scorer") };
        let format = CricketFormat {
            max_overs: Some(1),
            ..CricketFormat::T20
        };
        let mut m = started(format);
        score(&mut m, &ctx, HOME, "away_1", &[1, 2]);
        m.end_innings(HOME).unwrap();
        assert_eq!(m.innings[1].target, Some(4));

        let bowler = openers(&mut m, AWAY);
        score(&mut m, &ctx, AWAY, bowler, &[1, 0, 0, 0, 0, 2]);

        assert_eq!(m.fixture.status, MatchStatus::Finished);
        assert_eq!(m.fixture.winner_team_id, None);
        assert_eq!(m.fixture.result.as_deref(), Some("Match tied"));
        let outcome = m.outcome().unwrap();
        assert_eq!((outcome.home_score, outcome.away_score), (3, 3));
        assert_eq!(outcome.winner_team_id, None);
    }

    #[test]
    fn test_match_won_by_an_innings() {
        let (ids, now) = ctx_parts();
        let ctx = EngineContext { ids: &ids, now, submitted_by: Some("usr_scorer") };
        let mut m = started(CricketFormat::TEST);
        score(&mut m, &ctx, HOME, "away_1", &[1, 1]);
        m.end_innings(HOME).unwrap();

        let bowler = openers(&mut m, AWAY);
        score(&mut m, &ctx, AWAY, bowler, &[5, 5, 5, 5]);
        m.end_innings(AWAY).unwrap();
        assert_eq!(m.innings[2].batting_team_id, HOME);
        assert_eq!(m.innings[2].target, None);

        let bowler = openers(&mut m, HOME);
        score(&mut m, &ctx, HOME, bowler, &[3, 2]);
        m.end_innings(HOME).unwrap();

        // Still 13 behind, so the fourth innings is never opened.
        assert_eq!(m.innings.len(), 3);
        assert_eq!(m.fixture.status, MatchStatus::Finished);
        assert_eq!(m.fixture.winner_team_id.as_deref(), Some(AWAY));
        assert_eq!(
            m.fixture.result.as_deref(),
            Some("team_away won by an innings and 13 runs")
        );
        let outcome = m.outcome().unwrap();
        assert_eq!((outcome.home_score, outcome.away_score), (7, 20));
    }

    #[test]
    fn test_match_declaration_then_draw_or_chase() {
        let (ids, now) = ctx_parts();
        let ctx = EngineContext { ids: &ids, now, submitted_by: Some("usr_scorer") };
        let mut m = started(CricketFormat::TEST);
        score(&mut m, &ctx, HOME, "away_1", &[4, 4, 2]);
        m.end_innings(HOME).unwrap();
        assert!(m.innings[0].is_completed());
        assert_eq!((m.innings[0].runs, m.innings[0].wickets), (10, 0));
        assert_eq!(m.innings[1].target, None);
        assert_eq!(m.fixture.status, MatchStatus::InProgress);

        let bowler = openers(&mut m, AWAY);
        score(&mut m, &ctx, AWAY, bowler, &[3, 3]);
        m.end_innings(AWAY).unwrap();
        let bowler = openers(&mut m, HOME);
        score(&mut m, &ctx, HOME, bowler, &[2]);
        m.end_innings(HOME).unwrap();

        let fourth = m.current_innings().unwrap();
        assert_eq!(fourth.number, 4);
        assert_eq!(fourth.batting_team_id, AWAY);
        assert_eq!(fourth.target, Some(12 - 6 + 1));
        let bowler = openers(&mut m, AWAY);
        let mut chase = m.clone();

        // Time runs out with wickets in hand.
        score(&mut m, &ctx, AWAY, bowler, &[1, 2]);
        m.end_innings(AWAY).unwrap();
        assert_eq!(m.fixture.status, MatchStatus::Finished);
        assert_eq!(m.fixture.winner_team_id, None);
        assert_eq!(m.fixture.result.as_deref(), Some("Match drawn"));

        // Reaching the target ends the match on that delivery.
        score(&mut chase, &ctx, AWAY, bowler, &[4, 3]);
        assert_eq!(chase.fixture.status, MatchStatus::Finished);
        assert_eq!(chase.fixture.winner_team_id.as_deref(), Some(AWAY));
        assert_eq!(chase.fixture.result.as_deref(), Some("team_away won by 10 wickets"));
        let outcome = chase.outcome().unwrap();
        assert_eq!((outcome.home_score, outcome.away_score), (12, 13));
    }

    #[test]
    fn changes_list_parents_before_children() {
        let (ids, now) = ctx_parts();
        let ctx = EngineContext { ids: &ids, now, submitted_by: Some("usr_scorer") };
        let mut m = started(CricketFormat::T20);
        m.take_changes();
        m.regular_ball(&ctx, HOME, &ball(1)).unwrap();
        let kinds: Vec<_> = m.take_changes().iter().map(Change::kind).collect();
        assert_eq!(kinds, ["innings", "batter", "batter", "bowler", "ball"]);
        assert!(m.take_changes().is_empty());
    }

    #[test]
    fn actions_deserialize_from_tagged_json() {
        let action: CricketAction =
            serde_json::from_str(r#"{"action":"wide","bowler_id":"p1"}"#).unwrap();
        assert_eq!(
            action,
            CricketAction::Wide(WideParams {
                bowler_id: "p1".into(),
                runs: 0,
                boundary: false
            })
        );
        let action: CricketAction =
            serde_json::from_str(r#"{"action":"toss","decision":"bowl"}"#).unwrap();
        assert_eq!(action.name(), "toss");
    }
}
