use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::{incidents, period_scores, team_stats};

use super::fixture::{Fixture, PhaseStatus, Player};

text_enum! {
    pub enum Period {
        FirstHalf => "first_half",
        SecondHalf => "second_half",
        ExtraTimeFirst => "extra_time_first",
        ExtraTimeSecond => "extra_time_second",
        PenaltyShootout => "penalty_shootout",
    }
}

impl Period {
    pub const ALL: [Period; 5] = [
        Period::FirstHalf,
        Period::SecondHalf,
        Period::ExtraTimeFirst,
        Period::ExtraTimeSecond,
        Period::PenaltyShootout,
    ];

    /// The period that must be completed before this one may start.
    pub fn predecessor(&self) -> Option<Period> {
        match self {
            Self::FirstHalf => None,
            Self::SecondHalf => Some(Self::FirstHalf),
            Self::ExtraTimeFirst => Some(Self::SecondHalf),
            Self::ExtraTimeSecond => Some(Self::ExtraTimeFirst),
            Self::PenaltyShootout => Some(Self::SecondHalf),
        }
    }

    pub fn is_shootout(&self) -> bool {
        matches!(self, Self::PenaltyShootout)
    }
}

text_enum! {
    pub enum IncidentKind {
        Goal => "goal",
        PenaltyScored => "penalty_scored",
        PenaltyMissed => "penalty_missed",
        ShootoutScored => "shootout_scored",
        ShootoutMissed => "shootout_missed",
        Shot => "shot",
        ShotOnTarget => "shot_on_target",
        Save => "save",
        Foul => "foul",
        Corner => "corner",
        Offside => "offside",
        YellowCard => "yellow_card",
        RedCard => "red_card",
        Substitution => "substitution",
    }
}

impl IncidentKind {
    /// Adds one to the scoring team's goals for the period it occurs in.
    pub fn scores(&self) -> bool {
        matches!(self, Self::Goal | Self::PenaltyScored | Self::ShootoutScored)
    }

    pub fn shootout_only(&self) -> bool {
        matches!(self, Self::ShootoutScored | Self::ShootoutMissed)
    }
}

text_enum! {
    pub enum Stat {
        Shots => "shots",
        ShotsOnTarget => "shots_on_target",
        Saves => "saves",
        Fouls => "fouls",
        Corners => "corners",
        Offsides => "offsides",
        YellowCards => "yellow_cards",
        RedCards => "red_cards",
    }
}

/// Goals for one team in one period.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = period_scores, primary_key(match_id, team_id, period))]
pub struct PeriodScore {
    pub match_id: String,
    pub team_id: String,
    pub period: Period,
    pub goals: i32,
    pub status: PhaseStatus,
}

/// One match incident. Append-only.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, Queryable, Selectable, Insertable,
)]
#[diesel(table_name = incidents)]
pub struct Incident {
    pub id: i64,
    pub match_id: String,
    pub team_id: String,
    pub period: Period,
    pub minute: i32,
    pub kind: IncidentKind,
    pub player_id: Option<String>,
    /// Entering player for substitutions, assisting player for goals.
    pub related_player_id: Option<String>,
    pub submitted_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Match-level counters for one team, driven by incidents.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Serialize,
    Deserialize,
    ToSchema,
    Queryable,
    Selectable,
    Insertable,
    AsChangeset,
)]
#[diesel(table_name = team_stats, primary_key(match_id, team_id))]
pub struct TeamStats {
    pub match_id: String,
    pub team_id: String,
    pub shots: i32,
    pub shots_on_target: i32,
    pub saves: i32,
    pub fouls: i32,
    pub corners: i32,
    pub offsides: i32,
    pub yellow_cards: i32,
    pub red_cards: i32,
}

impl TeamStats {
    pub fn new(match_id: &str, team_id: &str) -> Self {
        Self {
            match_id: match_id.to_string(),
            team_id: team_id.to_string(),
            ..Default::default()
        }
    }

    fn slot(&mut self, stat: Stat) -> &mut i32 {
        match stat {
            Stat::Shots => &mut self.shots,
            Stat::ShotsOnTarget => &mut self.shots_on_target,
            Stat::Saves => &mut self.saves,
            Stat::Fouls => &mut self.fouls,
            Stat::Corners => &mut self.corners,
            Stat::Offsides => &mut self.offsides,
            Stat::YellowCards => &mut self.yellow_cards,
            Stat::RedCards => &mut self.red_cards,
        }
    }

    pub fn bump(&mut self, stat: Stat, delta: i32) {
        *self.slot(stat) += delta;
    }

    pub fn get(&self, stat: Stat) -> i32 {
        match stat {
            Stat::Shots => self.shots,
            Stat::ShotsOnTarget => self.shots_on_target,
            Stat::Saves => self.saves,
            Stat::Fouls => self.fouls,
            Stat::Corners => self.corners,
            Stat::Offsides => self.offsides,
            Stat::YellowCards => self.yellow_cards,
            Stat::RedCards => self.red_cards,
        }
    }
}

/// Everything the football engine needs to read for one fixture.
#[derive(Debug, Clone)]
pub struct FootballRecords {
    pub fixture: Fixture,
    pub players: Vec<Player>,
    pub periods: Vec<PeriodScore>,
    pub incidents: Vec<Incident>,
    pub stats: Vec<TeamStats>,
}
