use chrono::{DateTime, Utc};
use diesel::prelude::*;
use scoreline_common::id::prefix;
use scoreline_common::PrefixedId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::{balls, batter_innings, bowler_spells, innings, wickets};

use super::fixture::{Fixture, PhaseStatus, Player};

/// Deliveries in one over.
pub const BALLS_PER_OVER: i32 = 6;

text_enum! {
    pub enum DeliveryKind {
        Regular => "regular",
        Wide => "wide",
        NoBall => "no_ball",
    }
}

text_enum! {
    pub enum WicketKind {
        Bowled => "bowled",
        Caught => "caught",
        Lbw => "lbw",
        RunOut => "run_out",
        Stumped => "stumped",
        HitWicket => "hit_wicket",
    }
}

impl WicketKind {
    /// Whether the bowler is credited with the dismissal.
    pub fn credited_to_bowler(&self) -> bool {
        !matches!(self, Self::RunOut)
    }

    /// Whether this dismissal can happen on a delivery of the given kind.
    pub fn allowed_on(&self, delivery: DeliveryKind) -> bool {
        match delivery {
            DeliveryKind::Regular => true,
            DeliveryKind::Wide => matches!(self, Self::RunOut | Self::Stumped | Self::HitWicket),
            DeliveryKind::NoBall => matches!(self, Self::RunOut),
        }
    }
}

/// Aggregate score for one team's innings.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = innings, treat_none_as_null = true)]
pub struct Innings {
    pub id: String,
    pub match_id: String,
    /// 1-based position in the match.
    pub number: i32,
    pub batting_team_id: String,
    pub bowling_team_id: String,
    pub runs: i32,
    pub wickets: i32,
    /// Deliveries counted toward overs.
    pub balls: i32,
    /// Every delivery bowled, counted or not.
    pub deliveries: i32,
    pub wides: i32,
    pub no_balls: i32,
    pub byes: i32,
    pub leg_byes: i32,
    pub status: PhaseStatus,
    pub previous_over_bowler_id: Option<String>,
    /// Runs needed to win, set on the final innings of a chase.
    pub target: Option<i32>,
}

impl Innings {
    pub fn new(
        id: String,
        match_id: String,
        number: i32,
        batting_team_id: String,
        bowling_team_id: String,
    ) -> Self {
        Self {
            id,
            match_id,
            number,
            batting_team_id,
            bowling_team_id,
            runs: 0,
            wickets: 0,
            balls: 0,
            deliveries: 0,
            wides: 0,
            no_balls: 0,
            byes: 0,
            leg_byes: 0,
            status: PhaseStatus::NotStarted,
            previous_over_bowler_id: None,
            target: None,
        }
    }

    pub fn extras(&self) -> i32 {
        self.wides + self.no_balls + self.byes + self.leg_byes
    }

    pub fn is_completed(&self) -> bool {
        self.status == PhaseStatus::Completed
    }

    /// Overs in cricket notation, e.g. `12.3` for twelve overs and three balls.
    pub fn overs(&self) -> String {
        overs_notation(self.balls)
    }

    /// Runs per six counted balls.
    pub fn run_rate(&self) -> f64 {
        if self.balls == 0 {
            return 0.0;
        }
        let rate = self.runs as f64 * BALLS_PER_OVER as f64 / self.balls as f64;
        (rate * 100.0).round() / 100.0
    }
}

impl PrefixedId for Innings {
    const PREFIX: &'static str = prefix::INNINGS;
}

pub fn overs_notation(balls: i32) -> String {
    format!("{}.{}", balls / BALLS_PER_OVER, balls % BALLS_PER_OVER)
}

/// A batter's line in one innings, including crease/strike rotation state.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = batter_innings, primary_key(innings_id, player_id))]
pub struct BatterInnings {
    pub innings_id: String,
    pub player_id: String,
    pub match_id: String,
    /// Batting order, starting at 1.
    pub position: i32,
    pub runs: i32,
    pub balls_faced: i32,
    pub fours: i32,
    pub sixes: i32,
    pub at_crease: bool,
    pub on_strike: bool,
    pub dismissed: bool,
}

/// A bowler's figures in one innings, including whether they hold the ball.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = bowler_spells, primary_key(innings_id, player_id))]
pub struct BowlerSpell {
    pub innings_id: String,
    pub player_id: String,
    pub match_id: String,
    /// Deliveries counted toward overs.
    pub balls: i32,
    pub runs_conceded: i32,
    pub wickets: i32,
    pub wides: i32,
    pub no_balls: i32,
    pub maidens: i32,
    /// Runs conceded in the over currently being bowled.
    pub over_runs: i32,
    pub is_current: bool,
}

impl BowlerSpell {
    pub fn new(innings_id: &str, player_id: &str, match_id: &str) -> Self {
        Self {
            innings_id: innings_id.to_string(),
            player_id: player_id.to_string(),
            match_id: match_id.to_string(),
            balls: 0,
            runs_conceded: 0,
            wickets: 0,
            wides: 0,
            no_balls: 0,
            maidens: 0,
            over_runs: 0,
            is_current: false,
        }
    }
}

/// One delivery. Append-only.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, Queryable, Selectable, Insertable,
)]
#[diesel(table_name = balls)]
pub struct Ball {
    pub id: i64,
    pub innings_id: String,
    pub match_id: String,
    /// 1-based delivery sequence within the innings.
    pub seq: i32,
    /// 0-based over index.
    pub over_number: i32,
    /// Counted balls of the over after this delivery.
    pub ball_in_over: i32,
    pub bowler_id: String,
    pub striker_id: String,
    pub non_striker_id: String,
    pub kind: DeliveryKind,
    pub runs_off_bat: i32,
    pub extras: i32,
    pub total_runs: i32,
    pub counts_toward_over: bool,
    pub boundary: bool,
    pub is_wicket: bool,
    /// User who submitted the event that recorded this delivery.
    pub submitted_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One dismissal. Append-only; their count is the innings' wicket total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = wickets)]
pub struct Wicket {
    pub id: i64,
    pub innings_id: String,
    pub ball_id: i64,
    pub batter_id: String,
    pub bowler_id: Option<String>,
    pub fielder_id: Option<String>,
    pub kind: WicketKind,
    /// 1 for the first wicket to fall, and so on.
    pub wicket_number: i32,
    pub created_at: DateTime<Utc>,
}

/// Everything the cricket engine needs to read for one fixture.
#[derive(Debug, Clone)]
pub struct CricketRecords {
    pub fixture: Fixture,
    pub players: Vec<Player>,
    pub innings: Vec<Innings>,
    pub batters: Vec<BatterInnings>,
    pub bowlers: Vec<BowlerSpell>,
    /// Most recent delivery of the latest innings.
    pub last_ball: Option<Ball>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overs_notation_counts_whole_overs_and_balls() {
        assert_eq!(overs_notation(0), "0.0");
        assert_eq!(overs_notation(5), "0.5");
        assert_eq!(overs_notation(6), "1.0");
        assert_eq!(overs_notation(125), "20.5");
    }

    #[test]
    fn run_rate_is_per_over_and_rounded() {
        let mut innings = Innings::new("i".into(), "m".into(), 1, "a".into(), "b".into());
        assert_eq!(innings.run_rate(), 0.0);
        innings.runs = 10;
        innings.balls = 4;
        assert_eq!(innings.run_rate(), 15.0);
        innings.runs = 7;
        innings.balls = 9;
        assert_eq!(innings.run_rate(), 4.67);
    }

    #[test]
    fn wicket_kinds_allowed_per_delivery() {
        assert!(WicketKind::Bowled.allowed_on(DeliveryKind::Regular));
        assert!(!WicketKind::Bowled.allowed_on(DeliveryKind::Wide));
        assert!(WicketKind::Stumped.allowed_on(DeliveryKind::Wide));
        assert!(!WicketKind::Stumped.allowed_on(DeliveryKind::NoBall));
        assert!(WicketKind::RunOut.allowed_on(DeliveryKind::NoBall));
        assert!(!WicketKind::RunOut.credited_to_bowler());
        assert!(WicketKind::Lbw.credited_to_bowler());
    }

    #[test]
    fn delivery_kind_parses_its_own_text() {
        for kind in [DeliveryKind::Regular, DeliveryKind::Wide, DeliveryKind::NoBall] {
            assert_eq!(kind.as_str().parse::<DeliveryKind>().unwrap(), kind);
        }
        assert!("beamer".parse::<DeliveryKind>().is_err());
    }
}
