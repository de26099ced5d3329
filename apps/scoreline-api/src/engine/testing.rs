use chrono::{DateTime, TimeZone, Utc};
use scoreline_common::SnowflakeGenerator;

use crate::models::cricket::CricketRecords;
use crate::models::fixture::{Fixture, MatchStatus, Player, Sport};
use crate::models::football::FootballRecords;

pub fn ctx_parts() -> (SnowflakeGenerator, DateTime<Utc>) {
    let now = Utc.with_ymd_and_hms(2026, 3, 14, 15, 0, 0).unwrap();
    (SnowflakeGenerator::new(1), now)
}

pub fn fixture(sport: Sport, format: &str) -> Fixture {
    Fixture {
        id: "mat_test".into(),
        tournament_id: Some("trn_test".into()),
        sport,
        home_team_id: "team_home".into(),
        away_team_id: "team_away".into(),
        scheduled_at: Utc.with_ymd_and_hms(2026, 3, 14, 14, 0, 0).unwrap(),
        status: MatchStatus::NotStarted,
        format: format.into(),
        toss_winner_id: None,
        toss_decision: None,
        winner_team_id: None,
        result: None,
        settled_at: None,
    }
}

/// Eleven players a side, `home_1..home_11` and `away_1..away_11`.
pub fn squads() -> Vec<Player> {
    ["home", "away"]
        .into_iter()
        .flat_map(|side| {
            (1..=11).map(move |n| Player {
                id: format!("{side}_{n}"),
                team_id: format!("team_{side}"),
                name: format!("{side} player {n}"),
            })
        })
        .collect()
}

pub fn cricket_records(format: &str) -> CricketRecords {
    CricketRecords {
        fixture: fixture(Sport::Cricket, format),
        players: squads(),
        innings: Vec::new(),
        batters: Vec::new(),
        bowlers: Vec::new(),
        last_ball: None,
    }
}

pub fn football_records() -> FootballRecords {
    FootballRecords {
        fixture: fixture(Sport::Football, "league"),
        players: squads(),
        periods: Vec::new(),
        incidents: Vec::new(),
        stats: Vec::new(),
    }
}
