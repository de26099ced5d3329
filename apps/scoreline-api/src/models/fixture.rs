use chrono::{DateTime, Utc};
use diesel::prelude::*;
use scoreline_common::id::prefix;
use scoreline_common::PrefixedId;
use serde::{Deserialize, Serialize};

use crate::db::schema::{fixtures, players};

text_enum! {
    pub enum Sport {
        Cricket => "cricket",
        Football => "football",
    }
}

text_enum! {
    /// Match lifecycle. One-way: `not_started → in_progress → finished`.
    pub enum MatchStatus {
        NotStarted => "not_started",
        InProgress => "in_progress",
        Finished => "finished",
    }
}

text_enum! {
    /// Innings/period lifecycle. One-way: `not_started → in_progress → completed`.
    pub enum PhaseStatus {
        NotStarted => "not_started",
        InProgress => "in_progress",
        Completed => "completed",
    }
}

text_enum! {
    pub enum TossDecision {
        Bat => "bat",
        Bowl => "bowl",
    }
}

/// One scheduled fixture between two teams.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable, Insertable, AsChangeset,
)]
#[diesel(table_name = fixtures, treat_none_as_null = true)]
pub struct Fixture {
    pub id: String,
    pub tournament_id: Option<String>,
    pub sport: Sport,
    pub home_team_id: String,
    pub away_team_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: MatchStatus,
    /// Format code, e.g. `t20`, `odi`, `test` for cricket or `league` for football.
    pub format: String,
    pub toss_winner_id: Option<String>,
    pub toss_decision: Option<TossDecision>,
    pub winner_team_id: Option<String>,
    pub result: Option<String>,
    /// Set once standings have been updated for this fixture.
    pub settled_at: Option<DateTime<Utc>>,
}

impl Fixture {
    pub fn involves(&self, team_id: &str) -> bool {
        self.home_team_id == team_id || self.away_team_id == team_id
    }

    pub fn opponent_of(&self, team_id: &str) -> Option<&str> {
        if self.home_team_id == team_id {
            Some(&self.away_team_id)
        } else if self.away_team_id == team_id {
            Some(&self.home_team_id)
        } else {
            None
        }
    }

    pub fn team_ids(&self) -> [String; 2] {
        [self.home_team_id.clone(), self.away_team_id.clone()]
    }
}

impl PrefixedId for Fixture {
    const PREFIX: &'static str = prefix::FIXTURE;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Queryable, Selectable, Insertable)]
#[diesel(table_name = players)]
pub struct Player {
    pub id: String,
    pub team_id: String,
    pub name: String,
}
