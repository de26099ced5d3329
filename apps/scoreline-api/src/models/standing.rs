use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::standings;

/// A team's row in a tournament table.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    Queryable,
    Selectable,
    Insertable,
    AsChangeset,
)]
#[diesel(table_name = standings, primary_key(tournament_id, team_id))]
pub struct Standing {
    pub tournament_id: String,
    pub team_id: String,
    pub played: i32,
    pub won: i32,
    pub lost: i32,
    pub drawn: i32,
    pub points: i32,
    /// Runs or goals scored.
    pub scored_for: i32,
    pub scored_against: i32,
}

impl Standing {
    pub fn empty(tournament_id: &str, team_id: &str) -> Self {
        Self {
            tournament_id: tournament_id.to_string(),
            team_id: team_id.to_string(),
            played: 0,
            won: 0,
            lost: 0,
            drawn: 0,
            points: 0,
            scored_for: 0,
            scored_against: 0,
        }
    }

    pub fn difference(&self) -> i32 {
        self.scored_for - self.scored_against
    }
}

/// Order a table: points, then difference, then scored, then team id.
pub fn sort_table(table: &mut [Standing]) {
    table.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| b.difference().cmp(&a.difference()))
            .then_with(|| b.scored_for.cmp(&a.scored_for))
            .then_with(|| a.team_id.cmp(&b.team_id))
    });
}
