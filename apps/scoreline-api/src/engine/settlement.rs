//! One-time post-match settlement: winner bookkeeping and standings.

use chrono::{DateTime, Utc};

use super::error::{EngineError, EngineResult};
use crate::models::fixture::{Fixture, MatchStatus, Sport};
use crate::models::standing::{sort_table, Standing};
use crate::models::Change;

/// Final aggregate result of a finished match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// `None` for a tie or draw.
    pub winner_team_id: Option<String>,
    pub home_score: i32,
    pub away_score: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Points {
    pub win: i32,
    pub draw: i32,
}

impl Points {
    pub fn for_sport(sport: Sport) -> Self {
        match sport {
            Sport::Cricket => Self { win: 2, draw: 1 },
            Sport::Football => Self { win: 3, draw: 1 },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub changes: Vec<Change>,
    /// The whole tournament table after settlement, best first. Empty for friendlies.
    pub table: Vec<Standing>,
}

/// Settles a finished fixture against its tournament table.
///
/// Returns `Ok(None)` when the fixture has already been settled, so a second
/// call never counts the result twice.
pub fn settle(
    fixture: &Fixture,
    outcome: &MatchOutcome,
    table: &[Standing],
    now: DateTime<Utc>,
) -> EngineResult<Option<Settlement>> {
    if fixture.status != MatchStatus::Finished {
        return Err(EngineError::MatchNotFinished);
    }
    if fixture.settled_at.is_some() {
        return Ok(None);
    }

    let mut settled = fixture.clone();
    settled.settled_at = Some(now);
    let mut changes = vec![Change::Fixture(settled)];
    let mut table = table.to_vec();

    if let Some(tournament_id) = &fixture.tournament_id {
        let points = Points::for_sport(fixture.sport);
        let sides = [
            (&fixture.home_team_id, outcome.home_score, outcome.away_score),
            (&fixture.away_team_id, outcome.away_score, outcome.home_score),
        ];
        for (team_id, scored, conceded) in sides {
            let idx = match table.iter().position(|s| &s.team_id == team_id) {
                Some(idx) => idx,
                None => {
                    table.push(Standing::empty(tournament_id, team_id));
                    table.len() - 1
                }
            };
            let row = &mut table[idx];
            row.played += 1;
            row.scored_for += scored;
            row.scored_against += conceded;
            match outcome.winner_team_id.as_ref() {
                None => {
                    row.drawn += 1;
                    row.points += points.draw;
                }
                Some(winner) if winner == team_id => {
                    row.won += 1;
                    row.points += points.win;
                }
                Some(_) => row.lost += 1,
            }
            changes.push(Change::Standing(row.clone()));
        }
        sort_table(&mut table);
    }

    Ok(Some(Settlement { changes, table }))
}
