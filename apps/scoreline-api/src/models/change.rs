use super::cricket::{Ball, BatterInnings, BowlerSpell, Innings, Wicket};
use super::fixture::Fixture;
use super::football::{Incident, PeriodScore, TeamStats};
use super::standing::Standing;

/// One persisted write derived from an engine operation.
///
/// Append-only records (`Ball`, `Wicket`, `Incident`) are inserts; every
/// other variant replaces the row identified by its key.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Fixture(Fixture),
    Innings(Innings),
    Batter(BatterInnings),
    Bowler(BowlerSpell),
    Ball(Ball),
    Wicket(Wicket),
    Period(PeriodScore),
    Incident(Incident),
    Stats(TeamStats),
    Standing(Standing),
}

impl Change {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fixture(_) => "fixture",
            Self::Innings(_) => "innings",
            Self::Batter(_) => "batter",
            Self::Bowler(_) => "bowler",
            Self::Ball(_) => "ball",
            Self::Wicket(_) => "wicket",
            Self::Period(_) => "period",
            Self::Incident(_) => "incident",
            Self::Stats(_) => "stats",
            Self::Standing(_) => "standing",
        }
    }
}
