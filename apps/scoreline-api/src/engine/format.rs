use super::error::EngineError;

/// Rules that vary between cricket formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CricketFormat {
    pub code: &'static str,
    /// Counted balls are capped at `max_overs * 6` per innings; `None` is unlimited.
    pub max_overs: Option<i32>,
    pub innings_per_side: i32,
    /// Dismissals that end an innings.
    pub max_wickets: i32,
    /// Whether a wide is one of the over's six deliveries. No-balls never are.
    pub wide_counts_toward_over: bool,
    pub max_overs_per_bowler: Option<i32>,
}

impl CricketFormat {
    pub const T10: Self = Self::limited("t10", 10, 2);
    pub const T20: Self = Self::limited("t20", 20, 4);
    pub const ODI: Self = Self::limited("odi", 50, 10);
    pub const TEST: Self = Self {
        code: "test",
        max_overs: None,
        innings_per_side: 2,
        max_wickets: 10,
        wide_counts_toward_over: true,
        max_overs_per_bowler: None,
    };

    const fn limited(code: &'static str, overs: i32, per_bowler: i32) -> Self {
        Self {
            code,
            max_overs: Some(overs),
            innings_per_side: 1,
            max_wickets: 10,
            wide_counts_toward_over: true,
            max_overs_per_bowler: Some(per_bowler),
        }
    }

    pub fn from_code(code: &str) -> Result<Self, EngineError> {
        match code {
            "t10" => Ok(Self::T10),
            "t20" => Ok(Self::T20),
            "odi" => Ok(Self::ODI),
            "test" => Ok(Self::TEST),
            other => Err(EngineError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn total_innings(&self) -> i32 {
        self.innings_per_side * 2
    }

    pub fn max_balls(&self) -> Option<i32> {
        self.max_overs.map(|overs| overs * crate::models::cricket::BALLS_PER_OVER)
    }
}

/// Rules that vary between football competitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootballFormat {
    pub code: &'static str,
    pub max_substitutions: i32,
}

impl Default for FootballFormat {
    fn default() -> Self {
        Self {
            code: "league",
            max_substitutions: 5,
        }
    }
}

impl FootballFormat {
    pub fn from_code(code: &str) -> Result<Self, EngineError> {
        match code {
            "league" => Ok(Self::default()),
            "cup" => Ok(Self {
                code: "cup",
                ..Self::default()
            }),
            other => Err(EngineError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limited_overs_formats_cap_balls() {
        assert_eq!(CricketFormat::from_code("t20").unwrap().max_balls(), Some(120));
        assert_eq!(CricketFormat::from_code("odi").unwrap().max_balls(), Some(300));
        assert_eq!(CricketFormat::TEST.max_balls(), None);
        assert_eq!(CricketFormat::TEST.total_innings(), 4);
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(
            CricketFormat::from_code("hundred"),
            Err(EngineError::UnsupportedFormat("hundred".into()))
        );
        assert!(FootballFormat::from_code("cup").is_ok());
    }
}
