use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub type TeamId = u32;
pub type ContestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Top,
    Lower,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Top => "top",
            Tier::Lower => "lower",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "top" | "fbs" => Some(Tier::Top),
            "lower" | "fcs" => Some(Tier::Lower),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }

    pub fn other(self) -> Self {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "home" => Some(Side::Home),
            "away" => Some(Side::Away),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub conference: String,
    pub tier: Tier,
    pub rating: f64,
    pub wins: u32,
    pub losses: u32,
    /// Season the live rating belongs to; `None` until the preseason initializer runs.
    pub season: Option<i32>,
    pub recruiting_rank: Option<u32>,
    pub transfer_rank: Option<u32>,
    pub returning_production: Option<f64>,
}

impl Team {
    pub fn win_pct(&self) -> f64 {
        let games = self.wins + self.losses;
        if games == 0 {
            0.0
        } else {
            self.wins as f64 / games as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContestStatus {
    Scheduled,
    Completed,
    Rated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contest {
    pub id: ContestId,
    pub season: i32,
    pub week: u32,
    pub kickoff: DateTime<Utc>,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub neutral_site: bool,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub applied: bool,
    pub excluded: bool,
    pub home_delta: Option<f64>,
    pub away_delta: Option<f64>,
}

impl Contest {
    pub fn status(&self) -> ContestStatus {
        if self.applied {
            ContestStatus::Rated
        } else if self.final_score().is_some() {
            ContestStatus::Completed
        } else {
            ContestStatus::Scheduled
        }
    }

    pub fn final_score(&self) -> Option<(u32, u32)> {
        Some((self.home_score?, self.away_score?))
    }

    /// Winning side; `None` while unscored or tied.
    pub fn winner(&self) -> Option<Side> {
        let (h, a) = self.final_score()?;
        if h > a {
            Some(Side::Home)
        } else if a > h {
            Some(Side::Away)
        } else {
            None
        }
    }

    pub fn team_on(&self, side: Side) -> TeamId {
        match side {
            Side::Home => self.home_team_id,
            Side::Away => self.away_team_id,
        }
    }

    pub fn involves(&self, team_id: TeamId) -> bool {
        self.home_team_id == team_id || self.away_team_id == team_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deltas {
    pub home: f64,
    pub away: f64,
}

impl Deltas {
    pub const ZERO: Deltas = Deltas {
        home: 0.0,
        away: 0.0,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingSnapshot {
    pub team_id: TeamId,
    pub team_name: String,
    pub season: i32,
    pub week: u32,
    pub rating: f64,
    pub rank: u32,
    pub previous_rank: Option<u32>,
    pub wins: u32,
    pub losses: u32,
    pub sos: f64,
    pub sos_rank: u32,
}

/// Rebuilt ratings pass through a different summation order than the live
/// value, so equality allows float rounding.
pub const VALUE_TOLERANCE: f64 = 1e-9;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= VALUE_TOLERANCE
}

impl RatingSnapshot {
    /// Compares everything except derived display fields.
    pub fn same_values(&self, other: &RatingSnapshot) -> bool {
        self.team_id == other.team_id
            && self.season == other.season
            && self.week == other.week
            && close(self.rating, other.rating)
            && self.rank == other.rank
            && self.previous_rank == other.previous_rank
            && self.wins == other.wins
            && self.losses == other.losses
            && close(self.sos, other.sos)
            && self.sos_rank == other.sos_rank
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Low" => Some(Confidence::Low),
            "Medium" => Some(Confidence::Medium),
            "High" => Some(Confidence::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionSource {
    Prospective,
    Retrospective,
}

impl PredictionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionSource::Prospective => "prospective",
            PredictionSource::Retrospective => "retrospective",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "prospective" => Some(PredictionSource::Prospective),
            "retrospective" => Some(PredictionSource::Retrospective),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub contest_id: ContestId,
    pub season: i32,
    pub week: u32,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub home_rating: f64,
    pub away_rating: f64,
    pub home_prob: f64,
    pub away_prob: f64,
    pub predicted_winner: Side,
    pub home_score: f64,
    pub away_score: f64,
    pub confidence: Confidence,
    pub source: PredictionSource,
    pub as_of: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub used_fallback: bool,
    pub correct: Option<bool>,
}

impl Prediction {
    pub fn predicted_team(&self) -> TeamId {
        match self.predicted_winner {
            Side::Home => self.home_team_id,
            Side::Away => self.away_team_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRank {
    pub season: i32,
    pub week: u32,
    pub poll: String,
    pub team_id: TeamId,
    pub rank: u32,
}

/// Fixed-width UTC form so stored timestamps sort lexicographically.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| EngineError::BadTimestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn contest(home: Option<u32>, away: Option<u32>, applied: bool) -> Contest {
        Contest {
            id: 1,
            season: 2024,
            week: 1,
            kickoff: Utc.with_ymd_and_hms(2024, 8, 31, 19, 30, 0).unwrap(),
            home_team_id: 10,
            away_team_id: 20,
            neutral_site: false,
            home_score: home,
            away_score: away,
            applied,
            excluded: false,
            home_delta: None,
            away_delta: None,
        }
    }

    #[test]
    fn contest_status_follows_scores_and_applied_flag() {
        assert_eq!(contest(None, None, false).status(), ContestStatus::Scheduled);
        assert_eq!(contest(Some(3), None, false).status(), ContestStatus::Scheduled);
        assert_eq!(contest(Some(3), Some(0), false).status(), ContestStatus::Completed);
        assert_eq!(contest(Some(3), Some(0), true).status(), ContestStatus::Rated);
    }

    #[test]
    fn timestamps_sort_lexicographically() {
        let a = Utc.with_ymd_and_hms(2024, 9, 1, 9, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 10, 1, 9, 0, 0).unwrap();
        assert!(format_ts(a) < format_ts(b));
        assert_eq!(parse_ts(&format_ts(a)).unwrap(), a);
        assert!(parse_ts("not a date").is_err());
    }
}
