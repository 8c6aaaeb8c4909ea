use thiserror::Error;

use crate::model::{ContestId, TeamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Storage,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("contest {contest_id} has no final score")]
    MissingScores { contest_id: ContestId },

    #[error("contest {contest_id} ended tied {score}-{score}; ties are not rated")]
    TiedScore { contest_id: ContestId, score: u32 },

    #[error("{field} out of domain: {value}")]
    OutOfDomain { field: &'static str, value: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("team {team_id} live state belongs to season {found:?}, expected {expected}")]
    SeasonMismatch {
        team_id: TeamId,
        expected: i32,
        found: Option<i32>,
    },

    #[error("contest {contest_id} has not been applied")]
    NotApplied { contest_id: ContestId },

    #[error("contest {contest_id} is already applied; use a score correction instead")]
    AppliedContestChanged { contest_id: ContestId },

    #[error("team {team_id} already initialized for season {season}")]
    AlreadyInitialized { team_id: TeamId, season: i32 },

    #[error("snapshot for season {season} week {week} already closed; {changed} team row(s) differ")]
    SnapshotConflict { season: i32, week: u32, changed: usize },

    #[error("unknown team: {0}")]
    UnknownTeam(TeamId),

    #[error("unknown contest: {0}")]
    UnknownContest(ContestId),

    #[error("bad timestamp {0:?}")]
    BadTimestamp(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::MissingScores { .. }
            | EngineError::TiedScore { .. }
            | EngineError::OutOfDomain { .. }
            | EngineError::InvalidConfig(_)
            | EngineError::SeasonMismatch { .. }
            | EngineError::BadTimestamp(_) => ErrorKind::Validation,
            EngineError::NotApplied { .. }
            | EngineError::AppliedContestChanged { .. }
            | EngineError::AlreadyInitialized { .. }
            | EngineError::SnapshotConflict { .. } => ErrorKind::Conflict,
            EngineError::UnknownTeam(_) | EngineError::UnknownContest(_) => ErrorKind::NotFound,
            EngineError::Database(_) | EngineError::Json(_) | EngineError::Io(_) => {
                ErrorKind::Storage
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
