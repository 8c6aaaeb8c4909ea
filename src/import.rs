use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{EngineError, Result};
use crate::model::{Contest, ContestId, ReferenceRank, TeamId, Tier};
use crate::store::{Store, UpsertOutcome};

#[derive(Debug, Clone, Deserialize)]
pub struct TeamRecord {
    pub id: TeamId,
    pub name: String,
    #[serde(default)]
    pub conference: String,
    pub tier: Tier,
    #[serde(default)]
    pub recruiting_rank: Option<u32>,
    #[serde(default)]
    pub transfer_rank: Option<u32>,
    #[serde(default)]
    pub returning_production: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContestRecord {
    pub id: ContestId,
    pub season: i32,
    pub week: u32,
    pub kickoff: DateTime<Utc>,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    #[serde(default)]
    pub neutral_site: bool,
    #[serde(default)]
    pub home_score: Option<u32>,
    #[serde(default)]
    pub away_score: Option<u32>,
    #[serde(default)]
    pub excluded: bool,
}

impl ContestRecord {
    pub fn validate(&self) -> Result<()> {
        if self.home_team_id == self.away_team_id {
            return Err(EngineError::OutOfDomain {
                field: "contest participants",
                value: format!("team {} plays itself", self.home_team_id),
            });
        }
        if self.home_score.is_some() != self.away_score.is_some() {
            return Err(EngineError::OutOfDomain {
                field: "contest score",
                value: format!("{:?}-{:?}", self.home_score, self.away_score),
            });
        }
        Ok(())
    }

    /// True when every ingest-owned field already equals the stored contest.
    pub fn matches(&self, c: &Contest) -> bool {
        self.season == c.season
            && self.week == c.week
            && self.kickoff == c.kickoff
            && self.home_team_id == c.home_team_id
            && self.away_team_id == c.away_team_id
            && self.neutral_site == c.neutral_site
            && self.home_score == c.home_score
            && self.away_score == c.away_score
            && self.excluded == c.excluded
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl ImportSummary {
    fn record(&mut self, key: impl std::fmt::Display, outcome: Result<UpsertOutcome>) {
        match outcome {
            Ok(UpsertOutcome::Inserted) => self.inserted += 1,
            Ok(UpsertOutcome::Updated) => self.updated += 1,
            Ok(UpsertOutcome::Skipped) => self.skipped += 1,
            Err(err) => {
                warn!("import {key} failed: {err}");
                self.errors.push(format!("{key}: {err}"));
            }
        }
    }
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str::<Vec<T>>(&raw)?)
}

pub fn import_teams(store: &Store, records: &[TeamRecord]) -> ImportSummary {
    let mut summary = ImportSummary::default();
    for rec in records {
        summary.record(format!("team {}", rec.id), store.upsert_team(rec));
    }
    info!(
        "teams: {} inserted, {} updated, {} unchanged, {} errors",
        summary.inserted,
        summary.updated,
        summary.skipped,
        summary.errors.len()
    );
    summary
}

pub fn import_contests(store: &Store, records: &[ContestRecord]) -> ImportSummary {
    let mut summary = ImportSummary::default();
    for rec in records {
        summary.record(format!("contest {}", rec.id), store.upsert_contest(rec));
    }
    info!(
        "contests: {} inserted, {} updated, {} unchanged, {} errors",
        summary.inserted,
        summary.updated,
        summary.skipped,
        summary.errors.len()
    );
    summary
}

pub fn import_reference_ranks(store: &Store, records: &[ReferenceRank]) -> ImportSummary {
    let mut summary = ImportSummary::default();
    for rec in records {
        summary.record(
            format!("{} s{} w{} team {}", rec.poll, rec.season, rec.week, rec.team_id),
            store.upsert_reference_rank(rec),
        );
    }
    summary
}
