use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};

use crate::config::app_cache_dir;
use crate::error::{EngineError, Result};
use crate::import::{ContestRecord, TeamRecord};
use crate::model::{
    Confidence, Contest, ContestId, Prediction, PredictionSource, RatingSnapshot, ReferenceRank,
    Side, Team, TeamId, Tier, format_ts, parse_ts,
};

const BUSY_TIMEOUT_SECS: u64 = 5;

/// Result of a find-or-create-or-update write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Skipped,
}

#[derive(Debug, Clone, Default)]
pub struct PredictionFilter {
    pub season: Option<i32>,
    pub week: Option<u32>,
    pub team_id: Option<TeamId>,
    pub source: Option<PredictionSource>,
}

pub struct Store {
    conn: Connection,
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("ratings.sqlite"))
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))?;
        let store = Store { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Store { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS teams (
                team_id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                conference TEXT NOT NULL,
                tier TEXT NOT NULL,
                rating REAL NOT NULL DEFAULT 0,
                wins INTEGER NOT NULL DEFAULT 0,
                losses INTEGER NOT NULL DEFAULT 0,
                season INTEGER NULL,
                recruiting_rank INTEGER NULL,
                transfer_rank INTEGER NULL,
                returning_production REAL NULL
            );

            CREATE TABLE IF NOT EXISTS contests (
                contest_id INTEGER PRIMARY KEY,
                season INTEGER NOT NULL,
                week INTEGER NOT NULL,
                kickoff TEXT NOT NULL,
                home_team_id INTEGER NOT NULL REFERENCES teams(team_id),
                away_team_id INTEGER NOT NULL REFERENCES teams(team_id),
                neutral_site INTEGER NOT NULL,
                home_score INTEGER NULL,
                away_score INTEGER NULL,
                applied INTEGER NOT NULL DEFAULT 0,
                excluded INTEGER NOT NULL DEFAULT 0,
                home_delta REAL NULL,
                away_delta REAL NULL,
                applied_at TEXT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_contests_season_week ON contests(season, week);

            CREATE TABLE IF NOT EXISTS snapshots (
                team_id INTEGER NOT NULL REFERENCES teams(team_id),
                season INTEGER NOT NULL,
                week INTEGER NOT NULL,
                rating REAL NOT NULL,
                rank INTEGER NOT NULL,
                previous_rank INTEGER NULL,
                wins INTEGER NOT NULL,
                losses INTEGER NOT NULL,
                sos REAL NOT NULL,
                sos_rank INTEGER NOT NULL,
                taken_at TEXT NOT NULL,
                PRIMARY KEY (team_id, season, week)
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_period ON snapshots(season, week);

            CREATE TABLE IF NOT EXISTS predictions (
                contest_id INTEGER PRIMARY KEY REFERENCES contests(contest_id),
                season INTEGER NOT NULL,
                week INTEGER NOT NULL,
                home_team_id INTEGER NOT NULL,
                away_team_id INTEGER NOT NULL,
                home_rating REAL NOT NULL,
                away_rating REAL NOT NULL,
                home_prob REAL NOT NULL,
                away_prob REAL NOT NULL,
                predicted_winner TEXT NOT NULL,
                home_score REAL NOT NULL,
                away_score REAL NOT NULL,
                confidence TEXT NOT NULL,
                source TEXT NOT NULL,
                as_of TEXT NOT NULL,
                created_at TEXT NOT NULL,
                used_fallback INTEGER NOT NULL,
                correct INTEGER NULL
            );
            CREATE INDEX IF NOT EXISTS idx_predictions_period ON predictions(season, week);
            CREATE INDEX IF NOT EXISTS idx_predictions_created ON predictions(created_at);

            CREATE TABLE IF NOT EXISTS reference_rankings (
                season INTEGER NOT NULL,
                week INTEGER NOT NULL,
                poll TEXT NOT NULL,
                team_id INTEGER NOT NULL,
                rank INTEGER NOT NULL,
                PRIMARY KEY (season, week, poll, team_id)
            );

            CREATE TABLE IF NOT EXISTS backfill_runs (
                run_id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                finished_at TEXT NULL,
                season INTEGER NULL,
                examined INTEGER NOT NULL,
                created INTEGER NOT NULL,
                skipped_existing INTEGER NOT NULL,
                fallbacks INTEGER NOT NULL,
                errors_json TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Runs `f` inside `BEGIN IMMEDIATE`, so concurrent writers on the same
    /// database file serialize on the write lock before reading.
    pub(crate) fn immediate<T>(
        &mut self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    // ---- teams ----

    pub fn upsert_team(&self, rec: &TeamRecord) -> Result<UpsertOutcome> {
        let existing = read_team_opt(&self.conn, rec.id)?;
        let Some(existing) = existing else {
            self.conn.execute(
                "INSERT INTO teams (team_id, name, conference, tier, recruiting_rank, transfer_rank, returning_production)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    rec.id as i64,
                    rec.name,
                    rec.conference,
                    rec.tier.as_str(),
                    rec.recruiting_rank,
                    rec.transfer_rank,
                    rec.returning_production,
                ],
            )?;
            return Ok(UpsertOutcome::Inserted);
        };

        let unchanged = existing.name == rec.name
            && existing.conference == rec.conference
            && existing.tier == rec.tier
            && existing.recruiting_rank == rec.recruiting_rank
            && existing.transfer_rank == rec.transfer_rank
            && existing.returning_production.map(f64::to_bits)
                == rec.returning_production.map(f64::to_bits);
        if unchanged {
            return Ok(UpsertOutcome::Skipped);
        }

        // Live rating state is never touched from here.
        self.conn.execute(
            "UPDATE teams
             SET name = ?2, conference = ?3, tier = ?4,
                 recruiting_rank = ?5, transfer_rank = ?6, returning_production = ?7
             WHERE team_id = ?1",
            params![
                rec.id as i64,
                rec.name,
                rec.conference,
                rec.tier.as_str(),
                rec.recruiting_rank,
                rec.transfer_rank,
                rec.returning_production,
            ],
        )?;
        Ok(UpsertOutcome::Updated)
    }

    pub fn team(&self, team_id: TeamId) -> Result<Team> {
        read_team(&self.conn, team_id)
    }

    pub fn load_teams(&self) -> Result<Vec<Team>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TEAM_COLUMNS} FROM teams ORDER BY team_id"))?;
        let rows = stmt
            .query_map([], team_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Teams whose live state belongs to `season`, best rating first.
    pub fn live_ratings(&self, season: i32) -> Result<Vec<Team>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE season = ?1 ORDER BY rating DESC, name ASC"
        ))?;
        let rows = stmt
            .query_map(params![season], team_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ---- contests ----

    pub fn upsert_contest(&self, rec: &ContestRecord) -> Result<UpsertOutcome> {
        rec.validate()?;
        for team_id in [rec.home_team_id, rec.away_team_id] {
            if read_team_opt(&self.conn, team_id)?.is_none() {
                return Err(EngineError::UnknownTeam(team_id));
            }
        }

        let Some(existing) = read_contest_opt(&self.conn, rec.id)? else {
            self.conn.execute(
                "INSERT INTO contests (contest_id, season, week, kickoff, home_team_id, away_team_id,
                                       neutral_site, home_score, away_score, excluded)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    rec.id as i64,
                    rec.season,
                    rec.week,
                    format_ts(rec.kickoff),
                    rec.home_team_id as i64,
                    rec.away_team_id as i64,
                    rec.neutral_site,
                    rec.home_score,
                    rec.away_score,
                    rec.excluded,
                ],
            )?;
            return Ok(UpsertOutcome::Inserted);
        };

        if rec.matches(&existing) {
            return Ok(UpsertOutcome::Skipped);
        }
        if existing.applied {
            return Err(EngineError::AppliedContestChanged {
                contest_id: rec.id,
            });
        }

        self.conn.execute(
            "UPDATE contests
             SET season = ?2, week = ?3, kickoff = ?4, home_team_id = ?5, away_team_id = ?6,
                 neutral_site = ?7, home_score = ?8, away_score = ?9, excluded = ?10
             WHERE contest_id = ?1",
            params![
                rec.id as i64,
                rec.season,
                rec.week,
                format_ts(rec.kickoff),
                rec.home_team_id as i64,
                rec.away_team_id as i64,
                rec.neutral_site,
                rec.home_score,
                rec.away_score,
                rec.excluded,
            ],
        )?;
        Ok(UpsertOutcome::Updated)
    }

    pub fn contest(&self, contest_id: ContestId) -> Result<Contest> {
        read_contest(&self.conn, contest_id)
    }

    pub fn load_contests(&self, season: i32) -> Result<Vec<Contest>> {
        read_contests(&self.conn, season)
    }

    /// Completed contests (both scores present) not yet applied, in kickoff order.
    pub fn pending_contests(&self, season: i32, week: Option<u32>) -> Result<Vec<ContestId>> {
        let mut stmt = self.conn.prepare(
            "SELECT contest_id FROM contests
             WHERE season = ?1
               AND (?2 IS NULL OR week = ?2)
               AND applied = 0
               AND home_score IS NOT NULL
               AND away_score IS NOT NULL
             ORDER BY kickoff ASC, contest_id ASC",
        )?;
        let ids = stmt
            .query_map(params![season, week], |row| Ok(row.get::<_, i64>(0)? as u64))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // ---- snapshots ----

    pub fn load_snapshot(&self, season: i32, week: u32) -> Result<Vec<RatingSnapshot>> {
        read_snapshot(&self.conn, season, week)
    }

    pub fn snapshot_weeks(&self, season: i32) -> Result<Vec<u32>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT week FROM snapshots WHERE season = ?1 ORDER BY week ASC",
        )?;
        let weeks = stmt
            .query_map(params![season], |row| row.get::<_, u32>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(weeks)
    }

    // ---- predictions ----

    pub fn prediction_for(&self, contest_id: ContestId) -> Result<Option<Prediction>> {
        let pred = self
            .conn
            .query_row(
                &format!("SELECT {PREDICTION_COLUMNS} FROM predictions WHERE contest_id = ?1"),
                params![contest_id as i64],
                prediction_from_row,
            )
            .optional()?;
        Ok(pred)
    }

    pub fn load_predictions(&self, filter: &PredictionFilter) -> Result<Vec<Prediction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PREDICTION_COLUMNS} FROM predictions
             WHERE (?1 IS NULL OR season = ?1)
               AND (?2 IS NULL OR week = ?2)
               AND (?3 IS NULL OR home_team_id = ?3 OR away_team_id = ?3)
               AND (?4 IS NULL OR source = ?4)
             ORDER BY season ASC, week ASC, contest_id ASC"
        ))?;
        let rows = stmt
            .query_map(
                params![
                    filter.season,
                    filter.week,
                    filter.team_id.map(|id| id as i64),
                    filter.source.map(|s| s.as_str()),
                ],
                prediction_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ---- reference rankings ----

    pub fn upsert_reference_rank(&self, r: &ReferenceRank) -> Result<UpsertOutcome> {
        if r.rank == 0 {
            return Err(EngineError::OutOfDomain {
                field: "reference rank",
                value: "0".to_string(),
            });
        }
        let existing = self
            .conn
            .query_row(
                "SELECT rank FROM reference_rankings
                 WHERE season = ?1 AND week = ?2 AND poll = ?3 AND team_id = ?4",
                params![r.season, r.week, r.poll, r.team_id as i64],
                |row| row.get::<_, u32>(0),
            )
            .optional()?;
        match existing {
            Some(rank) if rank == r.rank => Ok(UpsertOutcome::Skipped),
            Some(_) => {
                self.conn.execute(
                    "UPDATE reference_rankings SET rank = ?5
                     WHERE season = ?1 AND week = ?2 AND poll = ?3 AND team_id = ?4",
                    params![r.season, r.week, r.poll, r.team_id as i64, r.rank],
                )?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                self.conn.execute(
                    "INSERT INTO reference_rankings (season, week, poll, team_id, rank)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![r.season, r.week, r.poll, r.team_id as i64, r.rank],
                )?;
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    pub fn reference_ranks(
        &self,
        season: i32,
        week: u32,
        poll: &str,
    ) -> Result<HashMap<TeamId, u32>> {
        let mut stmt = self.conn.prepare(
            "SELECT team_id, rank FROM reference_rankings
             WHERE season = ?1 AND week = ?2 AND poll = ?3",
        )?;
        let rows = stmt
            .query_map(params![season, week, poll], |row| {
                Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?))
            })?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }
}

const TEAM_COLUMNS: &str = "team_id, name, conference, tier, rating, wins, losses, season, \
     recruiting_rank, transfer_rank, returning_production";

const CONTEST_COLUMNS: &str = "contest_id, season, week, kickoff, home_team_id, away_team_id, \
     neutral_site, home_score, away_score, applied, excluded, home_delta, away_delta";

const PREDICTION_COLUMNS: &str = "contest_id, season, week, home_team_id, away_team_id, \
     home_rating, away_rating, home_prob, away_prob, predicted_winner, home_score, away_score, \
     confidence, source, as_of, created_at, used_fallback, correct";

fn conversion_error(idx: usize, err: EngineError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw).map_err(|e| conversion_error(idx, e))
}

fn enum_col<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        conversion_error(
            idx,
            EngineError::OutOfDomain {
                field: "stored enum",
                value: raw.clone(),
            },
        )
    })
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
        conference: row.get(2)?,
        tier: enum_col(row, 3, Tier::parse)?,
        rating: row.get(4)?,
        wins: row.get(5)?,
        losses: row.get(6)?,
        season: row.get(7)?,
        recruiting_rank: row.get(8)?,
        transfer_rank: row.get(9)?,
        returning_production: row.get(10)?,
    })
}

fn contest_from_row(row: &Row<'_>) -> rusqlite::Result<Contest> {
    Ok(Contest {
        id: row.get::<_, i64>(0)? as u64,
        season: row.get(1)?,
        week: row.get(2)?,
        kickoff: ts_col(row, 3)?,
        home_team_id: row.get(4)?,
        away_team_id: row.get(5)?,
        neutral_site: row.get(6)?,
        home_score: row.get(7)?,
        away_score: row.get(8)?,
        applied: row.get(9)?,
        excluded: row.get(10)?,
        home_delta: row.get(11)?,
        away_delta: row.get(12)?,
    })
}

fn prediction_from_row(row: &Row<'_>) -> rusqlite::Result<Prediction> {
    Ok(Prediction {
        contest_id: row.get::<_, i64>(0)? as u64,
        season: row.get(1)?,
        week: row.get(2)?,
        home_team_id: row.get(3)?,
        away_team_id: row.get(4)?,
        home_rating: row.get(5)?,
        away_rating: row.get(6)?,
        home_prob: row.get(7)?,
        away_prob: row.get(8)?,
        predicted_winner: enum_col(row, 9, Side::parse)?,
        home_score: row.get(10)?,
        away_score: row.get(11)?,
        confidence: enum_col(row, 12, Confidence::parse)?,
        source: enum_col(row, 13, PredictionSource::parse)?,
        as_of: ts_col(row, 14)?,
        created_at: ts_col(row, 15)?,
        used_fallback: row.get(16)?,
        correct: row.get(17)?,
    })
}

pub(crate) fn read_team_opt(conn: &Connection, team_id: TeamId) -> Result<Option<Team>> {
    let team = conn
        .query_row(
            &format!("SELECT {TEAM_COLUMNS} FROM teams WHERE team_id = ?1"),
            params![team_id as i64],
            team_from_row,
        )
        .optional()?;
    Ok(team)
}

pub(crate) fn read_team(conn: &Connection, team_id: TeamId) -> Result<Team> {
    read_team_opt(conn, team_id)?.ok_or(EngineError::UnknownTeam(team_id))
}

pub(crate) fn write_team_state(conn: &Connection, team: &Team) -> Result<()> {
    conn.execute(
        "UPDATE teams SET rating = ?2, wins = ?3, losses = ?4, season = ?5 WHERE team_id = ?1",
        params![
            team.id as i64,
            team.rating,
            team.wins,
            team.losses,
            team.season
        ],
    )?;
    Ok(())
}

pub(crate) fn read_contest_opt(conn: &Connection, contest_id: ContestId) -> Result<Option<Contest>> {
    let contest = conn
        .query_row(
            &format!("SELECT {CONTEST_COLUMNS} FROM contests WHERE contest_id = ?1"),
            params![contest_id as i64],
            contest_from_row,
        )
        .optional()?;
    Ok(contest)
}

pub(crate) fn read_contest(conn: &Connection, contest_id: ContestId) -> Result<Contest> {
    read_contest_opt(conn, contest_id)?.ok_or(EngineError::UnknownContest(contest_id))
}

pub(crate) fn read_contests(conn: &Connection, season: i32) -> Result<Vec<Contest>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONTEST_COLUMNS} FROM contests WHERE season = ?1
         ORDER BY week ASC, kickoff ASC, contest_id ASC"
    ))?;
    let rows = stmt
        .query_map(params![season], contest_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn set_contest_scores(
    conn: &Connection,
    contest_id: ContestId,
    home_score: u32,
    away_score: u32,
) -> Result<()> {
    conn.execute(
        "UPDATE contests SET home_score = ?2, away_score = ?3 WHERE contest_id = ?1",
        params![contest_id as i64, home_score, away_score],
    )?;
    Ok(())
}

pub(crate) fn mark_applied(
    conn: &Connection,
    contest_id: ContestId,
    home_delta: f64,
    away_delta: f64,
) -> Result<()> {
    conn.execute(
        "UPDATE contests
         SET applied = 1, home_delta = ?2, away_delta = ?3, applied_at = ?4
         WHERE contest_id = ?1",
        params![
            contest_id as i64,
            home_delta,
            away_delta,
            format_ts(Utc::now())
        ],
    )?;
    Ok(())
}

pub(crate) fn clear_applied(conn: &Connection, contest_id: ContestId) -> Result<()> {
    conn.execute(
        "UPDATE contests
         SET applied = 0, home_delta = NULL, away_delta = NULL, applied_at = NULL
         WHERE contest_id = ?1",
        params![contest_id as i64],
    )?;
    Ok(())
}

pub(crate) fn read_snapshot(
    conn: &Connection,
    season: i32,
    week: u32,
) -> Result<Vec<RatingSnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT s.team_id, t.name, s.season, s.week, s.rating, s.rank, s.previous_rank,
                s.wins, s.losses, s.sos, s.sos_rank
         FROM snapshots s JOIN teams t ON t.team_id = s.team_id
         WHERE s.season = ?1 AND s.week = ?2
         ORDER BY s.rank ASC, s.team_id ASC",
    )?;
    let rows = stmt
        .query_map(params![season, week], |row| {
            Ok(RatingSnapshot {
                team_id: row.get(0)?,
                team_name: row.get(1)?,
                season: row.get(2)?,
                week: row.get(3)?,
                rating: row.get(4)?,
                rank: row.get(5)?,
                previous_rank: row.get(6)?,
                wins: row.get(7)?,
                losses: row.get(8)?,
                sos: row.get(9)?,
                sos_rank: row.get(10)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn write_snapshot_rows(
    conn: &Connection,
    rows: &[RatingSnapshot],
    taken_at: DateTime<Utc>,
) -> Result<()> {
    let taken_at = format_ts(taken_at);
    let mut stmt = conn.prepare(
        "INSERT INTO snapshots (team_id, season, week, rating, rank, previous_rank,
                                wins, losses, sos, sos_rank, taken_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(team_id, season, week) DO UPDATE SET
             rating = excluded.rating,
             rank = excluded.rank,
             previous_rank = excluded.previous_rank,
             wins = excluded.wins,
             losses = excluded.losses,
             sos = excluded.sos,
             sos_rank = excluded.sos_rank,
             taken_at = excluded.taken_at",
    )?;
    for r in rows {
        stmt.execute(params![
            r.team_id as i64,
            r.season,
            r.week,
            r.rating,
            r.rank,
            r.previous_rank,
            r.wins,
            r.losses,
            r.sos,
            r.sos_rank,
            taken_at,
        ])?;
    }
    Ok(())
}

pub(crate) fn delete_snapshot_rows(conn: &Connection, season: i32, week: u32) -> Result<usize> {
    let n = conn.execute(
        "DELETE FROM snapshots WHERE season = ?1 AND week = ?2",
        params![season, week],
    )?;
    Ok(n)
}

/// Inserts unless the contest already has a prediction; returns whether a row was written.
pub(crate) fn insert_prediction(conn: &Connection, p: &Prediction) -> Result<bool> {
    let n = conn.execute(
        &format!(
            "INSERT INTO predictions ({PREDICTION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
             ON CONFLICT(contest_id) DO NOTHING"
        ),
        params![
            p.contest_id as i64,
            p.season,
            p.week,
            p.home_team_id as i64,
            p.away_team_id as i64,
            p.home_rating,
            p.away_rating,
            p.home_prob,
            p.away_prob,
            p.predicted_winner.as_str(),
            p.home_score,
            p.away_score,
            p.confidence.as_str(),
            p.source.as_str(),
            format_ts(p.as_of),
            format_ts(p.created_at),
            p.used_fallback,
            p.correct,
        ],
    )?;
    Ok(n == 1)
}

pub(crate) fn set_prediction_correct(
    conn: &Connection,
    contest_id: ContestId,
    correct: Option<bool>,
) -> Result<()> {
    conn.execute(
        "UPDATE predictions SET correct = ?2 WHERE contest_id = ?1",
        params![contest_id as i64, correct],
    )?;
    Ok(())
}

/// Contests without a stored prediction. `rated` selects applied contests;
/// otherwise scheduled ones (no score yet).
pub(crate) fn read_unpredicted_contests(
    conn: &Connection,
    season: Option<i32>,
    week: Option<u32>,
    rated: bool,
) -> Result<Vec<Contest>> {
    let state = if rated {
        "applied = 1 AND home_score IS NOT NULL AND away_score IS NOT NULL"
    } else {
        "applied = 0 AND home_score IS NULL AND away_score IS NULL"
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {CONTEST_COLUMNS} FROM contests
         WHERE {state}
           AND (?1 IS NULL OR season = ?1)
           AND (?2 IS NULL OR week = ?2)
           AND contest_id NOT IN (SELECT contest_id FROM predictions)
         ORDER BY season ASC, week ASC, kickoff ASC, contest_id ASC"
    ))?;
    let rows = stmt
        .query_map(params![season, week], contest_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
