//! Retrospective predictions from point-in-time snapshots, plus prospective
//! predictions from live ratings.
//!
//! A retrospective prediction for a week-N contest reads only the week N-1
//! snapshot, never the live ratings, so nothing the contest itself (or any
//! later result) taught the ratings can leak into it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use rayon::prelude::*;
use rusqlite::params;

use crate::config::{BackfillParams, EngineConfig, PreseasonConfig, WeekOneSource};
use crate::error::{EngineError, Result};
use crate::model::{
    Contest, ContestId, Prediction, PredictionSource, Team, TeamId, format_ts,
};
use crate::predict::{Forecast, Predictor};
use crate::preseason::tier_base;
use crate::store::{self, Store};

#[derive(Debug, Clone, Default)]
pub struct BackfillOptions {
    /// `None` covers every season.
    pub season: Option<i32>,
    pub dry_run: bool,
    /// Checked between contests; a stopped run can simply be re-run.
    pub stop: Option<Arc<AtomicBool>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    MissingSnapshot,
    WeekOneDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackNote {
    pub contest_id: ContestId,
    pub team_id: TeamId,
    pub snapshot_week: u32,
    pub reason: FallbackReason,
}

#[derive(Debug, Clone, Default)]
pub struct BackfillReport {
    pub run_id: Option<i64>,
    pub examined: usize,
    pub created: usize,
    pub skipped_existing: usize,
    pub fallbacks: Vec<FallbackNote>,
    pub errors: Vec<(ContestId, String)>,
    pub stopped: bool,
    /// Every computed prediction, written or not; the dry-run preview.
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Clone)]
struct Pending {
    contest: Contest,
    home_rating: f64,
    away_rating: f64,
    used_fallback: bool,
}

pub struct BackfillService {
    predictor: Predictor,
    params: BackfillParams,
    preseason: PreseasonConfig,
}

impl BackfillService {
    pub fn new(cfg: &EngineConfig) -> Self {
        Self {
            predictor: Predictor::new(cfg.rating, cfg.prediction),
            params: cfg.backfill,
            preseason: cfg.preseason.clone(),
        }
    }

    pub fn run(&self, store: &mut Store, opts: &BackfillOptions) -> Result<BackfillReport> {
        let started_at = Utc::now();
        let conn = store.connection();
        let contests = store::read_unpredicted_contests(conn, opts.season, None, true)?;
        let teams: HashMap<TeamId, Team> = store
            .load_teams()?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        let mut report = BackfillReport {
            examined: contests.len(),
            ..BackfillReport::default()
        };

        let mut snapshots: HashMap<(i32, u32), HashMap<TeamId, f64>> = HashMap::new();
        let mut pending = Vec::with_capacity(contests.len());
        for contest in contests {
            match self.historical_ratings(store, &mut snapshots, &teams, &contest) {
                Ok((home, away, notes)) => {
                    let used_fallback = !notes.is_empty();
                    report.fallbacks.extend(notes);
                    pending.push(Pending {
                        contest,
                        home_rating: home,
                        away_rating: away,
                        used_fallback,
                    });
                }
                Err(err) => report.errors.push((contest.id, err.to_string())),
            }
        }

        let lead = Duration::hours(self.params.as_of_lead_hours);
        let predictor = self.predictor;
        let computed: Vec<Prediction> = pending
            .par_iter()
            .map(|p| {
                let forecast =
                    predictor.predict(p.home_rating, p.away_rating, p.contest.neutral_site);
                build_prediction(
                    &p.contest,
                    p.home_rating,
                    p.away_rating,
                    &forecast,
                    PredictionSource::Retrospective,
                    p.contest.kickoff - lead,
                    p.used_fallback,
                )
            })
            .collect();

        if opts.dry_run {
            info!(
                "backfill preview: {} contests, {} predictions, {} fallbacks",
                report.examined,
                computed.len(),
                report.fallbacks.len()
            );
            report.predictions = computed;
            return Ok(report);
        }

        let run_id = start_run(store, started_at, opts.season, report.examined)?;
        report.run_id = Some(run_id);

        for mut pred in computed {
            if opts
                .stop
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
            {
                report.stopped = true;
                break;
            }
            pred.created_at = Utc::now();
            let contest_id = pred.contest_id;
            match store.immediate(|tx| store::insert_prediction(tx, &pred)) {
                Ok(true) => {
                    report.created += 1;
                    report.predictions.push(pred);
                }
                Ok(false) => {
                    debug!("contest {contest_id}: prediction already present");
                    report.skipped_existing += 1;
                }
                Err(err) => {
                    warn!("contest {contest_id}: prediction not stored: {err}");
                    report.errors.push((contest_id, err.to_string()));
                }
            }
        }

        finish_run(store, run_id, &report)?;
        info!(
            "backfill run {run_id}: {} examined, {} created, {} skipped, {} fallbacks, {} errors{}",
            report.examined,
            report.created,
            report.skipped_existing,
            report.fallbacks.len(),
            report.errors.len(),
            if report.stopped { " (stopped)" } else { "" }
        );
        Ok(report)
    }

    /// Ratings each side held entering the contest's week.
    fn historical_ratings(
        &self,
        store: &Store,
        cache: &mut HashMap<(i32, u32), HashMap<TeamId, f64>>,
        teams: &HashMap<TeamId, Team>,
        contest: &Contest,
    ) -> Result<(f64, f64, Vec<FallbackNote>)> {
        let snapshot_week = contest.week.saturating_sub(1);
        let use_default = snapshot_week == 0 && self.params.week_one == WeekOneSource::DefaultRating;

        if !use_default && !cache.contains_key(&(contest.season, snapshot_week)) {
            let rows = store.load_snapshot(contest.season, snapshot_week)?;
            cache.insert(
                (contest.season, snapshot_week),
                rows.into_iter().map(|r| (r.team_id, r.rating)).collect(),
            );
        }

        let mut notes = Vec::new();
        let mut rating_for = |team_id: TeamId| -> Result<f64> {
            let team = teams.get(&team_id).ok_or(EngineError::UnknownTeam(team_id))?;
            if !use_default
                && let Some(r) = cache
                    .get(&(contest.season, snapshot_week))
                    .and_then(|m| m.get(&team_id))
            {
                return Ok(*r);
            }
            let reason = if use_default {
                FallbackReason::WeekOneDefault
            } else {
                warn!(
                    "contest {}: no week {snapshot_week} snapshot for team {team_id}, using tier default",
                    contest.id
                );
                FallbackReason::MissingSnapshot
            };
            notes.push(FallbackNote {
                contest_id: contest.id,
                team_id,
                snapshot_week,
                reason,
            });
            Ok(tier_base(&self.preseason, team.tier))
        };

        let home = rating_for(contest.home_team_id)?;
        let away = rating_for(contest.away_team_id)?;
        Ok((home, away, notes))
    }

    /// Prospective predictions from live ratings for contests not yet played.
    pub fn predict_scheduled(
        &self,
        store: &mut Store,
        season: i32,
        week: Option<u32>,
    ) -> Result<BackfillReport> {
        let contests =
            store::read_unpredicted_contests(store.connection(), Some(season), week, false)?;
        let mut report = BackfillReport {
            examined: contests.len(),
            ..BackfillReport::default()
        };
        let predictor = self.predictor;

        for contest in contests {
            let contest_id = contest.id;
            let outcome = store.immediate(|tx| {
                let home = store::read_team(tx, contest.home_team_id)?;
                let away = store::read_team(tx, contest.away_team_id)?;
                for t in [&home, &away] {
                    if t.season != Some(contest.season) {
                        return Err(EngineError::SeasonMismatch {
                            team_id: t.id,
                            expected: contest.season,
                            found: t.season,
                        });
                    }
                }
                let forecast = predictor.predict(home.rating, away.rating, contest.neutral_site);
                let now = Utc::now();
                let pred = build_prediction(
                    &contest,
                    home.rating,
                    away.rating,
                    &forecast,
                    PredictionSource::Prospective,
                    now,
                    false,
                );
                let written = store::insert_prediction(tx, &pred)?;
                Ok((written, pred))
            });
            match outcome {
                Ok((true, pred)) => {
                    report.created += 1;
                    report.predictions.push(pred);
                }
                Ok((false, _)) => report.skipped_existing += 1,
                Err(err) => {
                    warn!("contest {contest_id}: no prospective prediction: {err}");
                    report.errors.push((contest_id, err.to_string()));
                }
            }
        }

        info!(
            "prospective {season}: {} created, {} skipped, {} errors",
            report.created,
            report.skipped_existing,
            report.errors.len()
        );
        Ok(report)
    }
}

/// Deletes retrospective predictions written in `[from, to)`. With `dry_run`
/// only counts them.
pub fn rollback(
    store: &mut Store,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    dry_run: bool,
) -> Result<usize> {
    if from >= to {
        return Err(EngineError::OutOfDomain {
            field: "rollback window",
            value: format!("{} .. {}", format_ts(from), format_ts(to)),
        });
    }
    let (from_s, to_s) = (format_ts(from), format_ts(to));
    let source = PredictionSource::Retrospective.as_str();
    store.immediate(|tx| {
        let n = if dry_run {
            tx.query_row(
                "SELECT COUNT(*) FROM predictions
                 WHERE source = ?1 AND created_at >= ?2 AND created_at < ?3",
                params![source, from_s, to_s],
                |row| row.get::<_, i64>(0),
            )? as usize
        } else {
            tx.execute(
                "DELETE FROM predictions
                 WHERE source = ?1 AND created_at >= ?2 AND created_at < ?3",
                params![source, from_s, to_s],
            )?
        };
        if !dry_run {
            info!("rollback removed {n} retrospective predictions in [{from_s}, {to_s})");
        }
        Ok(n)
    })
}

fn build_prediction(
    contest: &Contest,
    home_rating: f64,
    away_rating: f64,
    f: &Forecast,
    source: PredictionSource,
    as_of: DateTime<Utc>,
    used_fallback: bool,
) -> Prediction {
    Prediction {
        contest_id: contest.id,
        season: contest.season,
        week: contest.week,
        home_team_id: contest.home_team_id,
        away_team_id: contest.away_team_id,
        home_rating,
        away_rating,
        home_prob: f.home_prob,
        away_prob: f.away_prob,
        predicted_winner: f.winner,
        home_score: f.home_score,
        away_score: f.away_score,
        confidence: f.confidence,
        source,
        as_of,
        created_at: Utc::now(),
        used_fallback,
        correct: None,
    }
}

fn start_run(
    store: &Store,
    started_at: DateTime<Utc>,
    season: Option<i32>,
    examined: usize,
) -> Result<i64> {
    let conn = store.connection();
    conn.execute(
        "INSERT INTO backfill_runs (started_at, finished_at, season, examined, created, skipped_existing, fallbacks, errors_json)
         VALUES (?1, NULL, ?2, ?3, 0, 0, 0, '[]')",
        params![format_ts(started_at), season, examined as i64],
    )?;
    Ok(conn.last_insert_rowid())
}

fn finish_run(store: &Store, run_id: i64, report: &BackfillReport) -> Result<()> {
    let errors = report
        .errors
        .iter()
        .map(|(id, err)| format!("contest {id}: {err}"))
        .collect::<Vec<_>>();
    let errors_json = serde_json::to_string(&errors)?;
    store.connection().execute(
        "UPDATE backfill_runs
         SET finished_at = ?1, created = ?2, skipped_existing = ?3, fallbacks = ?4, errors_json = ?5
         WHERE run_id = ?6",
        params![
            format_ts(Utc::now()),
            report.created as i64,
            report.skipped_existing as i64,
            report.fallbacks.len() as i64,
            errors_json,
            run_id
        ],
    )?;
    Ok(())
}
