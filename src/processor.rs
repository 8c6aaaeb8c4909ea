//! Applies completed contests to live ratings exactly once.

use log::{debug, info, warn};
use rusqlite::Connection;

use crate::config::RatingParams;
use crate::error::{EngineError, Result};
use crate::model::{Contest, ContestId, Deltas, Team};
use crate::rating::{self, GameInput};
use crate::store::{self, Store};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ApplyOutcome {
    Applied(Deltas),
    /// Nothing mutated; carries the deltas recorded by the first application.
    AlreadyApplied(Deltas),
    /// Marked applied with zero effect on ratings and records.
    Excluded,
}

impl ApplyOutcome {
    pub fn deltas(&self) -> Deltas {
        match self {
            ApplyOutcome::Applied(d) | ApplyOutcome::AlreadyApplied(d) => *d,
            ApplyOutcome::Excluded => Deltas::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub applied: Vec<(ContestId, Deltas)>,
    pub already_applied: Vec<ContestId>,
    pub excluded: Vec<ContestId>,
    pub failures: Vec<(ContestId, String)>,
}

#[derive(Debug, Clone, Copy)]
pub struct GameProcessor {
    params: RatingParams,
}

impl GameProcessor {
    pub fn new(params: RatingParams) -> Self {
        Self { params }
    }

    /// `completed -> rated`. The applied flag is re-read under the write lock,
    /// so a concurrent second call observes it and becomes a no-op.
    pub fn apply(&self, store: &mut Store, contest_id: ContestId) -> Result<ApplyOutcome> {
        store.immediate(|tx| self.apply_in(tx, contest_id))
    }

    /// Undoes a previous application: subtracts the stored deltas and the
    /// win/loss it recorded, and returns the contest to `completed`.
    pub fn reverse(&self, store: &mut Store, contest_id: ContestId) -> Result<Deltas> {
        store.immediate(|tx| reverse_in(tx, contest_id))
    }

    /// Administrative rescore: reverse (when applied), rewrite the score, re-apply.
    pub fn correct_score(
        &self,
        store: &mut Store,
        contest_id: ContestId,
        home_score: u32,
        away_score: u32,
    ) -> Result<ApplyOutcome> {
        if home_score == away_score {
            return Err(EngineError::TiedScore {
                contest_id,
                score: home_score,
            });
        }
        store.immediate(|tx| {
            let contest = store::read_contest(tx, contest_id)?;
            if contest.applied {
                let undone = reverse_in(tx, contest_id)?;
                debug!(
                    "contest {contest_id}: reversed {:+.2}/{:+.2} before rescore",
                    undone.home, undone.away
                );
            }
            store::set_contest_scores(tx, contest_id, home_score, away_score)?;
            self.apply_in(tx, contest_id)
        })
    }

    /// Applies every completed, unapplied contest of `season` (optionally one
    /// week) in kickoff order. Failures are collected per contest.
    pub fn process_pending(
        &self,
        store: &mut Store,
        season: i32,
        week: Option<u32>,
    ) -> Result<BatchReport> {
        let ids = store.pending_contests(season, week)?;
        let mut report = BatchReport::default();

        for id in ids {
            match self.apply(store, id) {
                Ok(ApplyOutcome::Applied(d)) => report.applied.push((id, d)),
                Ok(ApplyOutcome::AlreadyApplied(_)) => report.already_applied.push(id),
                Ok(ApplyOutcome::Excluded) => report.excluded.push(id),
                Err(err) => {
                    warn!("contest {id} not applied: {err}");
                    report.failures.push((id, err.to_string()));
                }
            }
        }

        info!(
            "season {season} week {}: {} applied, {} excluded, {} already applied, {} failed",
            week.map(|w| w.to_string()).unwrap_or_else(|| "*".to_string()),
            report.applied.len(),
            report.excluded.len(),
            report.already_applied.len(),
            report.failures.len()
        );
        Ok(report)
    }

    fn apply_in(&self, conn: &Connection, contest_id: ContestId) -> Result<ApplyOutcome> {
        let contest = store::read_contest(conn, contest_id)?;

        if contest.applied {
            return Ok(ApplyOutcome::AlreadyApplied(Deltas {
                home: contest.home_delta.unwrap_or(0.0),
                away: contest.away_delta.unwrap_or(0.0),
            }));
        }

        let (home_score, away_score) = contest
            .final_score()
            .ok_or(EngineError::MissingScores { contest_id })?;

        if contest.excluded {
            store::mark_applied(conn, contest_id, 0.0, 0.0)?;
            debug!("contest {contest_id}: excluded from rating, marked applied");
            return Ok(ApplyOutcome::Excluded);
        }

        if home_score == away_score {
            return Err(EngineError::TiedScore {
                contest_id,
                score: home_score,
            });
        }

        let mut home = season_team(conn, &contest, contest.home_team_id)?;
        let mut away = season_team(conn, &contest, contest.away_team_id)?;

        let deltas = rating::compute_deltas(
            &self.params,
            &GameInput {
                home_rating: home.rating,
                away_rating: away.rating,
                home_tier: home.tier,
                away_tier: away.tier,
                neutral_site: contest.neutral_site,
                home_score,
                away_score,
            },
        );

        home.rating += deltas.home;
        away.rating += deltas.away;
        if home_score > away_score {
            home.wins += 1;
            away.losses += 1;
        } else {
            away.wins += 1;
            home.losses += 1;
        }

        store::write_team_state(conn, &home)?;
        store::write_team_state(conn, &away)?;
        store::mark_applied(conn, contest_id, deltas.home, deltas.away)?;

        debug!(
            "contest {contest_id}: {} {:+.2} -> {:.1}, {} {:+.2} -> {:.1}",
            home.name, deltas.home, home.rating, away.name, deltas.away, away.rating
        );
        Ok(ApplyOutcome::Applied(deltas))
    }
}

fn season_team(conn: &Connection, contest: &Contest, team_id: u32) -> Result<Team> {
    let team = store::read_team(conn, team_id)?;
    if team.season != Some(contest.season) {
        return Err(EngineError::SeasonMismatch {
            team_id,
            expected: contest.season,
            found: team.season,
        });
    }
    Ok(team)
}

fn reverse_in(conn: &Connection, contest_id: ContestId) -> Result<Deltas> {
    let contest = store::read_contest(conn, contest_id)?;
    if !contest.applied {
        return Err(EngineError::NotApplied { contest_id });
    }

    if contest.excluded {
        store::clear_applied(conn, contest_id)?;
        return Ok(Deltas::ZERO);
    }

    let deltas = Deltas {
        home: contest.home_delta.unwrap_or(0.0),
        away: contest.away_delta.unwrap_or(0.0),
    };
    let (home_score, away_score) = contest
        .final_score()
        .ok_or(EngineError::MissingScores { contest_id })?;

    let mut home = season_team(conn, &contest, contest.home_team_id)?;
    let mut away = season_team(conn, &contest, contest.away_team_id)?;
    home.rating -= deltas.home;
    away.rating -= deltas.away;
    if home_score > away_score {
        home.wins = home.wins.saturating_sub(1);
        away.losses = away.losses.saturating_sub(1);
    } else {
        away.wins = away.wins.saturating_sub(1);
        home.losses = home.losses.saturating_sub(1);
    }

    store::write_team_state(conn, &home)?;
    store::write_team_state(conn, &away)?;
    store::clear_applied(conn, contest_id)?;
    Ok(deltas)
}
