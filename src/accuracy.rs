use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;

use log::info;
use serde::Serialize;

use crate::calibration::{self, CalibrationBin, Metrics};
use crate::error::Result;
use crate::model::{Contest, ContestId, Side, TeamId};
use crate::store::{self, PredictionFilter, Store};

const CALIBRATION_BINS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Tally {
    pub picks: usize,
    pub correct: usize,
}

impl Tally {
    fn record(&mut self, hit: bool) {
        self.picks += 1;
        if hit {
            self.correct += 1;
        }
    }

    pub fn rate(&self) -> f64 {
        if self.picks == 0 {
            0.0
        } else {
            self.correct as f64 / self.picks as f64
        }
    }
}

/// Contests where both the engine and the reference made a pick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HeadToHead {
    pub both_picked: usize,
    pub agreed: usize,
    pub engine_only_correct: usize,
    pub reference_only_correct: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WeekAccuracy {
    pub week: u32,
    pub engine: Tally,
    pub reference: Tally,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccuracyReport {
    pub season: i32,
    pub first_week: u32,
    pub last_week: u32,
    pub poll: String,
    pub engine: Tally,
    pub reference: Tally,
    pub head_to_head: HeadToHead,
    pub metrics: Metrics,
    pub bins: Vec<CalibrationBin>,
    pub calibration_error: f64,
    pub per_week: Vec<WeekAccuracy>,
}

/// The better-ranked team; a ranked team beats an unranked one; no pick when
/// neither is ranked.
pub fn reference_pick(ranks: &HashMap<TeamId, u32>, home: TeamId, away: TeamId) -> Option<TeamId> {
    match (ranks.get(&home), ranks.get(&away)) {
        (Some(h), Some(a)) if h < a => Some(home),
        (Some(h), Some(a)) if a < h => Some(away),
        (Some(_), Some(_)) => None,
        (Some(_), None) => Some(home),
        (None, Some(_)) => Some(away),
        (None, None) => None,
    }
}

fn winning_team(c: &Contest) -> Option<TeamId> {
    c.winner().map(|side| c.team_on(side))
}

/// Fills `correct` on every prediction whose contest has a decided result.
pub fn grade_predictions(store: &mut Store, season: i32) -> Result<usize> {
    let contests: HashMap<ContestId, Contest> = store
        .load_contests(season)?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();
    let preds = store.load_predictions(&PredictionFilter {
        season: Some(season),
        ..PredictionFilter::default()
    })?;

    let graded = store.immediate(|tx| {
        let mut n = 0;
        for p in &preds {
            let Some(winner) = contests.get(&p.contest_id).and_then(winning_team) else {
                continue;
            };
            let correct = p.predicted_team() == winner;
            if p.correct != Some(correct) {
                store::set_prediction_correct(tx, p.contest_id, Some(correct))?;
            }
            n += 1;
        }
        Ok(n)
    })?;
    info!("graded {graded} predictions for season {season}");
    Ok(graded)
}

pub fn compare(
    store: &Store,
    season: i32,
    weeks: RangeInclusive<u32>,
    poll: &str,
) -> Result<AccuracyReport> {
    let contests: HashMap<ContestId, Contest> = store
        .load_contests(season)?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();
    let preds = store.load_predictions(&PredictionFilter {
        season: Some(season),
        ..PredictionFilter::default()
    })?;

    let mut engine = Tally::default();
    let mut reference = Tally::default();
    let mut h2h = HeadToHead::default();
    let mut per_week: BTreeMap<u32, WeekAccuracy> = BTreeMap::new();
    let mut polls: HashMap<u32, HashMap<TeamId, u32>> = HashMap::new();
    let mut probs = Vec::new();
    let mut home_won = Vec::new();

    for p in preds.iter().filter(|p| weeks.contains(&p.week)) {
        let Some(contest) = contests.get(&p.contest_id) else {
            continue;
        };
        let Some(winner) = winning_team(contest) else {
            continue;
        };

        let week = per_week.entry(p.week).or_insert_with(|| WeekAccuracy {
            week: p.week,
            ..WeekAccuracy::default()
        });

        let engine_hit = p.predicted_team() == winner;
        engine.record(engine_hit);
        week.engine.record(engine_hit);
        probs.push(p.home_prob);
        home_won.push(contest.winner() == Some(Side::Home));

        if !polls.contains_key(&p.week) {
            polls.insert(p.week, store.reference_ranks(season, p.week, poll)?);
        }
        let ranks = &polls[&p.week];
        if let Some(pick) = reference_pick(ranks, contest.home_team_id, contest.away_team_id) {
            let ref_hit = pick == winner;
            reference.record(ref_hit);
            week.reference.record(ref_hit);

            h2h.both_picked += 1;
            if pick == p.predicted_team() {
                h2h.agreed += 1;
            } else if engine_hit {
                h2h.engine_only_correct += 1;
            } else if ref_hit {
                h2h.reference_only_correct += 1;
            }
        }
    }

    let bins = calibration::calibration_bins(&probs, &home_won, CALIBRATION_BINS);
    Ok(AccuracyReport {
        season,
        first_week: *weeks.start(),
        last_week: *weeks.end(),
        poll: poll.to_string(),
        engine,
        reference,
        head_to_head: h2h,
        metrics: calibration::evaluate_probs(&probs, &home_won),
        calibration_error: calibration::expected_calibration_error(&bins),
        bins,
        per_week: per_week.into_values().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_prefers_better_rank_then_any_rank() {
        let ranks: HashMap<TeamId, u32> = [(1, 3), (2, 12)].into_iter().collect();
        assert_eq!(reference_pick(&ranks, 1, 2), Some(1));
        assert_eq!(reference_pick(&ranks, 2, 1), Some(1));
        assert_eq!(reference_pick(&ranks, 2, 9), Some(2));
        assert_eq!(reference_pick(&ranks, 8, 9), None);
    }
}
