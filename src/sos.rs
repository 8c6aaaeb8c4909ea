//! Strength of schedule, recomputed from contest history alone.
//!
//! An opponent's rating "as of" week W is its live rating minus the deltas of
//! its applied contests after W, so a past week's value can be reproduced at
//! any later time.

use std::collections::HashMap;

use crate::config::{RatingParams, SosParams};
use crate::error::Result;
use crate::model::{Contest, Team, TeamId};
use crate::rating::expected_score;
use crate::store::Store;

pub const NEUTRAL_SOS: f64 = 0.0;

fn qualifies(c: &Contest, season: i32) -> bool {
    c.season == season && c.applied && !c.excluded && c.winner().is_some()
}

/// Live rating rolled back to the end of `through_week`.
pub fn ratings_as_of(
    teams: &[Team],
    contests: &[Contest],
    season: i32,
    through_week: u32,
) -> HashMap<TeamId, f64> {
    let mut out: HashMap<TeamId, f64> = teams.iter().map(|t| (t.id, t.rating)).collect();
    for c in contests
        .iter()
        .filter(|c| c.season == season && c.applied && c.week > through_week)
    {
        if let Some(r) = out.get_mut(&c.home_team_id) {
            *r -= c.home_delta.unwrap_or(0.0);
        }
        if let Some(r) = out.get_mut(&c.away_team_id) {
            *r -= c.away_delta.unwrap_or(0.0);
        }
    }
    out
}

/// Wins and losses from rated contests through `through_week`.
pub fn records_as_of(
    contests: &[Contest],
    season: i32,
    through_week: u32,
) -> HashMap<TeamId, (u32, u32)> {
    let mut out: HashMap<TeamId, (u32, u32)> = HashMap::new();
    for c in contests
        .iter()
        .filter(|c| qualifies(c, season) && c.week <= through_week)
    {
        let Some(side) = c.winner() else { continue };
        out.entry(c.team_on(side)).or_default().0 += 1;
        out.entry(c.team_on(side.other())).or_default().1 += 1;
    }
    out
}

/// SOS for every team; teams without a qualifying contest get [`NEUTRAL_SOS`].
pub fn compute_all(
    teams: &[Team],
    contests: &[Contest],
    season: i32,
    through_week: u32,
    rating: &RatingParams,
    params: &SosParams,
) -> HashMap<TeamId, f64> {
    let played: Vec<&Contest> = contests
        .iter()
        .filter(|c| qualifies(c, season) && c.week <= through_week)
        .collect();
    let as_of = ratings_as_of(teams, contests, season, through_week);

    let mut opponents: HashMap<TeamId, Vec<TeamId>> = HashMap::new();
    for c in &played {
        opponents.entry(c.home_team_id).or_default().push(c.away_team_id);
        opponents.entry(c.away_team_id).or_default().push(c.home_team_id);
    }

    let mut out = HashMap::with_capacity(teams.len());
    for team in teams {
        let Some(opps) = opponents.get(&team.id).filter(|o| !o.is_empty()) else {
            out.insert(team.id, NEUTRAL_SOS);
            continue;
        };

        let strength = opps
            .iter()
            .map(|opp| {
                let r = as_of.get(opp).copied().unwrap_or(params.baseline_rating);
                expected_score(r, params.baseline_rating, rating.logistic_scale)
            })
            .sum::<f64>()
            / opps.len() as f64;

        let (wins, games) = opps.iter().fold((0u32, 0u32), |(w, g), opp| {
            let (ow, og) = record_excluding(&played, *opp, team.id);
            (w + ow, g + og)
        });
        let opp_win_pct = if games == 0 {
            0.5
        } else {
            wins as f64 / games as f64
        };

        let score = 100.0
            * (params.rating_weight * (strength - 0.5)
                + params.record_weight * (opp_win_pct - 0.5));
        out.insert(team.id, score);
    }
    out
}

/// Wins and games for `team`, ignoring its games against `excluded`.
fn record_excluding(played: &[&Contest], team: TeamId, excluded: TeamId) -> (u32, u32) {
    let mut wins = 0;
    let mut games = 0;
    for c in played {
        if !c.involves(team) || c.involves(excluded) {
            continue;
        }
        games += 1;
        if c.winner().map(|side| c.team_on(side)) == Some(team) {
            wins += 1;
        }
    }
    (wins, games)
}

pub fn sos(
    store: &Store,
    rating: &RatingParams,
    params: &SosParams,
    team_id: TeamId,
    season: i32,
    through_week: u32,
) -> Result<f64> {
    let team = store.team(team_id)?;
    let teams = store.load_teams()?;
    let contests = store.load_contests(season)?;
    let all = compute_all(&teams, &contests, season, through_week, rating, params);
    Ok(all.get(&team.id).copied().unwrap_or(NEUTRAL_SOS))
}
