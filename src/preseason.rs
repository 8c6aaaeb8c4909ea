//! Season-entry ratings: a tier base plus three step-table bonuses.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::PreseasonConfig;
use crate::error::{EngineError, Result};
use crate::model::{Team, TeamId, Tier};
use crate::store::{self, Store};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankStep {
    /// Inclusive upper bound; the step covers ranks above the previous bound.
    pub max_rank: u32,
    pub bonus: f64,
}

/// Bonus by rank (1 is best). Bounds ascend strictly, so tiers never overlap
/// or leave gaps; ranks past the last bound and unranked inputs land in the floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankSteps {
    pub steps: Vec<RankStep>,
    pub floor_bonus: f64,
}

impl RankSteps {
    pub fn recruiting_default() -> Self {
        Self {
            steps: vec![
                RankStep { max_rank: 10, bonus: 60.0 },
                RankStep { max_rank: 25, bonus: 40.0 },
                RankStep { max_rank: 50, bonus: 20.0 },
                RankStep { max_rank: 80, bonus: 10.0 },
            ],
            floor_bonus: 0.0,
        }
    }

    pub fn transfer_default() -> Self {
        Self {
            steps: vec![
                RankStep { max_rank: 10, bonus: 40.0 },
                RankStep { max_rank: 25, bonus: 25.0 },
                RankStep { max_rank: 50, bonus: 10.0 },
            ],
            floor_bonus: 0.0,
        }
    }

    pub fn lookup(&self, rank: Option<u32>, field: &'static str) -> Result<f64> {
        let Some(rank) = rank else {
            return Ok(self.floor_bonus);
        };
        if rank == 0 {
            return Err(EngineError::OutOfDomain {
                field,
                value: rank.to_string(),
            });
        }
        Ok(self
            .steps
            .iter()
            .find(|s| rank <= s.max_rank)
            .map(|s| s.bonus)
            .unwrap_or(self.floor_bonus))
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        let mut prev_bound = 0;
        let mut prev_bonus = f64::INFINITY;
        for s in &self.steps {
            if s.max_rank <= prev_bound {
                return Err(EngineError::InvalidConfig(format!(
                    "{name}: rank bounds must ascend strictly"
                )));
            }
            if !s.bonus.is_finite() || s.bonus > prev_bonus {
                return Err(EngineError::InvalidConfig(format!(
                    "{name}: bonus must not grow as rank worsens"
                )));
            }
            prev_bound = s.max_rank;
            prev_bonus = s.bonus;
        }
        if !self.floor_bonus.is_finite() || self.floor_bonus > prev_bonus {
            return Err(EngineError::InvalidConfig(format!(
                "{name}: floor bonus exceeds the lowest ranked step"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractionStep {
    /// Inclusive lower bound.
    pub min_fraction: f64,
    pub bonus: f64,
}

/// Bonus by a fraction in `[0, 1]`; bounds descend strictly, unknown maps to the floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractionSteps {
    pub steps: Vec<FractionStep>,
    pub floor_bonus: f64,
}

impl FractionSteps {
    pub fn returning_default() -> Self {
        Self {
            steps: vec![
                FractionStep { min_fraction: 0.80, bonus: 50.0 },
                FractionStep { min_fraction: 0.65, bonus: 30.0 },
                FractionStep { min_fraction: 0.50, bonus: 15.0 },
                FractionStep { min_fraction: 0.35, bonus: 5.0 },
            ],
            floor_bonus: 0.0,
        }
    }

    pub fn lookup(&self, value: Option<f64>, field: &'static str) -> Result<f64> {
        let Some(value) = value else {
            return Ok(self.floor_bonus);
        };
        if !(0.0..=1.0).contains(&value) {
            return Err(EngineError::OutOfDomain {
                field,
                value: value.to_string(),
            });
        }
        Ok(self
            .steps
            .iter()
            .find(|s| value >= s.min_fraction)
            .map(|s| s.bonus)
            .unwrap_or(self.floor_bonus))
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        let mut prev_bound = f64::INFINITY;
        let mut prev_bonus = f64::INFINITY;
        for s in &self.steps {
            if !(0.0..=1.0).contains(&s.min_fraction) || s.min_fraction >= prev_bound {
                return Err(EngineError::InvalidConfig(format!(
                    "{name}: fraction bounds must lie in [0, 1] and descend strictly"
                )));
            }
            if !s.bonus.is_finite() || s.bonus > prev_bonus {
                return Err(EngineError::InvalidConfig(format!(
                    "{name}: bonus must not grow as the fraction drops"
                )));
            }
            prev_bound = s.min_fraction;
            prev_bonus = s.bonus;
        }
        if !self.floor_bonus.is_finite() || self.floor_bonus > prev_bonus {
            return Err(EngineError::InvalidConfig(format!(
                "{name}: floor bonus exceeds the lowest step"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreseasonRating {
    pub base: f64,
    pub recruiting: f64,
    pub transfer: f64,
    pub returning: f64,
}

impl PreseasonRating {
    pub fn total(&self) -> f64 {
        self.base + self.recruiting + self.transfer + self.returning
    }
}

pub fn tier_base(cfg: &PreseasonConfig, tier: Tier) -> f64 {
    match tier {
        Tier::Top => cfg.top_tier_base,
        Tier::Lower => cfg.lower_tier_base,
    }
}

/// Pure preseason rating for one team; every lookup is validated before any bonus is summed.
pub fn initialize(cfg: &PreseasonConfig, team: &Team) -> Result<PreseasonRating> {
    Ok(PreseasonRating {
        base: tier_base(cfg, team.tier),
        recruiting: cfg.recruiting.lookup(team.recruiting_rank, "recruiting rank")?,
        transfer: cfg.transfer.lookup(team.transfer_rank, "transfer rank")?,
        returning: cfg
            .returning
            .lookup(team.returning_production, "returning production")?,
    })
}

#[derive(Debug, Clone, Default)]
pub struct SeasonInitReport {
    pub initialized: Vec<(TeamId, f64)>,
    pub failures: Vec<(TeamId, String)>,
}

/// Seeds every team's live state for `season`. A team already stamped with
/// `season` is a conflict unless `reset` is set.
pub fn initialize_season(
    store: &mut Store,
    cfg: &PreseasonConfig,
    season: i32,
    reset: bool,
) -> Result<SeasonInitReport> {
    let teams = store.load_teams()?;
    let mut report = SeasonInitReport::default();

    for team in teams {
        let team_id = team.id;
        let outcome = store.immediate(|tx| {
            let mut team = store::read_team(tx, team_id)?;
            if team.season == Some(season) && !reset {
                return Err(EngineError::AlreadyInitialized { team_id, season });
            }
            let rating = initialize(cfg, &team)?.total();
            team.rating = rating;
            team.wins = 0;
            team.losses = 0;
            team.season = Some(season);
            store::write_team_state(tx, &team)?;
            Ok(rating)
        });
        match outcome {
            Ok(rating) => report.initialized.push((team_id, rating)),
            Err(err) => {
                warn!("preseason team {team_id}: {err}");
                report.failures.push((team_id, err.to_string()));
            }
        }
    }

    info!(
        "preseason {season}: {} initialized, {} failed",
        report.initialized.len(),
        report.failures.len()
    );
    Ok(report)
}
