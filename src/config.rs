use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::preseason::{FractionSteps, RankSteps};

const APP_DIR: &str = "gridiron_ratings";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rating: RatingParams,
    pub preseason: PreseasonConfig,
    pub sos: SosParams,
    pub prediction: PredictionParams,
    pub backfill: BackfillParams,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingParams {
    pub k_factor: f64,
    pub home_field_bonus: f64,
    pub logistic_scale: f64,
    pub mov_cap: f64,
    pub tiers: TierMultipliers,
}

impl Default for RatingParams {
    fn default() -> Self {
        Self {
            k_factor: 20.0,
            home_field_bonus: 65.0,
            logistic_scale: 400.0,
            mov_cap: 3.0,
            tiers: TierMultipliers::default(),
        }
    }
}

/// Multipliers applied when the two sides sit in different tiers.
/// "upset" means the lower-tier side won.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TierMultipliers {
    pub upset_winner: f64,
    pub upset_loser: f64,
    pub expected_winner: f64,
    pub expected_loser: f64,
}

impl Default for TierMultipliers {
    fn default() -> Self {
        Self {
            upset_winner: 1.5,
            upset_loser: 1.25,
            expected_winner: 0.75,
            expected_loser: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreseasonConfig {
    pub top_tier_base: f64,
    pub lower_tier_base: f64,
    pub recruiting: RankSteps,
    pub transfer: RankSteps,
    pub returning: FractionSteps,
}

impl Default for PreseasonConfig {
    fn default() -> Self {
        Self {
            top_tier_base: 1500.0,
            lower_tier_base: 1200.0,
            recruiting: RankSteps::recruiting_default(),
            transfer: RankSteps::transfer_default(),
            returning: FractionSteps::returning_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SosParams {
    pub baseline_rating: f64,
    pub rating_weight: f64,
    pub record_weight: f64,
}

impl Default for SosParams {
    fn default() -> Self {
        Self {
            baseline_rating: 1500.0,
            rating_weight: 2.0 / 3.0,
            record_weight: 1.0 / 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionParams {
    pub baseline_score: f64,
    /// Rating points per point of predicted spread.
    pub rating_per_point: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub medium_threshold: f64,
    pub high_threshold: f64,
}

impl Default for PredictionParams {
    fn default() -> Self {
        Self {
            baseline_score: 24.0,
            rating_per_point: 25.0,
            min_score: 0.0,
            max_score: 70.0,
            medium_threshold: 0.10,
            high_threshold: 0.20,
        }
    }
}

/// Where week-1 retrospective predictions read their ratings from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekOneSource {
    PreseasonSnapshot,
    DefaultRating,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillParams {
    pub week_one: WeekOneSource,
    pub as_of_lead_hours: i64,
}

impl Default for BackfillParams {
    fn default() -> Self {
        Self {
            week_one: WeekOneSource::PreseasonSnapshot,
            as_of_lead_hours: 24,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg = serde_json::from_str::<EngineConfig>(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Loads `RATINGS_CONFIG` when set, otherwise defaults; env overrides apply on top.
    pub fn from_env() -> Result<Self> {
        let mut cfg = match std::env::var("RATINGS_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_f64("RATING_K_FACTOR") {
            self.rating.k_factor = v;
        }
        if let Some(v) = env_f64("RATING_HOME_FIELD") {
            self.rating.home_field_bonus = v;
        }
        if let Some(v) = env_f64("RATING_MOV_CAP") {
            self.rating.mov_cap = v;
        }
        if let Ok(raw) = std::env::var("BACKFILL_WEEK_ONE") {
            self.backfill.week_one = match raw.trim().to_ascii_lowercase().as_str() {
                "preseason" | "preseason_snapshot" => WeekOneSource::PreseasonSnapshot,
                "default" | "default_rating" => WeekOneSource::DefaultRating,
                other => {
                    return Err(EngineError::InvalidConfig(format!(
                        "BACKFILL_WEEK_ONE={other}"
                    )));
                }
            };
        }
        if let Some(v) = std::env::var("BACKFILL_LEAD_HOURS")
            .ok()
            .and_then(|val| val.trim().parse::<i64>().ok())
        {
            self.backfill.as_of_lead_hours = v;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.rating;
        if !(r.k_factor > 0.0) || !(r.logistic_scale > 0.0) {
            return Err(EngineError::InvalidConfig(
                "k_factor and logistic_scale must be positive".to_string(),
            ));
        }
        if !(r.mov_cap > 0.0) {
            return Err(EngineError::InvalidConfig("mov_cap must be positive".to_string()));
        }
        let t = &r.tiers;
        if [t.upset_winner, t.upset_loser, t.expected_winner, t.expected_loser]
            .iter()
            .any(|m| !(*m > 0.0))
        {
            return Err(EngineError::InvalidConfig(
                "tier multipliers must be positive".to_string(),
            ));
        }

        let p = &self.prediction;
        if !(p.min_score < p.baseline_score && p.baseline_score < p.max_score) || p.min_score < 0.0
        {
            return Err(EngineError::InvalidConfig(
                "prediction baseline must lie strictly inside [min_score, max_score] with min_score >= 0"
                    .to_string(),
            ));
        }
        if !(p.rating_per_point > 0.0) {
            return Err(EngineError::InvalidConfig(
                "rating_per_point must be positive".to_string(),
            ));
        }
        if !(0.0 < p.medium_threshold
            && p.medium_threshold < p.high_threshold
            && p.high_threshold <= 0.5)
        {
            return Err(EngineError::InvalidConfig(
                "confidence thresholds must satisfy 0 < medium < high <= 0.5".to_string(),
            ));
        }

        if self.backfill.as_of_lead_hours < 0 {
            return Err(EngineError::InvalidConfig(
                "as_of_lead_hours must not be negative".to_string(),
            ));
        }

        self.preseason.recruiting.validate("recruiting")?;
        self.preseason.transfer.validate("transfer")?;
        self.preseason.returning.validate("returning")?;
        Ok(())
    }
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<f64>().ok())
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(APP_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"rating": {"k_factor": 32.0}, "backfill": {"week_one": "default_rating"}}"#)
                .unwrap();
        assert_eq!(cfg.rating.k_factor, 32.0);
        assert_eq!(cfg.rating.home_field_bonus, 65.0);
        assert_eq!(cfg.backfill.week_one, WeekOneSource::DefaultRating);
        assert_eq!(cfg.backfill.as_of_lead_hours, 24);
    }

    #[test]
    fn baseline_outside_clamp_range_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.prediction.max_score = cfg.prediction.baseline_score;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = std::env::temp_dir().join(format!("gridiron_cfg_{}", std::process::id()));
        let path = dir.join("engine.json");
        let mut cfg = EngineConfig::default();
        cfg.rating.k_factor = 24.0;
        cfg.backfill.week_one = WeekOneSource::DefaultRating;
        cfg.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.rating.k_factor, 24.0);
        assert_eq!(loaded.backfill.week_one, WeekOneSource::DefaultRating);
        assert_eq!(loaded.preseason.recruiting, cfg.preseason.recruiting);
        let _ = fs::remove_dir_all(&dir);
    }
}
