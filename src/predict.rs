use crate::config::{PredictionParams, RatingParams};
use crate::model::{Confidence, Side};
use crate::rating::{expected_home, home_field};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Forecast {
    pub winner: Side,
    pub home_score: f64,
    pub away_score: f64,
    pub home_prob: f64,
    pub away_prob: f64,
    pub confidence: Confidence,
}

/// Pure function of two ratings and the venue; live and historical inputs are
/// treated identically.
#[derive(Debug, Clone, Copy)]
pub struct Predictor {
    rating: RatingParams,
    params: PredictionParams,
}

impl Predictor {
    pub fn new(rating: RatingParams, params: PredictionParams) -> Self {
        Self { rating, params }
    }

    pub fn predict(&self, home_rating: f64, away_rating: f64, neutral_site: bool) -> Forecast {
        let home_prob = expected_home(&self.rating, home_rating, away_rating, neutral_site);
        let away_prob = 1.0 - home_prob;

        // Baseline sits strictly inside the clamp range, so the favourite stays ahead.
        let diff = home_rating + home_field(&self.rating, neutral_site) - away_rating;
        let spread = diff / self.params.rating_per_point;
        let p = &self.params;
        let home_score = clamp(p.baseline_score + spread / 2.0, p.min_score, p.max_score);
        let away_score = clamp(p.baseline_score - spread / 2.0, p.min_score, p.max_score);

        Forecast {
            winner: if home_prob >= 0.5 { Side::Home } else { Side::Away },
            home_score,
            away_score,
            home_prob,
            away_prob,
            confidence: confidence_for(home_prob, p),
        }
    }
}

pub fn confidence_for(home_prob: f64, p: &PredictionParams) -> Confidence {
    let edge = (home_prob - 0.5).abs();
    if edge < p.medium_threshold {
        Confidence::Low
    } else if edge < p.high_threshold {
        Confidence::Medium
    } else {
        Confidence::High
    }
}

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}
