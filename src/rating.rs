use crate::config::RatingParams;
use crate::model::{Deltas, Side, Tier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Winner,
    Loser,
}

/// Inputs for one rated result; ratings are the pre-game live values.
#[derive(Debug, Clone, Copy)]
pub struct GameInput {
    pub home_rating: f64,
    pub away_rating: f64,
    pub home_tier: Tier,
    pub away_tier: Tier,
    pub neutral_site: bool,
    pub home_score: u32,
    pub away_score: u32,
}

/// Base-10 logistic expectation for side A against side B.
pub fn expected_score(r_a: f64, r_b: f64, scale: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf(-(r_a - r_b) / scale))
}

pub fn home_field(params: &RatingParams, neutral_site: bool) -> f64 {
    if neutral_site {
        0.0
    } else {
        params.home_field_bonus
    }
}

pub fn expected_home(params: &RatingParams, home: f64, away: f64, neutral_site: bool) -> f64 {
    expected_score(
        home + home_field(params, neutral_site),
        away,
        params.logistic_scale,
    )
}

/// `ln(margin + 1)`, capped so blowouts stay bounded.
pub fn mov_multiplier(margin: u32, cap: f64) -> f64 {
    (margin as f64 + 1.0).ln().min(cap)
}

/// Asymmetric cross-tier weighting. Same tier is neutral; otherwise the
/// lower-tier side is favored whether it wins or loses.
pub fn tier_multiplier(params: &RatingParams, role: Role, winner_tier: Tier, loser_tier: Tier) -> f64 {
    let t = &params.tiers;
    match (winner_tier, loser_tier, role) {
        (w, l, _) if w == l => 1.0,
        (Tier::Lower, Tier::Top, Role::Winner) => t.upset_winner,
        (Tier::Lower, Tier::Top, Role::Loser) => t.upset_loser,
        (Tier::Top, Tier::Lower, Role::Winner) => t.expected_winner,
        (Tier::Top, Tier::Lower, Role::Loser) => t.expected_loser,
        _ => 1.0,
    }
}

/// Rating changes for both sides. Ties never reach here; callers reject them.
pub fn compute_deltas(params: &RatingParams, g: &GameInput) -> Deltas {
    let exp_home = expected_home(params, g.home_rating, g.away_rating, g.neutral_site);
    let exp_away = 1.0 - exp_home;

    let winner = if g.home_score > g.away_score {
        Side::Home
    } else {
        Side::Away
    };
    let (actual_home, actual_away) = match winner {
        Side::Home => (1.0, 0.0),
        Side::Away => (0.0, 1.0),
    };
    let (winner_tier, loser_tier) = match winner {
        Side::Home => (g.home_tier, g.away_tier),
        Side::Away => (g.away_tier, g.home_tier),
    };
    let (home_role, away_role) = match winner {
        Side::Home => (Role::Winner, Role::Loser),
        Side::Away => (Role::Loser, Role::Winner),
    };

    let mov = mov_multiplier(g.home_score.abs_diff(g.away_score), params.mov_cap);
    let k = params.k_factor * mov;

    Deltas {
        home: k
            * tier_multiplier(params, home_role, winner_tier, loser_tier)
            * (actual_home - exp_home),
        away: k
            * tier_multiplier(params, away_role, winner_tier, loser_tier)
            * (actual_away - exp_away),
    }
}
