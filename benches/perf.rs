use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

use chrono::{Duration, TimeZone, Utc};

use gridiron_ratings::config::{PredictionParams, RatingParams, SosParams};
use gridiron_ratings::import::{ContestRecord, TeamRecord};
use gridiron_ratings::model::{Contest, Team, Tier};
use gridiron_ratings::predict::Predictor;
use gridiron_ratings::rating::{GameInput, compute_deltas};
use gridiron_ratings::{EngineConfig, GameProcessor, Store, preseason, sos};

const TEAMS: u32 = 130;
const WEEKS: u32 = 14;
const SEASON: i32 = 2024;

fn random_team(rng: &mut StdRng, id: u32) -> TeamRecord {
    TeamRecord {
        id,
        name: format!("Team {id:03}"),
        conference: format!("Conf {}", id % 10),
        tier: if id % 5 == 0 { Tier::Lower } else { Tier::Top },
        recruiting_rank: rng.gen_bool(0.7).then(|| rng.gen_range(1..=130)),
        transfer_rank: rng.gen_bool(0.5).then(|| rng.gen_range(1..=130)),
        returning_production: Some(rng.gen_range(0.0..=1.0)),
    }
}

/// Each week pairs every team once with a random opponent.
fn random_schedule(rng: &mut StdRng) -> Vec<ContestRecord> {
    let start = Utc.with_ymd_and_hms(2024, 8, 31, 16, 0, 0).unwrap();
    let mut out = Vec::new();
    let mut id = 1u64;
    for week in 1..=WEEKS {
        let mut ids: Vec<u32> = (1..=TEAMS).collect();
        ids.shuffle(rng);
        for pair in ids.chunks_exact(2) {
            let (home_score, away_score) = loop {
                let h = rng.gen_range(0..=56);
                let a = rng.gen_range(0..=56);
                if h != a {
                    break (h, a);
                }
            };
            out.push(ContestRecord {
                id,
                season: SEASON,
                week,
                kickoff: start + Duration::days(7 * (week as i64 - 1)) + Duration::minutes(id as i64),
                home_team_id: pair[0],
                away_team_id: pair[1],
                neutral_site: rng.gen_bool(0.05),
                home_score: Some(home_score),
                away_score: Some(away_score),
                excluded: false,
            });
            id += 1;
        }
    }
    out
}

fn seeded_store(teams: &[TeamRecord], schedule: &[ContestRecord]) -> Store {
    let cfg = EngineConfig::default();
    let mut store = Store::in_memory().unwrap();
    for t in teams {
        store.upsert_team(t).unwrap();
    }
    preseason::initialize_season(&mut store, &cfg.preseason, SEASON, false).unwrap();
    for c in schedule {
        store.upsert_contest(c).unwrap();
    }
    store
}

fn bench_predict(c: &mut Criterion) {
    let predictor = Predictor::new(RatingParams::default(), PredictionParams::default());
    let mut rng = StdRng::seed_from_u64(7);
    let pairs: Vec<(f64, f64)> = (0..1_000)
        .map(|_| (rng.gen_range(1100.0..1800.0), rng.gen_range(1100.0..1800.0)))
        .collect();

    c.bench_function("predict_1k", |b| {
        b.iter(|| {
            for (home, away) in &pairs {
                black_box(predictor.predict(black_box(*home), black_box(*away), false));
            }
        })
    });
}

fn bench_compute_deltas(c: &mut Criterion) {
    let params = RatingParams::default();
    let mut rng = StdRng::seed_from_u64(11);
    let games: Vec<GameInput> = (0..1_000)
        .map(|i| GameInput {
            home_rating: rng.gen_range(1100.0..1800.0),
            away_rating: rng.gen_range(1100.0..1800.0),
            home_tier: Tier::Top,
            away_tier: if i % 7 == 0 { Tier::Lower } else { Tier::Top },
            neutral_site: false,
            home_score: rng.gen_range(0..=30),
            away_score: rng.gen_range(31..=60),
        })
        .collect();

    c.bench_function("compute_deltas_1k", |b| {
        b.iter(|| {
            for g in &games {
                black_box(compute_deltas(&params, black_box(g)));
            }
        })
    });
}

fn bench_season(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2024);
    let teams: Vec<TeamRecord> = (1..=TEAMS).map(|id| random_team(&mut rng, id)).collect();
    let schedule = random_schedule(&mut rng);
    let cfg = EngineConfig::default();
    let processor = GameProcessor::new(cfg.rating);

    c.bench_function("apply_full_season", |b| {
        b.iter_batched(
            || seeded_store(&teams, &schedule),
            |mut store| {
                let report = processor.process_pending(&mut store, SEASON, None).unwrap();
                black_box(report.applied.len());
            },
            BatchSize::LargeInput,
        )
    });

    let mut played = seeded_store(&teams, &schedule);
    processor.process_pending(&mut played, SEASON, None).unwrap();
    let live: Vec<Team> = played.live_ratings(SEASON).unwrap();
    let contests: Vec<Contest> = played.load_contests(SEASON).unwrap();
    let sos_params = SosParams::default();

    c.bench_function("sos_compute_all", |b| {
        b.iter(|| {
            black_box(sos::compute_all(
                black_box(&live),
                black_box(&contests),
                SEASON,
                WEEKS / 2,
                &cfg.rating,
                &sos_params,
            ))
        })
    });
}

criterion_group!(benches, bench_predict, bench_compute_deltas, bench_season);
criterion_main!(benches);
