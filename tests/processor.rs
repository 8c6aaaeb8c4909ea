mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{SEASON, add_contests, contest, seeded_store, team};
use gridiron_ratings::error::{EngineError, ErrorKind};
use gridiron_ratings::import::ContestRecord;
use gridiron_ratings::model::{ContestStatus, Tier};
use gridiron_ratings::preseason;
use gridiron_ratings::{ApplyOutcome, EngineConfig, GameProcessor, Store};

fn processor(cfg: &EngineConfig) -> GameProcessor {
    GameProcessor::new(cfg.rating)
}

#[test]
fn second_apply_is_a_noop_returning_prior_deltas() {
    let cfg = EngineConfig::default();
    let mut store = seeded_store(&cfg);
    add_contests(&store, &[contest(100, 1, 1, 2, Some((28, 14)))]);
    let p = processor(&cfg);

    let first = p.apply(&mut store, 100).unwrap();
    let ApplyOutcome::Applied(deltas) = first else {
        panic!("expected Applied, got {first:?}");
    };
    let after_first = (store.team(1).unwrap(), store.team(2).unwrap());

    let second = p.apply(&mut store, 100).unwrap();
    assert_eq!(second, ApplyOutcome::AlreadyApplied(deltas));
    assert_eq!(store.team(1).unwrap(), after_first.0);
    assert_eq!(store.team(2).unwrap(), after_first.1);
    assert_eq!(store.contest(100).unwrap().status(), ContestStatus::Rated);
}

#[test]
fn applying_updates_ratings_and_records() {
    let cfg = EngineConfig::default();
    let mut store = seeded_store(&cfg);
    add_contests(&store, &[contest(100, 1, 1, 2, Some((10, 31)))]);

    let deltas = processor(&cfg).apply(&mut store, 100).unwrap().deltas();
    let home = store.team(1).unwrap();
    let away = store.team(2).unwrap();

    assert!(deltas.home < 0.0 && deltas.away > 0.0);
    assert!((deltas.home + deltas.away).abs() < 1e-9, "same tier is zero-sum");
    assert!((home.rating - (1500.0 + deltas.home)).abs() < 1e-9);
    assert_eq!((home.wins, home.losses), (0, 1));
    assert_eq!((away.wins, away.losses), (1, 0));
}

#[test]
fn missing_scores_are_rejected_without_mutation() {
    let cfg = EngineConfig::default();
    let mut store = seeded_store(&cfg);
    add_contests(&store, &[contest(100, 1, 1, 2, None)]);

    let err = processor(&cfg).apply(&mut store, 100).unwrap_err();
    assert!(matches!(err, EngineError::MissingScores { contest_id: 100 }));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!store.contest(100).unwrap().applied);
    assert_eq!(store.team(1).unwrap().rating, 1500.0);
}

#[test]
fn tied_scores_are_a_validation_error() {
    let cfg = EngineConfig::default();
    let mut store = seeded_store(&cfg);
    add_contests(&store, &[contest(100, 1, 1, 2, Some((17, 17)))]);

    let err = processor(&cfg).apply(&mut store, 100).unwrap_err();
    assert!(matches!(err, EngineError::TiedScore { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!store.contest(100).unwrap().applied);
}

#[test]
fn excluded_contest_is_marked_applied_with_no_effect() {
    let cfg = EngineConfig::default();
    let mut store = seeded_store(&cfg);
    let mut rec = contest(100, 1, 1, 5, Some((63, 0)));
    rec.excluded = true;
    add_contests(&store, &[rec]);

    let outcome = processor(&cfg).apply(&mut store, 100).unwrap();
    assert_eq!(outcome, ApplyOutcome::Excluded);

    let c = store.contest(100).unwrap();
    assert!(c.applied);
    assert_eq!(c.home_delta, Some(0.0));
    let home = store.team(1).unwrap();
    assert_eq!(home.rating, 1500.0);
    assert_eq!((home.wins, home.losses), (0, 0));
    assert_eq!(store.team(5).unwrap().rating, 1200.0);
}

#[test]
fn team_from_another_season_is_rejected() {
    let cfg = EngineConfig::default();
    let mut store = Store::in_memory().unwrap();
    store.upsert_team(&team(1, "Alabama", Tier::Top)).unwrap();
    store.upsert_team(&team(2, "Boise", Tier::Top)).unwrap();
    preseason::initialize_season(&mut store, &cfg.preseason, SEASON - 1, false).unwrap();
    add_contests(&store, &[contest(100, 1, 1, 2, Some((21, 3)))]);

    let err = processor(&cfg).apply(&mut store, 100).unwrap_err();
    assert!(matches!(
        err,
        EngineError::SeasonMismatch {
            expected: SEASON,
            ..
        }
    ));
    assert!(!store.contest(100).unwrap().applied);
}

#[test]
fn reverse_restores_prior_state() {
    let cfg = EngineConfig::default();
    let mut store = seeded_store(&cfg);
    add_contests(&store, &[contest(100, 1, 3, 5, Some((14, 17)))]);
    let p = processor(&cfg);

    p.apply(&mut store, 100).unwrap();
    let undone = p.reverse(&mut store, 100).unwrap();
    assert!(undone.away > 0.0);

    let home = store.team(3).unwrap();
    let away = store.team(5).unwrap();
    assert!((home.rating - 1500.0).abs() < 1e-9);
    assert!((away.rating - 1200.0).abs() < 1e-9);
    assert_eq!((home.wins, home.losses, away.wins, away.losses), (0, 0, 0, 0));
    assert_eq!(store.contest(100).unwrap().status(), ContestStatus::Completed);

    let err = p.reverse(&mut store, 100).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn reversing_last_season_leaves_the_new_season_alone() {
    let cfg = EngineConfig::default();
    let mut store = seeded_store(&cfg);
    add_contests(&store, &[contest(101, 1, 1, 2, Some((28, 14)))]);
    let p = processor(&cfg);
    p.apply(&mut store, 101).unwrap();

    preseason::initialize_season(&mut store, &cfg.preseason, SEASON + 1, false).unwrap();
    let before = (store.team(1).unwrap(), store.team(2).unwrap());

    let err = p.reverse(&mut store, 101).unwrap_err();
    assert!(matches!(
        err,
        EngineError::SeasonMismatch {
            expected: SEASON,
            found: Some(found),
            ..
        } if found == SEASON + 1
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!((store.team(1).unwrap(), store.team(2).unwrap()), before);
    assert!(store.contest(101).unwrap().applied);
}

#[test]
fn score_correction_matches_applying_the_right_score_once() {
    let cfg = EngineConfig::default();
    let p = processor(&cfg);

    let mut corrected = seeded_store(&cfg);
    add_contests(&corrected, &[contest(100, 1, 1, 2, Some((35, 7)))]);
    p.apply(&mut corrected, 100).unwrap();
    let outcome = p.correct_score(&mut corrected, 100, 20, 24).unwrap();

    let mut direct = seeded_store(&cfg);
    add_contests(&direct, &[contest(100, 1, 1, 2, Some((20, 24)))]);
    let expected = p.apply(&mut direct, 100).unwrap();

    let (got, want) = (outcome.deltas(), expected.deltas());
    assert!(matches!(outcome, ApplyOutcome::Applied(_)));
    assert!((got.home - want.home).abs() < 1e-9);
    assert!((got.away - want.away).abs() < 1e-9);
    for id in [1, 2] {
        let a = corrected.team(id).unwrap();
        let b = direct.team(id).unwrap();
        assert!((a.rating - b.rating).abs() < 1e-9);
        assert_eq!((a.wins, a.losses), (b.wins, b.losses));
    }

    assert!(matches!(
        p.correct_score(&mut corrected, 100, 10, 10),
        Err(EngineError::TiedScore { .. })
    ));
}

#[test]
fn applied_contest_cannot_be_changed_through_import() {
    let cfg = EngineConfig::default();
    let mut store = seeded_store(&cfg);
    let rec = contest(100, 1, 1, 2, Some((28, 14)));
    add_contests(&store, std::slice::from_ref(&rec));
    processor(&cfg).apply(&mut store, 100).unwrap();

    let changed = ContestRecord {
        home_score: Some(27),
        ..rec.clone()
    };
    let err = store.upsert_contest(&changed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(store.contest(100).unwrap().home_score, Some(28));
}

#[test]
fn batch_collects_failures_and_keeps_going() {
    let cfg = EngineConfig::default();
    let mut store = seeded_store(&cfg);
    let mut excluded = contest(104, 1, 4, 5, Some((70, 0)));
    excluded.excluded = true;
    add_contests(
        &store,
        &[
            contest(101, 1, 1, 2, Some((24, 21))),
            contest(102, 1, 3, 4, Some((13, 13))),
            contest(103, 1, 5, 3, Some((9, 10))),
            excluded,
            contest(105, 2, 1, 3, None),
        ],
    );

    let report = processor(&cfg)
        .process_pending(&mut store, SEASON, Some(1))
        .unwrap();
    let applied: Vec<_> = report.applied.iter().map(|(id, _)| *id).collect();
    assert_eq!(applied, vec![101, 103]);
    assert_eq!(report.excluded, vec![104]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, 102);

    // Records only count rated, non-excluded results.
    let teams = store.load_teams().unwrap();
    let wins: u32 = teams.iter().map(|t| t.wins).sum();
    let losses: u32 = teams.iter().map(|t| t.losses).sum();
    assert_eq!(wins, 2);
    assert_eq!(losses, 2);
}

#[test]
fn concurrent_apply_on_one_database_happens_once() {
    let cfg = EngineConfig::default();
    let dir = std::env::temp_dir().join(format!(
        "gridiron_ratings_concurrency_{}_{}",
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    let path = dir.join("ratings.sqlite");

    let mut setup = Store::open(&path).unwrap();
    setup.upsert_team(&team(1, "Alabama", Tier::Top)).unwrap();
    setup.upsert_team(&team(2, "Boise", Tier::Top)).unwrap();
    preseason::initialize_season(&mut setup, &cfg.preseason, SEASON, false).unwrap();
    setup
        .upsert_contest(&contest(100, 1, 1, 2, Some((31, 30))))
        .unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let mut store = Store::open(&path).unwrap();
            let barrier = Arc::clone(&barrier);
            let p = processor(&cfg);
            thread::spawn(move || {
                barrier.wait();
                p.apply(&mut store, 100).unwrap()
            })
        })
        .collect();
    let outcomes: Vec<ApplyOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let applied = outcomes
        .iter()
        .filter(|o| matches!(o, ApplyOutcome::Applied(_)))
        .count();
    let repeated = outcomes
        .iter()
        .filter(|o| matches!(o, ApplyOutcome::AlreadyApplied(_)))
        .count();
    assert_eq!((applied, repeated), (1, 1));
    assert_eq!(outcomes[0].deltas(), outcomes[1].deltas());

    let home = setup.team(1).unwrap();
    assert_eq!((home.wins, home.losses), (1, 0));
    assert!((home.rating - (1500.0 + outcomes[0].deltas().home)).abs() < 1e-9);

    drop(setup);
    let _ = std::fs::remove_dir_all(&dir);
}
