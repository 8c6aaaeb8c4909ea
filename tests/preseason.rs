mod common;

use common::{SEASON, team};
use gridiron_ratings::import::TeamRecord;
use gridiron_ratings::model::Tier;
use gridiron_ratings::preseason;
use gridiron_ratings::{EngineConfig, Store};

fn store_with(records: &[TeamRecord]) -> Store {
    let store = Store::in_memory().unwrap();
    for rec in records {
        store.upsert_team(rec).unwrap();
    }
    store
}

#[test]
fn season_start_applies_tier_base_and_bonuses() {
    let cfg = EngineConfig::default();
    let loaded = TeamRecord {
        recruiting_rank: Some(12),
        transfer_rank: Some(4),
        returning_production: Some(0.82),
        ..team(1, "Loaded", Tier::Top)
    };
    let rebuilding = TeamRecord {
        recruiting_rank: Some(60),
        returning_production: Some(0.36),
        ..team(2, "Rebuilding", Tier::Lower)
    };
    let mut store = store_with(&[loaded, rebuilding, team(3, "Plain", Tier::Top)]);

    let report = preseason::initialize_season(&mut store, &cfg.preseason, SEASON, false).unwrap();
    assert_eq!(report.initialized.len(), 3);

    assert_eq!(store.team(1).unwrap().rating, 1500.0 + 40.0 + 40.0 + 50.0);
    assert_eq!(store.team(2).unwrap().rating, 1200.0 + 10.0 + 5.0);
    let plain = store.team(3).unwrap();
    assert_eq!(plain.rating, 1500.0);
    assert_eq!(plain.season, Some(SEASON));
    assert_eq!((plain.wins, plain.losses), (0, 0));
}

#[test]
fn second_initialization_needs_reset() {
    let cfg = EngineConfig::default();
    let mut store = store_with(&[team(1, "A", Tier::Top), team(2, "B", Tier::Lower)]);
    preseason::initialize_season(&mut store, &cfg.preseason, SEASON, false).unwrap();

    let again = preseason::initialize_season(&mut store, &cfg.preseason, SEASON, false).unwrap();
    assert!(again.initialized.is_empty());
    assert_eq!(again.failures.len(), 2);

    let reset = preseason::initialize_season(&mut store, &cfg.preseason, SEASON, true).unwrap();
    assert_eq!(reset.initialized.len(), 2);

    let next = preseason::initialize_season(&mut store, &cfg.preseason, SEASON + 1, false).unwrap();
    assert_eq!(next.initialized.len(), 2);
    assert_eq!(store.team(2).unwrap().season, Some(SEASON + 1));
}

#[test]
fn out_of_domain_input_fails_only_that_team() {
    let cfg = EngineConfig::default();
    let bad = TeamRecord {
        returning_production: Some(1.4),
        ..team(1, "Bad", Tier::Top)
    };
    let zero_rank = TeamRecord {
        recruiting_rank: Some(0),
        ..team(2, "Zero", Tier::Top)
    };
    let mut store = store_with(&[bad, zero_rank, team(3, "Fine", Tier::Lower)]);

    let report = preseason::initialize_season(&mut store, &cfg.preseason, SEASON, false).unwrap();
    let failed: Vec<u32> = report.failures.iter().map(|(id, _)| *id).collect();
    assert_eq!(failed, vec![1, 2]);
    assert_eq!(report.initialized, vec![(3, 1200.0)]);
    assert_eq!(store.team(1).unwrap().season, None);
}
