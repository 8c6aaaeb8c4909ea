#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};

use gridiron_ratings::import::{ContestRecord, TeamRecord};
use gridiron_ratings::model::{ContestId, TeamId, Tier};
use gridiron_ratings::preseason;
use gridiron_ratings::{EngineConfig, Store};

pub const SEASON: i32 = 2024;

pub fn team(id: TeamId, name: &str, tier: Tier) -> TeamRecord {
    TeamRecord {
        id,
        name: name.to_string(),
        conference: "Test".to_string(),
        tier,
        recruiting_rank: None,
        transfer_rank: None,
        returning_production: None,
    }
}

pub fn kickoff(week: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 31, 19, 0, 0).unwrap() + Duration::days(7 * (week as i64 - 1))
}

pub fn contest(
    id: ContestId,
    week: u32,
    home: TeamId,
    away: TeamId,
    score: Option<(u32, u32)>,
) -> ContestRecord {
    ContestRecord {
        id,
        season: SEASON,
        week,
        kickoff: kickoff(week) + Duration::minutes(id as i64 % 60),
        home_team_id: home,
        away_team_id: away,
        neutral_site: false,
        home_score: score.map(|s| s.0),
        away_score: score.map(|s| s.1),
        excluded: false,
    }
}

/// Four top-tier teams and one lower-tier team, seeded for [`SEASON`].
pub fn seeded_store(cfg: &EngineConfig) -> Store {
    let mut store = Store::in_memory().unwrap();
    let teams = [
        team(1, "Alabama", Tier::Top),
        team(2, "Boise", Tier::Top),
        team(3, "Clemson", Tier::Top),
        team(4, "Duke", Tier::Top),
        team(5, "Elon", Tier::Lower),
    ];
    for t in &teams {
        store.upsert_team(t).unwrap();
    }
    let report = preseason::initialize_season(&mut store, &cfg.preseason, SEASON, false).unwrap();
    assert!(report.failures.is_empty());
    store
}

pub fn add_contests(store: &Store, records: &[ContestRecord]) {
    for rec in records {
        store.upsert_contest(rec).unwrap();
    }
}
