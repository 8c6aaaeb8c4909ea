mod common;

use common::{SEASON, contest, team};
use gridiron_ratings::error::ErrorKind;
use gridiron_ratings::import::{self, ContestRecord, TeamRecord};
use gridiron_ratings::model::{ContestStatus, Tier};
use gridiron_ratings::store::UpsertOutcome;
use gridiron_ratings::Store;

#[test]
fn upserts_report_what_they_did() {
    let store = Store::in_memory().unwrap();
    let a = team(1, "Alabama", Tier::Top);
    assert_eq!(store.upsert_team(&a).unwrap(), UpsertOutcome::Inserted);
    assert_eq!(store.upsert_team(&a).unwrap(), UpsertOutcome::Skipped);
    let renamed = TeamRecord {
        conference: "SEC".to_string(),
        ..a.clone()
    };
    assert_eq!(store.upsert_team(&renamed).unwrap(), UpsertOutcome::Updated);
    store.upsert_team(&team(2, "Boise", Tier::Top)).unwrap();

    let scheduled = contest(100, 1, 1, 2, None);
    assert_eq!(store.upsert_contest(&scheduled).unwrap(), UpsertOutcome::Inserted);
    assert_eq!(store.contest(100).unwrap().status(), ContestStatus::Scheduled);

    let final_score = ContestRecord {
        home_score: Some(24),
        away_score: Some(17),
        ..scheduled.clone()
    };
    assert_eq!(store.upsert_contest(&final_score).unwrap(), UpsertOutcome::Updated);
    assert_eq!(store.upsert_contest(&final_score).unwrap(), UpsertOutcome::Skipped);
    assert_eq!(store.contest(100).unwrap().status(), ContestStatus::Completed);
}

#[test]
fn bad_contests_are_rejected() {
    let store = Store::in_memory().unwrap();
    store.upsert_team(&team(1, "Alabama", Tier::Top)).unwrap();

    let unknown = store.upsert_contest(&contest(100, 1, 1, 9, None)).unwrap_err();
    assert_eq!(unknown.kind(), ErrorKind::NotFound);

    let itself = store.upsert_contest(&contest(101, 1, 1, 1, None)).unwrap_err();
    assert_eq!(itself.kind(), ErrorKind::Validation);

    let mut one_sided = contest(102, 1, 1, 1, None);
    one_sided.away_team_id = 2;
    one_sided.home_score = Some(7);
    store.upsert_team(&team(2, "Boise", Tier::Top)).unwrap();
    let err = store.upsert_contest(&one_sided).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn json_files_import_in_bulk() {
    let dir = std::env::temp_dir().join(format!("gridiron_ratings_import_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let teams_path = dir.join("teams.json");
    let contests_path = dir.join("contests.json");
    std::fs::write(
        &teams_path,
        r#"[
            {"id": 1, "name": "Alabama", "conference": "SEC", "tier": "top", "recruiting_rank": 2},
            {"id": 2, "name": "Elon", "tier": "lower", "returning_production": 0.7}
        ]"#,
    )
    .unwrap();
    std::fs::write(
        &contests_path,
        r#"[
            {"id": 10, "season": 2024, "week": 1, "kickoff": "2024-08-31T19:00:00Z",
             "home_team_id": 1, "away_team_id": 2, "home_score": 42, "away_score": 7},
            {"id": 11, "season": 2024, "week": 2, "kickoff": "2024-09-07T19:00:00Z",
             "home_team_id": 2, "away_team_id": 3}
        ]"#,
    )
    .unwrap();

    let store = Store::in_memory().unwrap();
    let teams: Vec<TeamRecord> = import::read_json_file(&teams_path).unwrap();
    let summary = import::import_teams(&store, &teams);
    assert_eq!(summary.inserted, 2);

    let contests: Vec<ContestRecord> = import::read_json_file(&contests_path).unwrap();
    let summary = import::import_contests(&store, &contests);
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.errors.len(), 1);

    let elon = store.team(2).unwrap();
    assert_eq!(elon.tier, Tier::Lower);
    assert_eq!(elon.returning_production, Some(0.7));
    assert_eq!(store.load_contests(SEASON).unwrap().len(), 1);

    let _ = std::fs::remove_dir_all(&dir);
}
