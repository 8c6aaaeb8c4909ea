use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::Utc;
use log::{info, warn};
use rusqlite::Connection;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::model::{RatingSnapshot, Team};
use crate::sos;
use crate::store::{self, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Written(usize),
    /// Stored rows already equal the recomputed ones; nothing written.
    Unchanged(usize),
    Overwritten(usize),
}

/// Rating desc, then win pct desc, then name, then id.
pub fn rank_order(a: &Team, b: &Team) -> Ordering {
    b.rating
        .total_cmp(&a.rating)
        .then_with(|| b.win_pct().total_cmp(&a.win_pct()))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Builds the rows a snapshot of `(season, week)` holds: ratings and records
/// as they stood after that week, whatever has been applied since.
pub fn build_rows(
    conn: &Connection,
    cfg: &EngineConfig,
    season: i32,
    week: u32,
) -> Result<Vec<RatingSnapshot>> {
    let mut teams: Vec<Team> = {
        let mut stmt = conn.prepare("SELECT team_id FROM teams WHERE season = ?1")?;
        let ids = stmt
            .query_map([season], |row| row.get::<_, u32>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        ids.into_iter()
            .map(|id| store::read_team(conn, id))
            .collect::<Result<Vec<_>>>()?
    };
    let contests = store::read_contests(conn, season)?;
    let sos_by_team = sos::compute_all(&teams, &contests, season, week, &cfg.rating, &cfg.sos);

    // Live state may already include later weeks; roll every team back to `week`.
    let ratings = sos::ratings_as_of(&teams, &contests, season, week);
    let records = sos::records_as_of(&contests, season, week);
    for t in &mut teams {
        if let Some(r) = ratings.get(&t.id) {
            t.rating = *r;
        }
        let (wins, losses) = records.get(&t.id).copied().unwrap_or((0, 0));
        t.wins = wins;
        t.losses = losses;
    }

    let previous: HashMap<u32, u32> = if week == 0 {
        HashMap::new()
    } else {
        store::read_snapshot(conn, season, week - 1)?
            .into_iter()
            .map(|r| (r.team_id, r.rank))
            .collect()
    };

    teams.sort_by(rank_order);

    let mut by_sos: Vec<(&Team, f64)> = teams
        .iter()
        .map(|t| (t, sos_by_team.get(&t.id).copied().unwrap_or(sos::NEUTRAL_SOS)))
        .collect();
    by_sos.sort_by(|(ta, a), (tb, b)| {
        b.total_cmp(a)
            .then_with(|| ta.name.cmp(&tb.name))
            .then_with(|| ta.id.cmp(&tb.id))
    });
    let sos_rank: HashMap<u32, u32> = by_sos
        .iter()
        .enumerate()
        .map(|(i, (t, _))| (t.id, i as u32 + 1))
        .collect();

    let rows = teams
        .iter()
        .enumerate()
        .map(|(i, t)| RatingSnapshot {
            team_id: t.id,
            team_name: t.name.clone(),
            season,
            week,
            rating: t.rating,
            rank: i as u32 + 1,
            previous_rank: previous.get(&t.id).copied(),
            wins: t.wins,
            losses: t.losses,
            sos: sos_by_team.get(&t.id).copied().unwrap_or(sos::NEUTRAL_SOS),
            sos_rank: sos_rank.get(&t.id).copied().unwrap_or(0),
        })
        .collect();
    Ok(rows)
}

/// Writes the `(season, week)` snapshot. Re-running with no
/// change in between is a no-op; a changed result for an existing period is
/// rejected unless `overwrite` is set.
pub fn take_snapshot(
    store: &mut Store,
    cfg: &EngineConfig,
    season: i32,
    week: u32,
    overwrite: bool,
) -> Result<SnapshotOutcome> {
    store.immediate(|tx| {
        let fresh = build_rows(tx, cfg, season, week)?;
        let existing = store::read_snapshot(tx, season, week)?;

        if existing.is_empty() {
            store::write_snapshot_rows(tx, &fresh, Utc::now())?;
            info!("snapshot {season}/w{week}: wrote {} teams", fresh.len());
            return Ok(SnapshotOutcome::Written(fresh.len()));
        }

        let changed = count_changed(&existing, &fresh);
        if changed == 0 {
            return Ok(SnapshotOutcome::Unchanged(existing.len()));
        }
        if !overwrite {
            return Err(EngineError::SnapshotConflict {
                season,
                week,
                changed,
            });
        }

        warn!("snapshot {season}/w{week}: overwriting closed period ({changed} rows differ)");
        store::delete_snapshot_rows(tx, season, week)?;
        store::write_snapshot_rows(tx, &fresh, Utc::now())?;
        Ok(SnapshotOutcome::Overwritten(fresh.len()))
    })
}

fn count_changed(existing: &[RatingSnapshot], fresh: &[RatingSnapshot]) -> usize {
    let old: HashMap<u32, &RatingSnapshot> = existing.iter().map(|r| (r.team_id, r)).collect();
    let mut changed = fresh
        .iter()
        .filter(|r| !old.get(&r.team_id).is_some_and(|o| o.same_values(r)))
        .count();
    let fresh_ids: std::collections::HashSet<u32> = fresh.iter().map(|r| r.team_id).collect();
    changed += existing
        .iter()
        .filter(|r| !fresh_ids.contains(&r.team_id))
        .count();
    changed
}
