use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};

use gridiron_ratings::accuracy;
use gridiron_ratings::backfill::BackfillService;
use gridiron_ratings::snapshot::{self, SnapshotOutcome};
use gridiron_ratings::store::{self, Store};
use gridiron_ratings::{EngineConfig, GameProcessor};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let season = parse_arg::<i32>("--season", arg_value("--season"))?
        .ok_or_else(|| {
            anyhow!("usage: rate_week --season YEAR [--week N] [--overwrite] [--predict-next] [--db PATH]")
        })?;
    let week = parse_arg::<u32>("--week", arg_value("--week"))?;

    let cfg = EngineConfig::from_env().context("loading engine config")?;
    let db_path = resolve_db_path().context("unable to resolve sqlite path")?;
    let mut store = Store::open(&db_path)
        .with_context(|| format!("opening {}", db_path.display()))?;

    let processor = GameProcessor::new(cfg.rating);
    let batch = processor.process_pending(&mut store, season, week)?;
    println!(
        "Processed: applied={} excluded={} already={} failed={}",
        batch.applied.len(),
        batch.excluded.len(),
        batch.already_applied.len(),
        batch.failures.len()
    );
    for (id, err) in batch.failures.iter().take(10) {
        println!("   - contest {id}: {err}");
    }

    let graded = accuracy::grade_predictions(&mut store, season)?;
    println!("Graded predictions: {graded}");

    let Some(week) = week else {
        println!("No --week given; snapshot skipped");
        return Ok(());
    };

    let outcome = snapshot::take_snapshot(&mut store, &cfg, season, week, has_flag("--overwrite"))
        .with_context(|| format!("snapshot {season} week {week}"))?;
    match outcome {
        SnapshotOutcome::Written(n) => println!("Snapshot week {week}: {n} teams"),
        SnapshotOutcome::Unchanged(n) => println!("Snapshot week {week} unchanged ({n} teams)"),
        SnapshotOutcome::Overwritten(n) => println!("Snapshot week {week} overwritten ({n} teams)"),
    }

    for row in store.load_snapshot(season, week)?.iter().take(25) {
        let movement = match row.previous_rank {
            Some(prev) if prev > row.rank => format!("+{}", prev - row.rank),
            Some(prev) if prev < row.rank => format!("-{}", row.rank - prev),
            Some(_) => "=".to_string(),
            None => "new".to_string(),
        };
        println!(
            "{:>3}. {:<28} {:>7.1} {:>2}-{:<2} sos {:>6.2} ({:>3}) {movement}",
            row.rank, row.team_name, row.rating, row.wins, row.losses, row.sos, row.sos_rank
        );
    }

    if has_flag("--predict-next") {
        let service = BackfillService::new(&cfg);
        let report = service.predict_scheduled(&mut store, season, Some(week + 1))?;
        println!(
            "Week {} predictions: created={} skipped={} errors={}",
            week + 1,
            report.created,
            report.skipped_existing,
            report.errors.len()
        );
    }
    Ok(())
}

fn parse_arg<T>(name: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|err| anyhow!("invalid {name} {raw:?}: {err}"))
    })
    .transpose()
}

fn resolve_db_path() -> Option<PathBuf> {
    arg_value("--db")
        .or_else(|| std::env::var("RATINGS_DB").ok())
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
        .or_else(store::default_db_path)
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}

fn arg_value(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            return Some(raw.to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
        {
            return Some(next.clone());
        }
    }
    None
}
