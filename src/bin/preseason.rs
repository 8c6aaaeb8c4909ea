use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};

use gridiron_ratings::EngineConfig;
use gridiron_ratings::preseason;
use gridiron_ratings::snapshot::{self, SnapshotOutcome};
use gridiron_ratings::store::{self, Store};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let season = parse_arg::<i32>("--season", arg_value("--season"))?
        .ok_or_else(|| anyhow!("usage: preseason --season YEAR [--reset] [--db PATH]"))?;
    let reset = has_flag("--reset");

    let cfg = EngineConfig::from_env().context("loading engine config")?;
    let db_path = resolve_db_path().context("unable to resolve sqlite path")?;
    let mut store = Store::open(&db_path)
        .with_context(|| format!("opening {}", db_path.display()))?;

    let report = preseason::initialize_season(&mut store, &cfg.preseason, season, reset)?;
    println!(
        "Preseason {season}: {} initialized, {} failed",
        report.initialized.len(),
        report.failures.len()
    );
    for (team_id, err) in report.failures.iter().take(10) {
        println!("   - team {team_id}: {err}");
    }

    // Week 0 is the preseason snapshot week-one backfill reads from.
    match snapshot::take_snapshot(&mut store, &cfg, season, 0, reset)? {
        SnapshotOutcome::Written(n) => println!("Week 0 snapshot: {n} teams"),
        SnapshotOutcome::Unchanged(n) => println!("Week 0 snapshot unchanged ({n} teams)"),
        SnapshotOutcome::Overwritten(n) => println!("Week 0 snapshot overwritten ({n} teams)"),
    }

    for (idx, team) in store.live_ratings(season)?.iter().take(25).enumerate() {
        println!("{:>3}. {:<28} {:>7.1}", idx + 1, team.name, team.rating);
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
