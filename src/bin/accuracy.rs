use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};

use gridiron_ratings::accuracy;
use gridiron_ratings::store::{self, Store};

const DEFAULT_POLL: &str = "ap";

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let season = parse_arg::<i32>("--season", arg_value("--season"))?
        .ok_or_else(|| {
            anyhow!("usage: accuracy --season YEAR [--from-week N] [--to-week N] [--poll NAME] [--json]")
        })?;
    let from_week = parse_arg::<u32>("--from-week", arg_value("--from-week"))?.unwrap_or(1);
    let to_week = parse_arg::<u32>("--to-week", arg_value("--to-week"))?.unwrap_or(u32::MAX);
    let poll = arg_value("--poll").unwrap_or_else(|| DEFAULT_POLL.to_string());

    let db_path = resolve_db_path().context("unable to resolve sqlite path")?;
    let mut store = Store::open(&db_path)
        .with_context(|| format!("opening {}", db_path.display()))?;

    accuracy::grade_predictions(&mut store, season)?;
    let report = accuracy::compare(&store, season, from_week..=to_week, &poll)?;

    if has_flag("--json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Season {season} vs poll {poll}");
    println!(
        "Engine:    {}/{} ({:.1}%)",
        report.engine.correct,
        report.engine.picks,
        report.engine.rate() * 100.0
    );
    println!(
        "Reference: {}/{} ({:.1}%)",
        report.reference.correct,
        report.reference.picks,
        report.reference.rate() * 100.0
    );
    let h2h = &report.head_to_head;
    println!(
        "Head-to-head on {} contests: agreed={} engine-only={} reference-only={}",
        h2h.both_picked, h2h.agreed, h2h.engine_only_correct, h2h.reference_only_correct
    );
    println!(
        "Brier {:.4}  log loss {:.4}  ECE {:.4}",
        report.metrics.brier, report.metrics.log_loss, report.calibration_error
    );
    for week in &report.per_week {
        println!(
            "  week {:>2}: engine {}/{}  reference {}/{}",
            week.week,
            week.engine.correct,
            week.engine.picks,
            week.reference.correct,
            week.reference.picks
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
