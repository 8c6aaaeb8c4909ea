use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};

use gridiron_ratings::EngineConfig;
use gridiron_ratings::backfill::{self, BackfillOptions, BackfillService, FallbackReason};
use gridiron_ratings::model::parse_ts;
use gridiron_ratings::store::{self, Store};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let season = parse_arg::<i32>("--season", arg_value("--season"))?;
    let week = parse_arg::<u32>("--week", arg_value("--week"))?;
    let window = rollback_window(arg_value("--rollback-from"), arg_value("--rollback-to"))?;
    let dry_run = has_flag("--dry-run");

    let cfg = EngineConfig::from_env().context("loading engine config")?;
    let db_path = resolve_db_path().context("unable to resolve sqlite path")?;
    let mut store = Store::open(&db_path)
        .with_context(|| format!("opening {}", db_path.display()))?;

    if let Some((from, to)) = window {
        let n = backfill::rollback(&mut store, from, to, dry_run)?;
        if dry_run {
            println!("Rollback preview: {n} retrospective predictions would be removed");
        } else {
            println!("Rollback removed {n} retrospective predictions");
        }
        return Ok(());
    }

    let service = BackfillService::new(&cfg);

    if has_flag("--prospective") {
        let season = season.ok_or_else(|| anyhow!("--prospective requires --season"))?;
        let report = service.predict_scheduled(&mut store, season, week)?;
        println!(
            "Prospective: examined={} created={} skipped={} errors={}",
            report.examined,
            report.created,
            report.skipped_existing,
            report.errors.len()
        );
        return Ok(());
    }

    let report = service.run(
        &mut store,
        &BackfillOptions {
            season,
            dry_run,
            stop: None,
        },
    )?;

    if dry_run {
        println!(
            "Backfill preview: {} contests, {} predictions",
            report.examined,
            report.predictions.len()
        );
        for p in report.predictions.iter().take(20) {
            println!(
                "  s{} w{:>2} contest {:<8} home {:.1} ({:.0}%) vs away {:.1} -> {} {:.0}-{:.0} [{}]{}",
                p.season,
                p.week,
                p.contest_id,
                p.home_rating,
                p.home_prob * 100.0,
                p.away_rating,
                p.predicted_winner.as_str(),
                p.home_score,
                p.away_score,
                p.confidence.as_str(),
                if p.used_fallback { " fallback" } else { "" }
            );
        }
    } else {
        println!(
            "Backfill run {}: examined={} created={} skipped={} errors={}",
            report.run_id.unwrap_or_default(),
            report.examined,
            report.created,
            report.skipped_existing,
            report.errors.len()
        );
    }

    let missing = report
        .fallbacks
        .iter()
        .filter(|note| note.reason == FallbackReason::MissingSnapshot)
        .count();
    println!(
        "Fallback ratings: {} ({missing} from missing snapshots)",
        report.fallbacks.len()
    );
    for (id, err) in report.errors.iter().take(10) {
        println!("   - contest {id}: {err}");
    }
    Ok(())
}

/// Both bounds or neither; a half-open window is an error.
fn rollback_window(
    from: Option<String>,
    to: Option<String>,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
    match (from, to) {
        (None, None) => Ok(None),
        (Some(from), Some(to)) => {
            let from = parse_ts(from.trim()).context("--rollback-from")?;
            let to = parse_ts(to.trim()).context("--rollback-to")?;
            Ok(Some((from, to)))
        }
        _ => Err(anyhow!(
            "--rollback-from and --rollback-to must be given together"
        )),
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_a_rollback_window_is_rejected() {
        let err = rollback_window(Some("2024-09-01T00:00:00.000000Z".into()), None).unwrap_err();
        assert!(err.to_string().contains("together"));
        assert!(rollback_window(None, Some("2024-09-01T00:00:00.000000Z".into())).is_err());
        assert!(rollback_window(None, None).unwrap().is_none());

        let (from, to) = rollback_window(
            Some("2024-09-01T00:00:00.000000Z".into()),
            Some("2024-09-02T00:00:00.000000Z".into()),
        )
        .unwrap()
        .unwrap();
        assert!(from < to);
    }

    #[test]
    fn bad_numbers_are_errors_not_missing() {
        assert!(parse_arg::<i32>("--season", Some("20x4".into())).is_err());
        assert_eq!(parse_arg::<i32>("--season", Some(" 2024 ".into())).unwrap(), Some(2024));
        assert_eq!(parse_arg::<u32>("--week", None).unwrap(), None);
    }
}
