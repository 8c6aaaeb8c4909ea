use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use gridiron_ratings::import::{self, ContestRecord, ImportSummary, TeamRecord};
use gridiron_ratings::model::ReferenceRank;
use gridiron_ratings::store::{self, Store};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let teams = arg_value("--teams").map(PathBuf::from);
    let contests = arg_value("--contests").map(PathBuf::from);
    let ranks = arg_value("--ranks").map(PathBuf::from);
    if teams.is_none() && contests.is_none() && ranks.is_none() {
        return Err(anyhow!(
            "usage: import [--db PATH] [--teams FILE] [--contests FILE] [--ranks FILE]"
        ));
    }

    let db_path = resolve_db_path().context("unable to resolve sqlite path")?;
    let store = Store::open(&db_path)
        .with_context(|| format!("opening {}", db_path.display()))?;

    // Teams first; contests reference them.
    if let Some(path) = teams {
        let records: Vec<TeamRecord> = read(&path)?;
        print_summary("teams", &import::import_teams(&store, &records));
    }
    if let Some(path) = contests {
        let records: Vec<ContestRecord> = read(&path)?;
        print_summary("contests", &import::import_contests(&store, &records));
    }
    if let Some(path) = ranks {
        let records: Vec<ReferenceRank> = read(&path)?;
        print_summary("reference ranks", &import::import_reference_ranks(&store, &records));
    }

    println!("DB: {}", db_path.display());
    Ok(())
}

fn read<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    import::read_json_file(path).with_context(|| format!("reading {}", path.display()))
}

fn print_summary(label: &str, summary: &ImportSummary) {
    println!(
        "{label}: inserted={} updated={} unchanged={} errors={}",
        summary.inserted,
        summary.updated,
        summary.skipped,
        summary.errors.len()
    );
    for err in summary.errors.iter().take(10) {
        println!("   - {err}");
    }
}

fn resolve_db_path() -> Option<PathBuf> {
    arg_value("--db")
        .or_else(|| std::env::var("RATINGS_DB").ok())
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
        .or_else(store::default_db_path)
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
