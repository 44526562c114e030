use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use scout_rank::config::AppConfig;
use scout_rank::record_source::{SqliteSource, import_json_lines};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let input = parse_input_arg().context("usage: ingest_players [--db <path>] <players.jsonl>")?;
    let db_path = parse_db_path_arg()
        .or_else(|| AppConfig::from_env().players_db_path)
        .context("unable to resolve sqlite path")?;

    let mut source = SqliteSource::open(&db_path)?;
    let imported = import_json_lines(source.connection_mut(), &input)?;
    let total = source.count()?;
    info!(input = %input.display(), imported, "import finished");

    println!("Player import complete");
    println!("DB: {}", db_path.display());
    println!("Imported: {imported}");
    println!("Stored players: {total}");
    Ok(())
}

fn parse_input_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut skip_next = false;
    for arg in &args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--db" {
            skip_next = true;
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        if !arg.trim().is_empty() {
            return Some(PathBuf::from(arg));
        }
    }
    None
}

fn parse_db_path_arg() -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(path) = arg.strip_prefix("--db=") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == "--db" {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(PathBuf::from(next));
            }
        }
    }
    None
}
