use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scout_rank::config::AppConfig;
use scout_rank::enrichment::EnrichmentClient;
use scout_rank::export::write_ranked_workbook;
use scout_rank::pipeline::Pipeline;
use scout_rank::position_rules::Role;
use scout_rank::record_source::{JsonLinesSource, RecordSource, SqliteSource};

#[derive(Debug, Default)]
struct Args {
    role: Option<String>,
    all: bool,
    player: Option<String>,
    db: Option<PathBuf>,
    jsonl: Option<PathBuf>,
    xlsx: Option<PathBuf>,
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    init_tracing();

    let args = parse_args(std::env::args().skip(1).collect())?;
    let cfg = AppConfig::from_env();

    let source = open_source(&args, &cfg)?;
    let enrichment = EnrichmentClient::from_config(&cfg.enrichment)?;
    if enrichment.is_enabled() {
        let healthy = enrichment.check_availability();
        info!(url = %cfg.enrichment.base_url, healthy, "prediction provider checked");
    }
    let pipeline = Pipeline::new(source.as_ref(), &enrichment);

    if let Some(name) = args.player.as_deref() {
        let body = match pipeline.lookup_player(name)? {
            Some(player) => json!({ "success": true, "data": player }),
            None => json!({ "success": false, "error": "Player not found", "name": name }),
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let sheets = if args.all {
        pipeline.run_all().context("rank players for every role")?
    } else {
        let raw = args
            .role
            .as_deref()
            .ok_or_else(|| anyhow!("pass --role <slug>, --all or --player <name>"))?;
        let role = Role::from_slug(raw).ok_or_else(|| anyhow!("unknown role {raw:?}"))?;
        let ranked = pipeline
            .run(role)
            .with_context(|| format!("rank {} players", role.label()))?;
        vec![(role, ranked)]
    };

    if let Some(path) = args.xlsx.as_deref() {
        let report = write_ranked_workbook(path, &sheets)?;
        info!(path = %path.display(), sheets = report.sheets, rows = report.rows, "workbook written");
    }

    let body = if let [(_, ranked)] = sheets.as_slice() {
        json!({ "success": true, "count": ranked.len(), "data": ranked })
    } else {
        let data: serde_json::Map<String, serde_json::Value> = sheets
            .iter()
            .map(|(role, ranked)| {
                (
                    role.slug().to_string(),
                    json!({ "count": ranked.len(), "data": ranked }),
                )
            })
            .collect();
        json!({ "success": true, "count": sheets.len(), "data": data })
    };
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_source(args: &Args, cfg: &AppConfig) -> Result<Box<dyn RecordSource>> {
    if let Some(path) = args.jsonl.as_ref() {
        info!(path = %path.display(), "reading players from json lines");
        return Ok(Box::new(JsonLinesSource::new(path.clone())));
    }
    let path = args
        .db
        .clone()
        .or_else(|| cfg.players_db_path.clone())
        .context("unable to resolve players sqlite path")?;
    let source = SqliteSource::open_read_only(&path)
        .context("players db unavailable; run ingest_players first")?;
    Ok(Box::new(source))
}

fn parse_args(args: Vec<String>) -> Result<Args> {
    let mut out = Args::default();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let (key, inline) = match arg.split_once('=') {
            Some((k, v)) => (k.to_string(), Some(v.to_string())),
            None => (arg.clone(), None),
        };
        let mut value = |name: &str| -> Result<String> {
            inline
                .clone()
                .or_else(|| iter.next())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow!("{name} needs a value"))
        };
        match key.as_str() {
            "--role" => out.role = Some(value("--role")?),
            "--all" => out.all = true,
            "--player" => out.player = Some(value("--player")?),
            "--db" => out.db = Some(PathBuf::from(value("--db")?)),
            "--jsonl" => out.jsonl = Some(PathBuf::from(value("--jsonl")?)),
            "--xlsx" => out.xlsx = Some(PathBuf::from(value("--xlsx")?)),
            other => bail!("unrecognised argument {other:?}"),
        }
    }
    Ok(out)
}
