use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ENRICHMENT_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BATCH_TIMEOUT_SECS: u64 = 90;
const CACHE_DIR: &str = "scout_rank";
const DB_FILE: &str = "players.sqlite";

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    pub base_url: String,
    pub health_timeout: Duration,
    pub request_timeout: Duration,
    pub batch_timeout: Duration,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_ENRICHMENT_URL.to_string(),
            health_timeout: Duration::from_secs(DEFAULT_HEALTH_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            batch_timeout: Duration::from_secs(DEFAULT_BATCH_TIMEOUT_SECS),
        }
    }
}

impl EnrichmentConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup_bool(&lookup, "ENRICHMENT_ENABLED", true);
        let base_url = lookup("ENRICHMENT_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_ENRICHMENT_URL.to_string());
        let health_timeout = lookup_secs(
            &lookup,
            "ENRICHMENT_HEALTH_TIMEOUT_SECS",
            DEFAULT_HEALTH_TIMEOUT_SECS,
            1,
            30,
        );
        let request_timeout = lookup_secs(
            &lookup,
            "ENRICHMENT_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
            1,
            120,
        );
        let batch_timeout = lookup_secs(
            &lookup,
            "ENRICHMENT_BATCH_TIMEOUT_SECS",
            DEFAULT_BATCH_TIMEOUT_SECS,
            10,
            600,
        )
        // a whole batch never gets less time than one record
        .max(request_timeout)
        .max(health_timeout);

        Self {
            enabled,
            base_url,
            health_timeout,
            request_timeout,
            batch_timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub enrichment: EnrichmentConfig,
    pub players_db_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let players_db_path = lookup("PLAYERS_DB_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .or_else(default_db_path);
        Self {
            enrichment: EnrichmentConfig::from_lookup(&lookup),
            players_db_path,
        }
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn lookup_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    lookup(key)
        .map(|v| {
            let t = v.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}

fn lookup_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
    min: u64,
    max: u64,
) -> Duration {
    let secs = lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
        .clamp(min, max);
    Duration::from_secs(secs)
}
