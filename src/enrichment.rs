use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::EnrichmentConfig;
use crate::http_client::build_http_client;
use crate::model::{Annotation, Candidate, Enriched, PlayerRecord, StatBag, id_string};

const DEFAULT_TRAJECTORY: &str = "Unknown";
const DEFAULT_CONFIDENCE: f64 = 0.75;

/// Payload sent to the provider for one player. Stats stay raw; the
/// provider does its own feature engineering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderPlayer {
    pub name: Option<String>,
    pub age: u32,
    pub club: Option<String>,
    pub footed: Option<String>,
    pub height_cm: Option<f64>,
    pub market_value: f64,
    pub league: Option<String>,
    pub league_country: Option<String>,
    pub nationality: Option<String>,
    pub positions: Vec<String>,
    pub sofascore_id: Option<String>,
    pub stats: StatBag,
}

impl ProviderPlayer {
    pub fn from_record(record: &PlayerRecord) -> Self {
        Self {
            name: Some(record.name.clone()).filter(|n| !n.is_empty()),
            age: record.resolved_age().unwrap_or(0),
            club: record.club.clone(),
            footed: record.footed.clone(),
            height_cm: record.height_cm,
            market_value: record.market_value_raw(),
            league: record.league.clone(),
            league_country: record.league_country.clone(),
            nationality: record.nationality.clone(),
            positions: record.positions.clone(),
            sofascore_id: record.external_id.clone(),
            stats: record.stats.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Prediction {
    #[serde(default, deserialize_with = "de_id")]
    pub sofascore_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub current_potential: Option<f64>,
    #[serde(default)]
    pub future_potential: Option<f64>,
    #[serde(default)]
    pub potential_growth: Option<f64>,
    #[serde(default)]
    pub development_trajectory: Option<String>,
    #[serde(default)]
    pub suitable_roles: Option<Vec<String>>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
}

impl Prediction {
    pub fn annotation(&self) -> Annotation {
        Annotation {
            current_score: self.current_potential,
            future_score: self.future_potential,
            score_growth: self.potential_growth,
            trajectory_label: self
                .development_trajectory
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TRAJECTORY.to_string()),
            suitable_roles: self.suitable_roles.clone().unwrap_or_default(),
            confidence: self
                .confidence_score
                .filter(|c| *c != 0.0)
                .unwrap_or(DEFAULT_CONFIDENCE),
        }
    }
}

fn de_id<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw.as_ref().and_then(id_string))
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    models_loaded: Option<Value>,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    players: &'a [ProviderPlayer],
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    predictions: Option<Vec<Prediction>>,
}

/// The scoring service behind the enrichment client.
pub trait PredictionProvider: Send + Sync {
    /// `Ok(true)` only when the provider reports its models as loaded.
    fn models_loaded(&self) -> Result<bool>;
    fn predict(&self, player: &ProviderPlayer) -> Result<Prediction>;
    fn predict_batch(&self, players: &[ProviderPlayer]) -> Result<Vec<Prediction>>;
}

pub struct HttpPredictionProvider {
    client: Client,
    base_url: String,
    health_timeout: Duration,
    request_timeout: Duration,
    batch_timeout: Duration,
}

impl HttpPredictionProvider {
    pub fn new(cfg: &EnrichmentConfig) -> Result<Self> {
        let client = build_http_client(cfg.batch_timeout)?;
        Ok(Self::with_client(client, cfg))
    }

    pub fn with_client(client: Client, cfg: &EnrichmentConfig) -> Self {
        Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            health_timeout: cfg.health_timeout,
            request_timeout: cfg.request_timeout,
            batch_timeout: cfg.batch_timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(anyhow!("http {}: {}", status, body))
}

impl PredictionProvider for HttpPredictionProvider {
    fn models_loaded(&self) -> Result<bool> {
        let resp = self
            .client
            .get(self.url("/health"))
            .timeout(self.health_timeout)
            .send()
            .context("health request failed")?;
        let health: HealthResponse = ensure_success(resp)?
            .json()
            .context("decode health response")?;
        Ok(matches!(health.models_loaded, Some(Value::Bool(true))))
    }

    fn predict(&self, player: &ProviderPlayer) -> Result<Prediction> {
        let resp = self
            .client
            .post(self.url("/predict"))
            .timeout(self.request_timeout)
            .header(CONTENT_TYPE, "application/json")
            .json(player)
            .send()
            .context("predict request failed")?;
        ensure_success(resp)?
            .json()
            .context("decode prediction")
    }

    fn predict_batch(&self, players: &[ProviderPlayer]) -> Result<Vec<Prediction>> {
        let resp = self
            .client
            .post(self.url("/predict_batch"))
            .timeout(self.batch_timeout)
            .header(CONTENT_TYPE, "application/json")
            .json(&BatchRequest { players })
            .send()
            .context("batch predict request failed")?;
        let body: BatchResponse = ensure_success(resp)?
            .json()
            .context("decode batch predictions")?;
        body.predictions
            .ok_or_else(|| anyhow!("batch response carried no predictions array"))
    }
}

enum BatchPredictions {
    Ready(Vec<Prediction>),
    Unavailable,
}

/// Identifier and name lookups over one batch response; first entry wins.
struct PredictionIndex<'a> {
    by_id: HashMap<&'a str, &'a Prediction>,
    by_name: HashMap<&'a str, &'a Prediction>,
}

impl<'a> PredictionIndex<'a> {
    fn build(predictions: &'a [Prediction]) -> Self {
        let mut by_id = HashMap::with_capacity(predictions.len());
        let mut by_name = HashMap::with_capacity(predictions.len());
        for p in predictions {
            if let Some(id) = p.sofascore_id.as_deref() {
                by_id.entry(id).or_insert(p);
            }
            if let Some(name) = p.name.as_deref() {
                by_name.entry(name).or_insert(p);
            }
        }
        Self { by_id, by_name }
    }

    fn find(&self, external_id: Option<&str>, name: Option<&str>) -> Option<&'a Prediction> {
        external_id
            .and_then(|id| self.by_id.get(id).copied())
            .or_else(|| name.and_then(|n| self.by_name.get(n).copied()))
    }
}

/// Attaches provider predictions to ranked players. Every failure of the
/// provider degrades to "no annotation"; nothing here returns an error.
pub struct EnrichmentClient<P = HttpPredictionProvider> {
    provider: P,
    enabled: AtomicBool,
    healthy: AtomicBool,
}

impl EnrichmentClient<HttpPredictionProvider> {
    pub fn from_config(cfg: &EnrichmentConfig) -> Result<Self> {
        let provider = HttpPredictionProvider::new(cfg)?;
        Ok(Self::new(provider, cfg.enabled))
    }
}

impl<P: PredictionProvider> EnrichmentClient<P> {
    pub fn new(provider: P, enabled: bool) -> Self {
        Self {
            provider,
            enabled: AtomicBool::new(enabled),
            healthy: AtomicBool::new(false),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        info!(enabled, "enrichment toggled");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Result of the most recent availability probe.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn check_availability(&self) -> bool {
        let healthy = match self.provider.models_loaded() {
            Ok(true) => {
                debug!("prediction provider healthy");
                true
            }
            Ok(false) => {
                warn!("prediction provider reachable but models are not loaded");
                false
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "prediction provider unavailable");
                false
            }
        };
        self.healthy.store(healthy, Ordering::Relaxed);
        healthy
    }

    /// Single-record path. Uses the last probe result rather than probing again.
    pub fn annotate_one<T: Candidate>(&self, display: T, source: &PlayerRecord) -> Enriched<T> {
        if !self.is_enabled() || !self.is_healthy() {
            return Enriched::bare(display);
        }
        let payload = ProviderPlayer::from_record(source);
        match self.provider.predict(&payload) {
            Ok(prediction) => {
                debug!(player = %source.name, future = ?prediction.future_potential, "prediction received");
                Enriched {
                    item: display,
                    insights: Some(prediction.annotation()),
                }
            }
            Err(err) => {
                warn!(player = %source.name, error = %format!("{err:#}"), "prediction failed");
                Enriched::bare(display)
            }
        }
    }

    /// `displays[i]` must describe `sources[i]`. The result has the same
    /// length, sorted by future score descending with ties in input order.
    pub fn annotate_batch<T: Candidate>(
        &self,
        displays: Vec<T>,
        sources: &[PlayerRecord],
    ) -> Vec<Enriched<T>> {
        if !self.is_enabled() || displays.is_empty() {
            return displays.into_iter().map(Enriched::bare).collect();
        }
        let available = self.check_availability();
        self.annotate_batch_probed(displays, sources, available)
    }

    /// Same as [`annotate_batch`](Self::annotate_batch) with the probe already done.
    pub fn annotate_batch_probed<T: Candidate>(
        &self,
        displays: Vec<T>,
        sources: &[PlayerRecord],
        available: bool,
    ) -> Vec<Enriched<T>> {
        if !self.is_enabled() || displays.is_empty() {
            return displays.into_iter().map(Enriched::bare).collect();
        }
        if displays.len() != sources.len() {
            warn!(
                displays = displays.len(),
                sources = sources.len(),
                "display and source lists are misaligned; unmatched rows fall back to name"
            );
        }

        let predictions = if available {
            self.request_batch(sources)
        } else {
            warn!("prediction provider not available, returning players without insights");
            BatchPredictions::Unavailable
        };

        let mut rows = match predictions {
            BatchPredictions::Ready(predictions) => merge_predictions(displays, sources, &predictions),
            BatchPredictions::Unavailable => displays.into_iter().map(Enriched::bare).collect(),
        };
        sort_by_future_score(&mut rows);
        rows
    }

    fn request_batch(&self, sources: &[PlayerRecord]) -> BatchPredictions {
        let payload: Vec<ProviderPlayer> = sources.iter().map(ProviderPlayer::from_record).collect();
        info!(players = payload.len(), "requesting batch predictions");
        match self.provider.predict_batch(&payload) {
            Ok(predictions) => {
                info!(received = predictions.len(), "batch predictions received");
                BatchPredictions::Ready(predictions)
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "batch prediction failed");
                BatchPredictions::Unavailable
            }
        }
    }
}

fn merge_predictions<T: Candidate>(
    displays: Vec<T>,
    sources: &[PlayerRecord],
    predictions: &[Prediction],
) -> Vec<Enriched<T>> {
    let index = PredictionIndex::build(predictions);
    let total = displays.len();
    let rows: Vec<Enriched<T>> = displays
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let external_id = sources.get(idx).and_then(|s| s.external_id.as_deref());
            let insights = index
                .find(external_id, item.candidate_name())
                .map(Prediction::annotation);
            Enriched { item, insights }
        })
        .collect();
    let matched = rows.iter().filter(|r| r.insights.is_some()).count();
    info!(matched, total, "prediction insights attached");
    rows
}

/// Stable: rows with equal (or missing) future scores keep their order.
pub fn sort_by_future_score<T>(rows: &mut [Enriched<T>]) {
    rows.sort_by(|a, b| {
        b.future_score()
            .partial_cmp(&a.future_score())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
