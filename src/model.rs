use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::normalize::{age_from_birth_timestamp, format_market_value, parse_market_value};

/// One player's season snapshot as stored in the record source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    #[serde(default, deserialize_with = "de_string_or_default")]
    pub name: String,
    #[serde(
        default,
        rename = "sofascore_id",
        alias = "external_id",
        deserialize_with = "de_external_id"
    )]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_u32")]
    pub age: Option<u32>,
    #[serde(default)]
    pub date_of_birth_timestamp: Option<i64>,
    #[serde(default)]
    pub club: Option<String>,
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default)]
    pub league_country: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub footed: Option<String>,
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub height_cm: Option<f64>,
    #[serde(default, deserialize_with = "de_market_value")]
    pub market_value: Option<f64>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "de_positions")]
    pub positions: Vec<String>,
    #[serde(default, deserialize_with = "de_stats")]
    pub stats: StatBag,
}

impl PlayerRecord {
    pub fn plays_any(&self, codes: &[&str]) -> bool {
        self.positions
            .iter()
            .any(|p| codes.iter().any(|c| c.eq_ignore_ascii_case(p.trim())))
    }

    pub fn resolved_age(&self) -> Option<u32> {
        self.age
            .or_else(|| self.date_of_birth_timestamp.and_then(age_from_birth_timestamp))
    }

    pub fn market_value_raw(&self) -> f64 {
        self.market_value
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(0.0)
    }

    pub fn display(&self) -> DisplayPlayer {
        let raw = self.market_value_raw();
        DisplayPlayer {
            name: Some(self.name.clone()).filter(|n| !n.is_empty()),
            age: self.resolved_age(),
            club: self.club.clone(),
            footed: self.footed.clone(),
            height_cm: self.height_cm,
            market_value: format_market_value(raw),
            market_value_raw: raw,
            image: self.image.clone(),
            league: self.league.clone(),
            league_country: self.league_country.clone(),
            nationality: self.nationality.clone(),
            positions: (!self.positions.is_empty()).then(|| self.positions.join(",")),
        }
    }

    /// Full view for single-player lookups; the external id stays internal.
    pub fn profile(&self) -> PlayerProfile {
        PlayerProfile {
            player: self.display(),
            stats: self.stats.clone(),
        }
    }
}

/// Named cumulative counters. Values are kept verbatim so they can be
/// forwarded to the prediction provider; numeric reads default to `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatBag(Map<String, Value>);

impl StatBag {
    pub fn get(&self, key: &str) -> f64 {
        self.0
            .get(key)
            .and_then(value_as_f64)
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.0.insert(key.into(), Value::Number(n));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for StatBag {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut bag = StatBag::default();
        for (k, v) in iter {
            bag.insert(k, v);
        }
        bag
    }
}

/// Fields returned to callers for a ranked player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayPlayer {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub club: Option<String>,
    pub footed: Option<String>,
    pub height_cm: Option<f64>,
    pub market_value: String,
    pub market_value_raw: f64,
    pub image: Option<String>,
    pub league: Option<String>,
    pub league_country: Option<String>,
    pub nationality: Option<String>,
    pub positions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    #[serde(flatten)]
    pub player: DisplayPlayer,
    pub stats: StatBag,
}

/// A display row with the rule score that qualified it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPlayer {
    #[serde(flatten)]
    pub player: DisplayPlayer,
    pub rank_score: f64,
}

/// Anything the enrichment stage can fall back to matching by name.
pub trait Candidate {
    fn candidate_name(&self) -> Option<&str>;
}

impl Candidate for DisplayPlayer {
    fn candidate_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Candidate for ScoredPlayer {
    fn candidate_name(&self) -> Option<&str> {
        self.player.candidate_name()
    }
}

impl Candidate for PlayerProfile {
    fn candidate_name(&self) -> Option<&str> {
        self.player.candidate_name()
    }
}

/// Predictive scores attached by the enrichment provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub current_score: Option<f64>,
    pub future_score: Option<f64>,
    pub score_growth: Option<f64>,
    pub trajectory_label: String,
    pub suitable_roles: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enriched<T> {
    #[serde(flatten)]
    pub item: T,
    pub insights: Option<Annotation>,
}

impl<T> Enriched<T> {
    pub fn bare(item: T) -> Self {
        Self {
            item,
            insights: None,
        }
    }

    /// Future score used for the final ordering; missing or non-finite reads as `0.0`.
    pub fn future_score(&self) -> f64 {
        self.insights
            .as_ref()
            .and_then(|a| a.future_score)
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPlayer {
    pub id: usize,
    #[serde(flatten)]
    pub entry: Enriched<ScoredPlayer>,
}

pub type RankedList = Vec<RankedPlayer>;

pub(crate) fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Stringify an identifier the way it is compared against provider output:
/// integral numbers render without a fraction.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f.abs() < 9.0e15 {
                    Some(format!("{}", f as i64))
                } else {
                    Some(f.to_string())
                }
            }
        }
        _ => None,
    }
}

fn de_external_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw.as_ref().and_then(id_string))
}

fn de_string_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn de_lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw.as_ref().and_then(value_as_f64).filter(|v| v.is_finite()))
}

fn de_market_value<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    let value = match raw {
        Some(Value::String(s)) => parse_market_value(&s),
        other => other.as_ref().and_then(value_as_f64),
    };
    Ok(value.filter(|v| v.is_finite()))
}

fn de_lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw
        .as_ref()
        .and_then(value_as_f64)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u32))
}

fn de_positions<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    let out = match raw {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        _ => Vec::new(),
    };
    Ok(out)
}

fn de_stats<'de, D: Deserializer<'de>>(d: D) -> Result<StatBag, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    Ok(match raw {
        Some(Value::Object(map)) => StatBag(map),
        _ => StatBag::default(),
    })
}
