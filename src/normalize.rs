use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Rate of a cumulative stat over a 90-minute basis.
/// Zero, negative or NaN minutes yield `0.0`.
pub fn per90(value: f64, minutes_played: f64) -> f64 {
    if !(minutes_played > 0.0) {
        return 0.0;
    }
    value * 90.0 / minutes_played
}

pub fn minutes_per_match(minutes_played: f64, appearances: f64) -> f64 {
    if !(appearances > 0.0) || !(minutes_played > 0.0) {
        return 0.0;
    }
    minutes_played / appearances
}

/// `saves / (saves + goals_conceded) * 100`, or `0.0` when nothing was faced.
pub fn save_percentage(saves: f64, goals_conceded: f64) -> f64 {
    let faced = saves + goals_conceded;
    if !(faced > 0.0) {
        return 0.0;
    }
    saves / faced * 100.0
}

pub fn age_from_birth_timestamp(timestamp: i64) -> Option<u32> {
    age_on(timestamp, Utc::now().date_naive())
}

fn age_on(timestamp: i64, today: NaiveDate) -> Option<u32> {
    let birth = DateTime::<Utc>::from_timestamp(timestamp, 0)?.date_naive();
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

/// Human readable market value, e.g. `4.1M €`, `500K €`.
pub fn format_market_value(value: f64) -> String {
    if !value.is_finite() || value <= 0.0 {
        return "0 €".to_string();
    }
    if value >= 1_000_000.0 {
        format!("{:.1}M €", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.0}K €", value / 1_000.0)
    } else {
        format!("{value} €")
    }
}

/// Reads plain amounts as well as [`format_market_value`] output (`4.5M €`, `500K €`).
pub fn parse_market_value(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '€' | '$' | '£' | ','))
        .collect();
    let (digits, scale) = match cleaned.chars().last()? {
        'M' | 'm' => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
        'K' | 'k' => (&cleaned[..cleaned.len() - 1], 1_000.0),
        _ => (cleaned.as_str(), 1.0),
    };
    let value = digits.parse::<f64>().ok()? * scale;
    value.is_finite().then_some(value)
}
