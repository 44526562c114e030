use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::model::{PlayerRecord, StatBag};
use crate::normalize::{minutes_per_match, per90, save_percentage};

pub const MIN_APPEARANCES: f64 = 3.0;
pub const MIN_MINUTES_PER_MATCH: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Striker,
    AttackingMidfielder,
    LeftWinger,
    RightWinger,
    RightMidfielder,
    LeftMidfielder,
    DefensiveMidfielder,
    DeepLyingPlaymaker,
    Mezzala,
    CentralMidfielder,
    BoxToBox,
    RightFullBack,
    LeftFullBack,
    RightDefensiveBack,
    LeftDefensiveBack,
    CentreBack,
    Goalkeeper,
}

impl Role {
    pub const ALL: [Role; 17] = [
        Role::Striker,
        Role::AttackingMidfielder,
        Role::LeftWinger,
        Role::RightWinger,
        Role::RightMidfielder,
        Role::LeftMidfielder,
        Role::DefensiveMidfielder,
        Role::DeepLyingPlaymaker,
        Role::Mezzala,
        Role::CentralMidfielder,
        Role::BoxToBox,
        Role::RightFullBack,
        Role::LeftFullBack,
        Role::RightDefensiveBack,
        Role::LeftDefensiveBack,
        Role::CentreBack,
        Role::Goalkeeper,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Role::Striker => "st",
            Role::AttackingMidfielder => "am",
            Role::LeftWinger => "lw",
            Role::RightWinger => "rw",
            Role::RightMidfielder => "rm",
            Role::LeftMidfielder => "lm",
            Role::DefensiveMidfielder => "dm",
            Role::DeepLyingPlaymaker => "dm-playmaker",
            Role::Mezzala => "mezzala",
            Role::CentralMidfielder => "mc",
            Role::BoxToBox => "box-to-box",
            Role::RightFullBack => "right-full-back",
            Role::LeftFullBack => "left-full-back",
            Role::RightDefensiveBack => "right-defend-back",
            Role::LeftDefensiveBack => "left-defend-back",
            Role::CentreBack => "dc",
            Role::Goalkeeper => "gk",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Striker => "Striker",
            Role::AttackingMidfielder => "Attacking Midfielder",
            Role::LeftWinger => "Left Winger",
            Role::RightWinger => "Right Winger",
            Role::RightMidfielder => "Right Midfielder",
            Role::LeftMidfielder => "Left Midfielder",
            Role::DefensiveMidfielder => "Defensive Midfielder",
            Role::DeepLyingPlaymaker => "Deep-Lying Playmaker",
            Role::Mezzala => "Mezzala",
            Role::CentralMidfielder => "Central Midfielder",
            Role::BoxToBox => "Box-to-Box",
            Role::RightFullBack => "Right Full-Back",
            Role::LeftFullBack => "Left Full-Back",
            Role::RightDefensiveBack => "Right Defensive Back",
            Role::LeftDefensiveBack => "Left Defensive Back",
            Role::CentreBack => "Centre-Back",
            Role::Goalkeeper => "Goalkeeper",
        }
    }

    /// Accepts slugs, labels and the legacy route names (`stPlayers`, `dcPlayers`, ...).
    pub fn from_slug(raw: &str) -> Option<Role> {
        let key: String = raw
            .trim()
            .trim_end_matches("Players")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if key.is_empty() {
            return None;
        }
        let aliased = match key.as_str() {
            "dmplaymaker" | "deeplyingplaymaker" => Some(Role::DeepLyingPlaymaker),
            "mezella" => Some(Role::Mezzala),
            "rightdefendback" | "rightdefensiveback" => Some(Role::RightDefensiveBack),
            "leftdefendback" | "leftdefensiveback" => Some(Role::LeftDefensiveBack),
            "cb" | "centreback" | "centerback" => Some(Role::CentreBack),
            "cm" => Some(Role::CentralMidfielder),
            _ => None,
        };
        aliased.or_else(|| {
            Role::ALL.into_iter().find(|role| {
                let slug: String = role.slug().chars().filter(|c| *c != '-').collect();
                let label: String = role
                    .label()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .to_ascii_lowercase();
                slug == key || label == key
            })
        })
    }

    pub fn rule(self) -> &'static PositionRule {
        &RULES[&self]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Where a threshold reads its value from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    /// Cumulative counter normalized to a 90-minute basis.
    Per90(&'static str),
    /// Field that is already a rate or percentage.
    Raw(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    AtLeast(f64),
    AtMost(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub metric: Metric,
    pub bound: Bound,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RankFormula {
    /// Weighted sum of per-90 metrics.
    Weighted(&'static [(&'static str, f64)]),
    SavePercentage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionRule {
    pub role: Role,
    pub role_codes: &'static [&'static str],
    pub min_appearances: f64,
    pub min_minutes_per_match: f64,
    pub min_score: f64,
    pub thresholds: &'static [Threshold],
    pub formula: RankFormula,
}

/// Per-record view with minutes resolved once.
#[derive(Debug, Clone, Copy)]
pub struct RecordMetrics<'a> {
    stats: &'a StatBag,
    minutes_played: f64,
    appearances: f64,
}

impl<'a> RecordMetrics<'a> {
    pub fn new(stats: &'a StatBag) -> Self {
        Self {
            stats,
            minutes_played: stats.get("minutesPlayed").max(0.0),
            appearances: stats.get("appearances"),
        }
    }

    pub fn per90(&self, key: &str) -> f64 {
        per90(self.stats.get(key), self.minutes_played)
    }

    pub fn raw(&self, key: &str) -> f64 {
        self.stats.get(key)
    }

    pub fn read(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Per90(key) => self.per90(key),
            Metric::Raw(key) => self.raw(key),
        }
    }

    pub fn appearances(&self) -> f64 {
        self.appearances
    }

    pub fn minutes_per_match(&self) -> f64 {
        minutes_per_match(self.minutes_played, self.appearances)
    }
}

impl PositionRule {
    pub fn is_candidate(&self, record: &PlayerRecord) -> bool {
        record.plays_any(self.role_codes)
    }

    pub fn rank_score(&self, metrics: &RecordMetrics<'_>) -> f64 {
        match self.formula {
            RankFormula::Weighted(terms) => terms
                .iter()
                .map(|(key, weight)| metrics.per90(key) * weight)
                .sum(),
            RankFormula::SavePercentage => {
                save_percentage(metrics.raw("saves"), metrics.raw("goalsConceded"))
            }
        }
    }

    /// Runs the predicate; on pass returns the rank score.
    pub fn evaluate(&self, metrics: &RecordMetrics<'_>) -> Option<f64> {
        if metrics.appearances() < self.min_appearances {
            return None;
        }
        if metrics.minutes_per_match() < self.min_minutes_per_match {
            return None;
        }
        let passes = self.thresholds.iter().all(|t| {
            let v = metrics.read(t.metric);
            match t.bound {
                Bound::AtLeast(min) => v >= min,
                Bound::AtMost(max) => v <= max,
            }
        });
        if !passes {
            return None;
        }
        let score = self.rank_score(metrics);
        (score.is_finite() && score >= self.min_score).then_some(score)
    }

    pub fn score_record(&self, record: &PlayerRecord) -> Option<f64> {
        if !self.is_candidate(record) {
            return None;
        }
        self.evaluate(&RecordMetrics::new(&record.stats))
    }
}

const fn at_least(metric: Metric, min: f64) -> Threshold {
    Threshold {
        metric,
        bound: Bound::AtLeast(min),
    }
}

const fn at_most(metric: Metric, max: f64) -> Threshold {
    Threshold {
        metric,
        bound: Bound::AtMost(max),
    }
}

use Metric::{Per90, Raw};

const WINGER_TERMS: &[(&str, f64)] = &[
    ("goalsAssistsSum", 1.0),
    ("keyPasses", 1.0),
    ("expectedAssists", 1.0),
    ("passToAssist", 1.0),
];
const WINGER_LIMITS: &[Threshold] = &[at_least(Per90("keyPasses"), 0.7)];

const WIDE_MID_TERMS: &[(&str, f64)] = &[
    ("assists", 1.0),
    ("totalCross", 1.0),
    ("tackles", 1.0),
    ("keyPasses", 1.0),
];
const WIDE_MID_LIMITS: &[Threshold] = &[
    at_least(Per90("accurateFinalThirdPasses"), 6.0),
    at_least(Per90("totalCross"), 2.0),
    at_least(Per90("tackles"), 0.9),
];

const FULL_BACK_TERMS: &[(&str, f64)] = &[
    ("totalCross", 1.0),
    ("tackles", 1.0),
    ("keyPasses", 1.0),
    ("accurateFinalThirdPasses", 1.0),
    ("assists", 1.0),
];
const FULL_BACK_LIMITS: &[Threshold] = &[at_least(Per90("totalCross"), 2.0)];

const BACK_LINE_TERMS: &[(&str, f64)] = &[
    ("ballRecovery", 1.0),
    ("tackles", 1.0),
    ("interceptions", 1.0),
    ("clearances", 1.0),
];
const DEFENSIVE_BACK_LIMITS: &[Threshold] = &[
    at_least(Raw("totalDuelsWonPercentage"), 48.0),
    at_least(Per90("ballRecovery"), 3.5),
];

fn rule(
    role: Role,
    role_codes: &'static [&'static str],
    formula: RankFormula,
    min_score: f64,
    thresholds: &'static [Threshold],
) -> PositionRule {
    PositionRule {
        role,
        role_codes,
        min_appearances: MIN_APPEARANCES,
        min_minutes_per_match: MIN_MINUTES_PER_MATCH,
        min_score,
        thresholds,
        formula,
    }
}

const STRIKER_TERMS: &[(&str, f64)] = &[
    ("goalsAssistsSum", 3.0),
    ("expectedGoals", 2.0),
    ("totalShots", 1.0),
];
const STRIKER_LIMITS: &[Threshold] = &[at_least(Raw("goalConversionPercentage"), 18.4)];

const CREATOR_TERMS: &[(&str, f64)] = &[
    ("assists", 1.0),
    ("expectedAssists", 1.0),
    ("bigChancesCreated", 1.0),
    ("keyPasses", 1.0),
];
const CREATOR_LIMITS: &[Threshold] = &[at_least(Per90("accurateFinalThirdPasses"), 8.0)];

const SHIELD_TERMS: &[(&str, f64)] = &[
    ("ballRecovery", 1.0),
    ("tackles", 1.0),
    ("interceptions", 1.0),
];
const SHIELD_LIMITS: &[Threshold] = &[
    at_least(Raw("totalDuelsWonPercentage"), 40.0),
    at_least(Per90("ballRecovery"), 4.5),
];

const PLAYMAKER_TERMS: &[(&str, f64)] = &[
    ("keyPasses", 1.0),
    ("accurateFinalThirdPasses", 1.0),
    ("interceptions", 1.0),
];
const PLAYMAKER_LIMITS: &[Threshold] = &[at_least(Raw("accurateLongBalls"), 3.0)];

const MEZZALA_TERMS: &[(&str, f64)] = &[
    ("bigChancesCreated", 1.0),
    ("goalsAssistsSum", 1.0),
    ("keyPasses", 1.0),
    ("possessionWonAttThird", 1.0),
];
const MEZZALA_LIMITS: &[Threshold] = &[
    at_least(Raw("successfulDribblesPercentage"), 50.0),
    at_least(Per90("accurateFinalThirdPasses"), 7.0),
];

const CENTRAL_TERMS: &[(&str, f64)] = &[
    ("accurateFinalThirdPasses", 1.0),
    ("tackles", 1.0),
    ("keyPasses", 1.0),
    ("ballRecovery", 1.0),
];
const CENTRAL_LIMITS: &[Threshold] = &[at_least(Raw("accuratePassesPercentage"), 84.5)];

const BOX_TERMS: &[(&str, f64)] = &[
    ("possessionWonAttThird", 1.0),
    ("tackles", 1.0),
    ("keyPasses", 1.0),
    ("ballRecovery", 1.0),
    ("successfulDribbles", 1.0),
];
const BOX_LIMITS: &[Threshold] = &[
    at_least(Per90("possessionWonAttThird"), 0.25),
    at_least(Per90("successfulDribbles"), 0.15),
    at_least(Per90("keyPasses"), 0.5),
    at_least(Per90("tackles"), 1.0),
    at_least(Per90("ballRecovery"), 3.0),
    at_least(Raw("totalDuelsWonPercentage"), 45.0),
];

const CENTRE_BACK_LIMITS: &[Threshold] = &[
    at_least(Raw("totalDuelsWonPercentage"), 48.0),
    at_most(Per90("errorLeadToGoal"), 0.15),
];

const KEEPER_LIMITS: &[Threshold] = &[at_least(Raw("goalsPrevented"), 0.0)];

static RULES: Lazy<HashMap<Role, PositionRule>> = Lazy::new(|| {
    use RankFormula::{SavePercentage, Weighted};

    [
        rule(Role::Striker, &["ST"], Weighted(STRIKER_TERMS), 5.0, STRIKER_LIMITS),
        rule(Role::AttackingMidfielder, &["AM"], Weighted(CREATOR_TERMS), 1.5, CREATOR_LIMITS),
        rule(Role::LeftWinger, &["LW", "ML"], Weighted(WINGER_TERMS), 2.0, WINGER_LIMITS),
        rule(Role::RightWinger, &["RW", "MR"], Weighted(WINGER_TERMS), 2.0, WINGER_LIMITS),
        rule(Role::RightMidfielder, &["MR", "DR"], Weighted(WIDE_MID_TERMS), 5.0, WIDE_MID_LIMITS),
        rule(Role::LeftMidfielder, &["ML", "DL"], Weighted(WIDE_MID_TERMS), 5.0, WIDE_MID_LIMITS),
        rule(Role::DefensiveMidfielder, &["DM"], Weighted(SHIELD_TERMS), 7.5, SHIELD_LIMITS),
        rule(
            Role::DeepLyingPlaymaker,
            &["DM", "MC"],
            Weighted(PLAYMAKER_TERMS),
            13.0,
            PLAYMAKER_LIMITS,
        ),
        rule(Role::Mezzala, &["MC"], Weighted(MEZZALA_TERMS), 3.0, MEZZALA_LIMITS),
        rule(Role::CentralMidfielder, &["MC"], Weighted(CENTRAL_TERMS), 17.0, CENTRAL_LIMITS),
        rule(Role::BoxToBox, &["DM", "MC"], Weighted(BOX_TERMS), 6.5, BOX_LIMITS),
        rule(Role::RightFullBack, &["DR"], Weighted(FULL_BACK_TERMS), 13.0, FULL_BACK_LIMITS),
        rule(Role::LeftFullBack, &["DL"], Weighted(FULL_BACK_TERMS), 13.0, FULL_BACK_LIMITS),
        rule(
            Role::RightDefensiveBack,
            &["DR"],
            Weighted(BACK_LINE_TERMS),
            9.0,
            DEFENSIVE_BACK_LIMITS,
        ),
        rule(
            Role::LeftDefensiveBack,
            &["DL"],
            Weighted(BACK_LINE_TERMS),
            9.0,
            DEFENSIVE_BACK_LIMITS,
        ),
        rule(Role::CentreBack, &["DC"], Weighted(BACK_LINE_TERMS), 11.0, CENTRE_BACK_LIMITS),
        rule(Role::Goalkeeper, &["GK"], SavePercentage, 70.0, KEEPER_LIMITS),
    ]
    .into_iter()
    .map(|r| (r.role, r))
    .collect()
});
