use anyhow::Result;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use scout_rank::enrichment::{EnrichmentClient, Prediction, PredictionProvider, ProviderPlayer};
use scout_rank::model::{PlayerRecord, StatBag};
use scout_rank::position_rules::Role;
use scout_rank::qualify::{qualify, qualify_all_roles};

const CODES: [&str; 11] = ["ST", "AM", "LW", "RW", "ML", "MR", "DM", "MC", "DL", "DR", "DC"];

const STAT_KEYS: [&str; 18] = [
    "goalsAssistsSum",
    "expectedGoals",
    "totalShots",
    "assists",
    "expectedAssists",
    "bigChancesCreated",
    "keyPasses",
    "accurateFinalThirdPasses",
    "totalCross",
    "tackles",
    "interceptions",
    "clearances",
    "ballRecovery",
    "possessionWonAttThird",
    "successfulDribbles",
    "passToAssist",
    "accurateLongBalls",
    "errorLeadToGoal",
];

/// Deterministic pseudo-random squad; no two runs differ.
fn synthetic_records(n: usize) -> Vec<PlayerRecord> {
    let mut seed = 0x9e37_79b9_7f4a_7c15u64;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        (seed % 10_000) as f64 / 10_000.0
    };

    (0..n)
        .map(|i| {
            let appearances = 1.0 + (next() * 37.0).floor();
            let minutes = appearances * (10.0 + next() * 80.0);
            let mut stats = StatBag::default();
            stats.insert("appearances", appearances);
            stats.insert("minutesPlayed", minutes);
            for key in STAT_KEYS {
                stats.insert(key, (next() * appearances * 6.0).floor());
            }
            stats.insert("goalConversionPercentage", next() * 40.0);
            stats.insert("totalDuelsWonPercentage", 30.0 + next() * 40.0);
            stats.insert("successfulDribblesPercentage", 30.0 + next() * 50.0);
            stats.insert("accuratePassesPercentage", 65.0 + next() * 30.0);
            stats.insert("saves", (next() * appearances * 4.0).floor());
            stats.insert("goalsConceded", (next() * appearances * 2.0).floor());
            stats.insert("goalsPrevented", next() * 6.0 - 3.0);

            let primary = if i % 12 == 0 {
                "GK"
            } else {
                CODES[i % CODES.len()]
            };
            let secondary = CODES[(i / 3) % CODES.len()];
            PlayerRecord {
                name: format!("Player {i}"),
                external_id: Some((100_000 + i).to_string()),
                age: Some(17 + (i % 20) as u32),
                market_value: Some(250_000.0 * ((i % 40) as f64 + 1.0)),
                positions: vec![primary.to_string(), secondary.to_string()],
                stats,
                ..Default::default()
            }
        })
        .collect()
}

/// Echoes a prediction for every player it is sent.
struct EchoProvider;

impl PredictionProvider for EchoProvider {
    fn models_loaded(&self) -> Result<bool> {
        Ok(true)
    }

    fn predict(&self, player: &ProviderPlayer) -> Result<Prediction> {
        Ok(echo(player, 0))
    }

    fn predict_batch(&self, players: &[ProviderPlayer]) -> Result<Vec<Prediction>> {
        Ok(players
            .iter()
            .enumerate()
            .rev()
            .map(|(idx, p)| echo(p, idx))
            .collect())
    }
}

fn echo(player: &ProviderPlayer, idx: usize) -> Prediction {
    Prediction {
        sofascore_id: player.sofascore_id.clone(),
        name: player.name.clone(),
        future_potential: Some(50.0 + (idx % 37) as f64),
        ..Default::default()
    }
}

fn bench_qualify_striker(c: &mut Criterion) {
    let records = synthetic_records(5_000);
    c.bench_function("qualify_striker_5k", |b| {
        b.iter(|| {
            let out = qualify(black_box(records.clone()), Role::Striker.rule());
            black_box(out.len());
        })
    });
}

fn bench_qualify_all_roles(c: &mut Criterion) {
    let records = synthetic_records(5_000);
    c.bench_function("qualify_all_roles_5k", |b| {
        b.iter(|| {
            let out = qualify_all_roles(black_box(&records));
            black_box(out.len());
        })
    });
}

fn bench_batch_merge(c: &mut Criterion) {
    let records = synthetic_records(2_000);
    let qualified = qualify(records, Role::LeftWinger.rule());
    let (displays, sources): (Vec<_>, Vec<_>) = qualified
        .into_iter()
        .map(|r| (r.player, r.source))
        .unzip();
    let client = EnrichmentClient::new(EchoProvider, true);
    c.bench_function("annotate_batch_merge", |b| {
        b.iter(|| {
            let rows = client.annotate_batch_probed(black_box(displays.clone()), &sources, true);
            black_box(rows.len());
        })
    });
}

criterion_group!(
    perf,
    bench_qualify_striker,
    bench_qualify_all_roles,
    bench_batch_merge
);
criterion_main!(perf);
