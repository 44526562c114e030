use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow, bail};

use scout_rank::enrichment::{EnrichmentClient, Prediction, PredictionProvider, ProviderPlayer};
use scout_rank::model::{PlayerRecord, RankedList};
use scout_rank::pipeline::Pipeline;
use scout_rank::position_rules::Role;
use scout_rank::record_source::{
    JsonLinesSource, MemorySource, RecordSource, SqliteSource, import_records, open_db,
    read_json_lines,
};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn fixture_records() -> Vec<PlayerRecord> {
    let mut out = Vec::new();
    read_json_lines(&fixture_path("players.jsonl"), &mut |r| {
        out.push(r);
        Ok(true)
    })
    .expect("fixture should parse");
    out
}

#[derive(Default)]
struct ScriptedProvider {
    healthy: bool,
    fail_batch: bool,
    predictions: Vec<Prediction>,
    batch_calls: AtomicUsize,
    sent_ids: Mutex<Vec<Option<String>>>,
}

impl PredictionProvider for ScriptedProvider {
    fn models_loaded(&self) -> Result<bool> {
        Ok(self.healthy)
    }

    fn predict(&self, player: &ProviderPlayer) -> Result<Prediction> {
        self.predictions
            .iter()
            .find(|p| p.sofascore_id == player.sofascore_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown player"))
    }

    fn predict_batch(&self, players: &[ProviderPlayer]) -> Result<Vec<Prediction>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.sent_ids
            .lock()
            .unwrap()
            .extend(players.iter().map(|p| p.sofascore_id.clone()));
        if self.fail_batch {
            bail!("operation timed out");
        }
        Ok(self.predictions.clone())
    }
}

fn predicted(id: &str, future: f64) -> Prediction {
    Prediction {
        sofascore_id: Some(id.to_string()),
        future_potential: Some(future),
        current_potential: Some(future - 4.0),
        potential_growth: Some(4.0),
        development_trajectory: Some("Improving".to_string()),
        ..Default::default()
    }
}

fn names(ranked: &RankedList) -> Vec<&str> {
    ranked
        .iter()
        .map(|r| r.entry.item.player.name.as_deref().unwrap_or_default())
        .collect()
}

fn assert_dense_ids(ranked: &RankedList) {
    let ids: Vec<usize> = ranked.iter().map(|r| r.id).collect();
    let expected: Vec<usize> = (1..=ranked.len()).collect();
    assert_eq!(ids, expected);
}

struct BrokenSource;

impl RecordSource for BrokenSource {
    fn for_each_candidate(
        &self,
        _codes: &[&str],
        _visit: &mut dyn FnMut(PlayerRecord) -> Result<()>,
    ) -> Result<()> {
        bail!("record store unreachable")
    }

    fn find_by_name(&self, _name: &str) -> Result<Option<PlayerRecord>> {
        bail!("record store unreachable")
    }
}

#[test]
fn strikers_rank_by_score_when_provider_is_down() {
    let source = JsonLinesSource::new(fixture_path("players.jsonl"));
    let client = EnrichmentClient::new(ScriptedProvider::default(), true);
    let ranked = Pipeline::new(&source, &client).run(Role::Striker).unwrap();

    assert_eq!(names(&ranked), vec!["Sam Striker", "Nico Forward"]);
    assert_dense_ids(&ranked);
    assert!(ranked.iter().all(|r| r.entry.insights.is_none()));
    assert!((ranked[0].entry.item.rank_score - 8.8).abs() < 1e-9);
    assert_eq!(client.provider().batch_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn display_projection_formats_market_value() {
    let source = JsonLinesSource::new(fixture_path("players.jsonl"));
    let client = EnrichmentClient::new(ScriptedProvider::default(), false);
    let ranked = Pipeline::new(&source, &client).run(Role::Striker).unwrap();

    let sam = &ranked[0].entry.item.player;
    assert_eq!(sam.age, Some(27));
    assert_eq!(sam.market_value, "4.1M €");
    assert_eq!(sam.market_value_raw, 4_100_000.0);
    assert_eq!(sam.positions.as_deref(), Some("ST"));
}

#[test]
fn enrichment_reorders_by_future_score() {
    let source = JsonLinesSource::new(fixture_path("players.jsonl"));
    let client = EnrichmentClient::new(
        ScriptedProvider {
            healthy: true,
            predictions: vec![predicted("1002", 71.0), predicted("1001", 84.5)],
            ..Default::default()
        },
        true,
    );
    let ranked = Pipeline::new(&source, &client).run(Role::Striker).unwrap();

    assert_eq!(names(&ranked), vec!["Nico Forward", "Sam Striker"]);
    assert_dense_ids(&ranked);
    let top = ranked[0].entry.insights.as_ref().expect("annotated");
    assert_eq!(top.future_score, Some(84.5));
    assert_eq!(top.trajectory_label, "Improving");
    assert_eq!(top.confidence, 0.75);
    assert!(client.is_healthy());

    // only qualified strikers reach the provider, in qualification order
    let sent = client.provider().sent_ids.lock().unwrap().clone();
    assert_eq!(sent, vec![Some("1002".to_string()), Some("1001".to_string())]);
}

#[test]
fn partial_predictions_keep_every_player() {
    let records = fixture_records();
    let client = EnrichmentClient::new(
        ScriptedProvider {
            healthy: true,
            predictions: vec![predicted("1001", 40.0)],
            ..Default::default()
        },
        true,
    );
    let source = MemorySource::new(records);
    let ranked = Pipeline::new(&source, &client).run(Role::Striker).unwrap();

    assert_eq!(ranked.len(), 2);
    assert_dense_ids(&ranked);
    assert_eq!(names(&ranked), vec!["Nico Forward", "Sam Striker"]);
    assert!(ranked[1].entry.insights.is_none());
}

#[test]
fn batch_failure_falls_back_to_qualification_order() {
    let source = MemorySource::new(fixture_records());
    let client = EnrichmentClient::new(
        ScriptedProvider {
            healthy: true,
            fail_batch: true,
            predictions: vec![predicted("1001", 99.0)],
            ..Default::default()
        },
        true,
    );
    let ranked = Pipeline::new(&source, &client).run(Role::Striker).unwrap();

    assert_eq!(names(&ranked), vec!["Sam Striker", "Nico Forward"]);
    assert!(ranked.iter().all(|r| r.entry.insights.is_none()));
    assert_eq!(client.provider().batch_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn disabled_enrichment_never_contacts_provider() {
    let source = MemorySource::new(fixture_records());
    let client = EnrichmentClient::new(
        ScriptedProvider {
            healthy: true,
            predictions: vec![predicted("1001", 99.0)],
            ..Default::default()
        },
        true,
    );
    client.set_enabled(false);
    let ranked = Pipeline::new(&source, &client).run(Role::Striker).unwrap();

    assert_eq!(names(&ranked), vec!["Sam Striker", "Nico Forward"]);
    assert_eq!(client.provider().batch_calls.load(Ordering::SeqCst), 0);
    assert!(!client.is_healthy());
}

#[test]
fn other_roles_from_fixture() {
    let source = MemorySource::new(fixture_records());
    let client = EnrichmentClient::new(ScriptedProvider::default(), false);
    let pipeline = Pipeline::new(&source, &client);

    let keepers = pipeline.run(Role::Goalkeeper).unwrap();
    assert_eq!(names(&keepers), vec!["Gio Keeper"]);
    assert!((keepers[0].entry.item.rank_score - 80.0).abs() < 1e-9);

    let wingers = pipeline.run(Role::LeftWinger).unwrap();
    assert_eq!(names(&wingers), vec!["Wing Player"]);

    let centre_backs = pipeline.run(Role::CentreBack).unwrap();
    assert_eq!(names(&centre_backs), vec!["Rui Centre"]);
    assert!((centre_backs[0].entry.item.rank_score - 11.5).abs() < 1e-9);

    assert!(pipeline.run(Role::Mezzala).unwrap().is_empty());
}

#[test]
fn run_records_matches_run() {
    let records = fixture_records();
    let source = MemorySource::new(records.clone());
    let client = EnrichmentClient::new(ScriptedProvider::default(), true);
    let pipeline = Pipeline::new(&source, &client);

    let streamed = pipeline.run(Role::Striker).unwrap();
    let in_hand = pipeline.run_records(records, Role::Striker.rule());
    assert_eq!(streamed, in_hand);
}

#[test]
fn source_failure_fails_the_request() {
    let client = EnrichmentClient::new(ScriptedProvider::default(), true);
    let err = Pipeline::new(&BrokenSource, &client)
        .run(Role::Striker)
        .unwrap_err();
    assert!(format!("{err:#}").contains("record store unreachable"));
}

#[test]
fn malformed_line_fails_the_request() {
    let source = JsonLinesSource::new(fixture_path("players_truncated.jsonl"));
    let client = EnrichmentClient::new(ScriptedProvider::default(), false);
    let err = Pipeline::new(&source, &client)
        .run(Role::Striker)
        .unwrap_err();
    assert!(format!("{err:#}").contains("line 2"));
}

#[test]
fn lookup_player_uses_single_endpoint_after_probe() {
    let source = MemorySource::new(fixture_records());
    let client = EnrichmentClient::new(
        ScriptedProvider {
            healthy: true,
            predictions: vec![predicted("4001", 66.0)],
            ..Default::default()
        },
        true,
    );
    assert!(client.check_availability());
    let pipeline = Pipeline::new(&source, &client);

    let found = pipeline.lookup_player("Rui Centre").unwrap().expect("player exists");
    assert_eq!(found.item.player.club.as_deref(), Some("Eastfield"));
    assert_eq!(found.item.stats.get("tackles"), 40.0);
    assert_eq!(
        found.insights.as_ref().and_then(|a| a.future_score),
        Some(66.0)
    );

    assert!(pipeline.lookup_player("Nobody Here").unwrap().is_none());
    assert_eq!(client.provider().batch_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn ranked_rows_serialize_flat() {
    let source = MemorySource::new(fixture_records());
    let client = EnrichmentClient::new(ScriptedProvider::default(), false);
    let ranked = Pipeline::new(&source, &client).run(Role::Goalkeeper).unwrap();

    let value = serde_json::to_value(&ranked).unwrap();
    let row = &value[0];
    assert_eq!(row["id"], 1);
    assert_eq!(row["name"], "Gio Keeper");
    assert!(row["rank_score"].as_f64().is_some());
    assert!(row["insights"].is_null());
    assert!(row.get("sofascore_id").is_none());
}

#[test]
fn run_all_matches_single_role_runs() {
    let source = MemorySource::new(fixture_records());
    let client = EnrichmentClient::new(ScriptedProvider::default(), true);
    let pipeline = Pipeline::new(&source, &client);

    let all = pipeline.run_all().unwrap();
    assert_eq!(all.len(), Role::ALL.len());
    for ((role, ranked), expected_role) in all.iter().zip(Role::ALL) {
        assert_eq!(*role, expected_role);
        assert_eq!(ranked, &pipeline.run(*role).unwrap());
    }
}

#[test]
fn run_all_surfaces_source_errors() {
    let client = EnrichmentClient::new(ScriptedProvider::default(), false);
    assert!(Pipeline::new(&BrokenSource, &client).run_all().is_err());
}

fn scratch_db(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("scout_rank_{}_{name}", std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

#[test]
fn sqlite_store_ranks_like_the_json_dump() {
    let path = scratch_db("ranks.sqlite");
    {
        let mut writer = SqliteSource::open(&path).unwrap();
        import_records(writer.connection_mut(), fixture_records()).unwrap();
    }
    let source = SqliteSource::open_read_only(&path).unwrap();
    let client = EnrichmentClient::new(ScriptedProvider::default(), true);
    let ranked = Pipeline::new(&source, &client).run(Role::Striker).unwrap();
    assert_eq!(names(&ranked), vec!["Sam Striker", "Nico Forward"]);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn mistyped_store_path_is_an_error_not_an_empty_list() {
    let dir = std::env::temp_dir().join(format!("scout_rank_{}_typo", std::process::id()));
    let path = dir.join("players.sqlite");
    assert!(SqliteSource::open_read_only(&path).is_err());
    assert!(!dir.exists());
}

#[test]
fn store_lost_mid_session_fails_the_request() {
    let path = scratch_db("lost.sqlite");
    {
        let mut writer = SqliteSource::open(&path).unwrap();
        import_records(writer.connection_mut(), fixture_records()).unwrap();
    }
    let source = SqliteSource::open_read_only(&path).unwrap();
    open_db(&path)
        .unwrap()
        .execute_batch("DROP TABLE player_positions; DROP TABLE players;")
        .unwrap();

    let client = EnrichmentClient::new(ScriptedProvider::default(), true);
    let pipeline = Pipeline::new(&source, &client);
    assert!(pipeline.run(Role::Striker).is_err());
    assert!(pipeline.run_all().is_err());
    let _ = std::fs::remove_file(&path);
}
