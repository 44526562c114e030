use std::thread;

use anyhow::Result;
use tracing::info;

use crate::enrichment::{EnrichmentClient, HttpPredictionProvider, PredictionProvider};
use crate::model::{Enriched, PlayerProfile, PlayerRecord, RankedList, RankedPlayer, ScoredPlayer};
use crate::position_rules::{PositionRule, Role};
use crate::qualify::{QualificationResult, qualify, qualify_all_roles, qualify_source};
use crate::record_source::RecordSource;

/// Request-scoped composition of the record source, the rule table and the
/// enrichment client. Both collaborators are built once at startup and
/// borrowed here, so a pipeline is cheap to create per request.
pub struct Pipeline<'a, P: PredictionProvider = HttpPredictionProvider> {
    source: &'a dyn RecordSource,
    enrichment: &'a EnrichmentClient<P>,
}

impl<'a, P: PredictionProvider> Pipeline<'a, P> {
    pub fn new(source: &'a dyn RecordSource, enrichment: &'a EnrichmentClient<P>) -> Self {
        Self { source, enrichment }
    }

    /// Qualify, enrich and number the players for one role.
    ///
    /// The availability probe runs while the source is being scanned. A
    /// source error fails the whole request; enrichment trouble only drops
    /// the insights.
    pub fn run(&self, role: Role) -> Result<RankedList> {
        let rule = role.rule();
        let enrichment = self.enrichment;
        let (qualified, available) = thread::scope(|scope| {
            let probe = enrichment
                .is_enabled()
                .then(|| scope.spawn(move || enrichment.check_availability()));
            let qualified = qualify_source(self.source, rule);
            // A panicked probe counts as an unavailable provider.
            let available = probe.is_some_and(|handle| handle.join().unwrap_or(false));
            (qualified, available)
        });
        let qualified = qualified?;
        info!(role = %role, qualified = qualified.len(), "qualification done");

        Ok(self.finish(qualified, available))
    }

    /// Every role from a single scan of the source. Rules run in parallel and
    /// the provider is probed once for the whole call. Output follows `Role::ALL`.
    pub fn run_all(&self) -> Result<Vec<(Role, RankedList)>> {
        let codes = all_role_codes();
        let enrichment = self.enrichment;
        let (records, available) = thread::scope(|scope| {
            let probe = enrichment
                .is_enabled()
                .then(|| scope.spawn(move || enrichment.check_availability()));
            let mut records = Vec::new();
            let scanned = self.source.for_each_candidate(&codes, &mut |record| {
                records.push(record);
                Ok(())
            });
            let available = probe.is_some_and(|handle| handle.join().unwrap_or(false));
            (scanned.map(|()| records), available)
        });
        let records = records?;
        info!(records = records.len(), "multi-role scan done");

        Ok(qualify_all_roles(&records)
            .into_iter()
            .map(|(role, qualified)| (role, self.finish(qualified, available)))
            .collect())
    }

    /// Same as [`run`](Self::run) over records already in hand.
    pub fn run_records<I>(&self, records: I, rule: &PositionRule) -> RankedList
    where
        I: IntoIterator<Item = PlayerRecord>,
    {
        let qualified = qualify(records, rule);
        let available = !qualified.is_empty()
            && self.enrichment.is_enabled()
            && self.enrichment.check_availability();
        self.finish(qualified, available)
    }

    /// Single-player view with insights from the single-record endpoint.
    pub fn lookup_player(&self, name: &str) -> Result<Option<Enriched<PlayerProfile>>> {
        let Some(record) = self.source.find_by_name(name)? else {
            return Ok(None);
        };
        Ok(Some(self.enrichment.annotate_one(record.profile(), &record)))
    }

    fn finish(&self, qualified: Vec<QualificationResult>, available: bool) -> RankedList {
        let (displays, sources): (Vec<ScoredPlayer>, Vec<PlayerRecord>) = qualified
            .into_iter()
            .map(|r| (r.player, r.source))
            .unzip();
        let enriched = self
            .enrichment
            .annotate_batch_probed(displays, &sources, available);
        assign_ids(enriched)
    }
}

fn all_role_codes() -> Vec<&'static str> {
    let mut codes: Vec<&'static str> = Role::ALL
        .iter()
        .flat_map(|role| role.rule().role_codes.iter().copied())
        .collect();
    codes.sort_unstable();
    codes.dedup();
    codes
}

/// Dense 1-based ids in final order.
pub fn assign_ids(rows: Vec<Enriched<ScoredPlayer>>) -> RankedList {
    rows.into_iter()
        .enumerate()
        .map(|(idx, entry)| RankedPlayer { id: idx + 1, entry })
        .collect()
}
