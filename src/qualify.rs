use std::cmp::Ordering;

use anyhow::Result;
use rayon::prelude::*;

use crate::model::{PlayerRecord, ScoredPlayer};
use crate::position_rules::{PositionRule, RecordMetrics, Role};
use crate::record_source::RecordSource;

/// A record that passed its rule, with the display projection and the
/// untouched source kept side by side for enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct QualificationResult {
    pub player: ScoredPlayer,
    pub source: PlayerRecord,
}

impl QualificationResult {
    pub fn rank_score(&self) -> f64 {
        self.player.rank_score
    }
}

/// Accumulates passing records in encounter order; `finish` sorts them.
pub struct Qualifier<'r> {
    rule: &'r PositionRule,
    seen: usize,
    passed: Vec<QualificationResult>,
}

impl<'r> Qualifier<'r> {
    pub fn new(rule: &'r PositionRule) -> Self {
        Self {
            rule,
            seen: 0,
            passed: Vec::new(),
        }
    }

    pub fn push(&mut self, record: PlayerRecord) {
        if !self.rule.is_candidate(&record) {
            return;
        }
        self.seen += 1;
        let metrics = RecordMetrics::new(&record.stats);
        let Some(rank_score) = self.rule.evaluate(&metrics) else {
            return;
        };
        self.passed.push(QualificationResult {
            player: ScoredPlayer {
                player: record.display(),
                rank_score,
            },
            source: record,
        });
    }

    /// Candidates that matched the rule's role codes so far.
    pub fn seen(&self) -> usize {
        self.seen
    }

    pub fn finish(self) -> Vec<QualificationResult> {
        let mut out = self.passed;
        sort_by_rank_score(&mut out);
        out
    }
}

/// Descending by rank score; `sort_by` is stable so ties keep encounter order.
pub fn sort_by_rank_score(results: &mut [QualificationResult]) {
    results.sort_by(|a, b| {
        b.rank_score()
            .partial_cmp(&a.rank_score())
            .unwrap_or(Ordering::Equal)
    });
}

pub fn qualify<I>(records: I, rule: &PositionRule) -> Vec<QualificationResult>
where
    I: IntoIterator<Item = PlayerRecord>,
{
    let mut q = Qualifier::new(rule);
    for record in records {
        q.push(record);
    }
    q.finish()
}

/// Streams candidates straight from the source. Store errors propagate.
pub fn qualify_source(
    source: &dyn RecordSource,
    rule: &PositionRule,
) -> Result<Vec<QualificationResult>> {
    let mut q = Qualifier::new(rule);
    source.for_each_candidate(rule.role_codes, &mut |record| {
        q.push(record);
        Ok(())
    })?;
    tracing::debug!(role = %rule.role, candidates = q.seen(), "qualification scan complete");
    Ok(q.finish())
}

/// Every rule over the same in-memory records, evaluated in parallel.
/// Output follows `Role::ALL`.
pub fn qualify_all_roles(records: &[PlayerRecord]) -> Vec<(Role, Vec<QualificationResult>)> {
    Role::ALL
        .par_iter()
        .map(|role| {
            let rule = role.rule();
            let mut q = Qualifier::new(rule);
            for record in records.iter().filter(|r| rule.is_candidate(r)) {
                q.push(record.clone());
            }
            (*role, q.finish())
        })
        .collect()
}
