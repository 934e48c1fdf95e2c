// Retrieval quality over held-out queries, with and without re-ranking


use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::corpus::read_json;
use crate::search::{Candidate, SearchEngine, rerank};
use crate::training::dataset::EvalExample;

pub const DEFAULT_K: usize = 10;

#[inline]
pub fn load_eval_examples(path: &Path) -> Result<Vec<EvalExample>> {
    read_json(path).with_context(|| {
        format!(
            "Evaluation queries not found at {}; run `dataset` first",
            path.display()
        )
    })
}

/// Recall@k, MRR and nDCG@k averaged over queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    pub recall_at_k: f64,
    pub mrr: f64,
    pub ndcg_at_k: f64,
}

impl RetrievalMetrics {
    /// Metrics for one ranked list against a set of relevant ids
    #[inline]
    pub fn for_ranking(ranked: &[&str], relevant: &HashSet<&str>, k: usize) -> Self {
        if relevant.is_empty() {
            return Self::default();
        }
        let top = &ranked[..k.min(ranked.len())];

        let hits = top.iter().filter(|id| relevant.contains(*id)).count();
        let first_hit = top.iter().position(|id| relevant.contains(id));

        let dcg: f64 = top
            .iter()
            .enumerate()
            .filter(|(_, id)| relevant.contains(*id))
            .map(|(i, _)| discount(i))
            .sum();
        let ideal: f64 = (0..relevant.len().min(k)).map(discount).sum();

        Self {
            recall_at_k: hits as f64 / relevant.len() as f64,
            mrr: first_hit.map_or(0.0, |i| 1.0 / (i + 1) as f64),
            ndcg_at_k: if ideal > 0.0 { dcg / ideal } else { 0.0 },
        }
    }
}

/// Gain discount for a zero-based rank
fn discount(index: usize) -> f64 {
    1.0 / ((index + 2) as f64).log2()
}

#[derive(Debug, Clone, Default)]
struct Accumulator {
    queries: usize,
    raw: RetrievalMetrics,
    reranked: RetrievalMetrics,
}

impl Accumulator {
    fn add(&mut self, raw: RetrievalMetrics, reranked: RetrievalMetrics) {
        self.queries += 1;
        for (total, value) in [(&mut self.raw, raw), (&mut self.reranked, reranked)] {
            total.recall_at_k += value.recall_at_k;
            total.mrr += value.mrr;
            total.ndcg_at_k += value.ndcg_at_k;
        }
    }

    fn finish(&self) -> Comparison {
        let n = self.queries.max(1) as f64;
        let mean = |total: RetrievalMetrics| RetrievalMetrics {
            recall_at_k: total.recall_at_k / n,
            mrr: total.mrr / n,
            ndcg_at_k: total.ndcg_at_k / n,
        };
        Comparison {
            queries: self.queries,
            raw: mean(self.raw),
            reranked: mean(self.reranked),
        }
    }
}

/// Raw and re-ranked metrics over the same queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub queries: usize,
    pub raw: RetrievalMetrics,
    pub reranked: RetrievalMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub k: usize,
    pub model: String,
    pub overall: Comparison,
    /// Keyed by the query's difficulty level
    pub per_difficulty: BTreeMap<u8, Comparison>,
}

impl fmt::Display for EvaluationReport {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Model {} over {} queries (k = {})",
            self.model, self.overall.queries, self.k
        )?;
        writeln!(
            f,
            "{:<14} {:>8} {:>10} {:>8} {:>8}",
            "", "Queries", "Recall@k", "MRR", "nDCG@k"
        )?;
        let rows = std::iter::once(("all".to_string(), self.overall)).chain(
            self.per_difficulty
                .iter()
                .map(|(level, comparison)| (format!("level {}", level), *comparison)),
        );
        for (label, comparison) in rows {
            for (variant, metrics) in [("raw", comparison.raw), ("reranked", comparison.reranked)] {
                let name = format!("{} {}", label, variant);
                writeln!(
                    f,
                    "{:<14} {:>8} {:>10.3} {:>8.3} {:>8.3}",
                    name,
                    comparison.queries,
                    metrics.recall_at_k,
                    metrics.mrr,
                    metrics.ndcg_at_k
                )?;
            }
        }
        Ok(())
    }
}

/// Retrieve once per query with the engine's over-fetch, then score the
/// first `k` raw neighbours and the top `k` after re-ranking
#[inline]
pub fn evaluate(engine: &SearchEngine, examples: &[EvalExample], k: usize) -> Result<EvaluationReport> {
    if k == 0 {
        bail!("k must be at least 1");
    }

    let fetch = k
        .saturating_mul(engine.config().overfetch_factor.max(1))
        .min(engine.index().len());
    let mut overall = Accumulator::default();
    let mut per_difficulty: BTreeMap<u8, Accumulator> = BTreeMap::new();

    for example in examples {
        let relevant: HashSet<&str> = example.relevant_ids.iter().map(String::as_str).collect();
        if relevant.is_empty() || example.query.trim().is_empty() {
            continue;
        }

        let neighbors = engine
            .retrieve(&example.query, fetch)
            .with_context(|| format!("Retrieval failed for {:?}", example.query))?;
        let candidates: Vec<Candidate<'_>> = neighbors
            .iter()
            .filter_map(|neighbor| {
                engine.index().document(neighbor.position).map(|document| Candidate {
                    position: neighbor.position,
                    raw_score: neighbor.score,
                    document,
                })
            })
            .collect();

        let raw_ids: Vec<&str> = candidates.iter().map(|c| c.document.id.as_str()).collect();
        let raw = RetrievalMetrics::for_ranking(&raw_ids, &relevant, k);

        let reranked_ids: Vec<&str> = rerank(candidates.clone(), &example.query, None, k)
            .iter()
            .map(|scored| scored.candidate.document.id.as_str())
            .collect();
        let reranked = RetrievalMetrics::for_ranking(&reranked_ids, &relevant, k);

        debug!(
            "{:?}: raw mrr {:.3}, reranked mrr {:.3}",
            example.query, raw.mrr, reranked.mrr
        );
        overall.add(raw, reranked);
        per_difficulty
            .entry(example.query_difficulty.get())
            .or_default()
            .add(raw, reranked);
    }

    let report = EvaluationReport {
        k,
        model: engine.model_name().to_string(),
        overall: overall.finish(),
        per_difficulty: per_difficulty
            .iter()
            .map(|(level, acc)| (*level, acc.finish()))
            .collect(),
    };
    info!(
        "Evaluated {} queries: recall@{} {:.3} raw, {:.3} reranked",
        report.overall.queries, k, report.overall.raw.recall_at_k, report.overall.reranked.recall_at_k
    );
    Ok(report)
}
