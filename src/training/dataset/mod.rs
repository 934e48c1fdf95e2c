// Export of refined pairs as a sentence-transformers style training dataset


use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::quality::is_primary_topic;
use super::{PairCounts, TrainingPair, document_lookup};
use crate::corpus::{DifficultyLevel, Document, write_json};

pub const TRAINING_FILE: &str = "training_dataset.json";
pub const DOCUMENTS_FILE: &str = "documents.json";
pub const METADATA_FILE: &str = "training_metadata.json";
pub const EVAL_FILE: &str = "eval_dataset.json";

/// Share of distinct queries held out for evaluation
pub const EVAL_FRACTION: f64 = 0.1;

const PRIMARY_TOPIC_MIN_OCCURRENCES: usize = 3;
const MISSING_IDS_SHOWN: usize = 10;

/// One training example: a query, the text it should retrieve and optionally
/// a text it should not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub query: String,
    pub positive: String,
    pub positive_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_id: Option<String>,
}

/// A held-out query with every document it was paired with positively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalExample {
    pub query: String,
    pub relevant_ids: Vec<String>,
    #[serde(default)]
    pub query_difficulty: DifficultyLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub referenced_documents: usize,
    pub total_documents: usize,
    pub documents_without_pairs: usize,
}

/// Fail when a pair points at a document the corpus does not contain
#[inline]
pub fn verify_integrity(pairs: &[TrainingPair], documents: &[Document]) -> Result<IntegrityReport> {
    let doc_ids: HashSet<&str> = documents.iter().map(|doc| doc.id.as_str()).collect();
    let referenced: HashSet<&str> = pairs.iter().map(|pair| pair.doc_id.as_str()).collect();

    let mut missing: Vec<&str> = referenced.difference(&doc_ids).copied().collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        let count = missing.len();
        missing.truncate(MISSING_IDS_SHOWN);
        return Err(anyhow!(
            "{} document ids referenced by pairs are missing from the corpus (first: {})",
            count,
            missing.join(", ")
        ));
    }

    Ok(IntegrityReport {
        referenced_documents: referenced.len(),
        total_documents: doc_ids.len(),
        documents_without_pairs: doc_ids.difference(&referenced).count(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    pub pairs: PairCounts,
    pub documents: usize,
    pub documents_by_source: BTreeMap<String, usize>,
    pub documents_by_difficulty: BTreeMap<u8, usize>,
    pub empty_texts: usize,
    pub duplicate_document_ids: usize,
    pub duplicate_pairs: usize,
    /// Positives whose query keywords are never a primary topic of the document
    pub tangential_positives: usize,
}

impl QualityReport {
    #[inline]
    pub fn analyze(pairs: &[TrainingPair], documents: &[Document]) -> Self {
        let mut documents_by_source = BTreeMap::new();
        let mut documents_by_difficulty = BTreeMap::new();
        for document in documents {
            *documents_by_source.entry(document.source.clone()).or_insert(0) += 1;
            *documents_by_difficulty
                .entry(document.difficulty_level.get())
                .or_insert(0) += 1;
        }

        let unique_ids: HashSet<&str> = documents.iter().map(|doc| doc.id.as_str()).collect();
        let unique_pairs: HashSet<(&str, &str, u8)> = pairs.iter().map(TrainingPair::key).collect();

        let lookup = document_lookup(documents);
        let tangential_positives = pairs
            .iter()
            .filter(|pair| pair.is_positive())
            .filter(|pair| {
                lookup
                    .get(pair.doc_id.as_str())
                    .is_some_and(|document| is_tangential(&pair.query_text, document))
            })
            .count();

        Self {
            pairs: PairCounts::of(pairs),
            documents: documents.len(),
            documents_by_source,
            documents_by_difficulty,
            empty_texts: documents.iter().filter(|doc| doc.text.trim().is_empty()).count(),
            duplicate_document_ids: documents.len() - unique_ids.len(),
            duplicate_pairs: pairs.len() - unique_pairs.len(),
            tangential_positives,
        }
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        self.empty_texts == 0 && self.duplicate_document_ids == 0 && self.duplicate_pairs == 0
    }
}

fn is_tangential(query: &str, document: &Document) -> bool {
    let keywords: Vec<String> = query
        .split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| word.chars().count() > 3)
        .collect();

    !keywords.is_empty()
        && !keywords.iter().any(|keyword| {
            is_primary_topic(
                &document.text,
                &document.title,
                keyword,
                PRIMARY_TOPIC_MIN_OCCURRENCES,
            )
        })
}

/// Positive pairs and negative document ids of one query
#[derive(Debug, Default)]
struct QueryGroup<'a> {
    positives: Vec<&'a TrainingPair>,
    negatives: Vec<&'a str>,
}

/// Pairs grouped by query, queries in first-seen order
#[derive(Debug, Default)]
struct GroupedQueries<'a> {
    order: Vec<&'a str>,
    groups: HashMap<&'a str, QueryGroup<'a>>,
}

impl<'a> GroupedQueries<'a> {
    fn new(pairs: &'a [TrainingPair]) -> Self {
        let mut grouped = Self::default();
        for pair in pairs {
            let query = pair.query_text.as_str();
            let group = grouped.groups.entry(query).or_insert_with(|| {
                grouped.order.push(query);
                QueryGroup::default()
            });
            if pair.is_positive() {
                group.positives.push(pair);
            } else {
                group.negatives.push(&pair.doc_id);
            }
        }
        grouped
    }

    fn iter(&self) -> impl Iterator<Item = (&'a str, &QueryGroup<'a>)> {
        self.order
            .iter()
            .filter_map(|query| self.groups.get(query).map(|group| (*query, group)))
    }
}

/// One example per positive with a usable document; the query's first
/// negative is attached when its document has text
#[inline]
pub fn build_examples(
    pairs: &[TrainingPair],
    documents: &HashMap<&str, &Document>,
) -> Vec<TrainingExample> {
    let grouped = GroupedQueries::new(pairs);
    let mut examples = Vec::new();

    for (query, group) in grouped.iter() {
        let negative = group.negatives.first().and_then(|id| {
            documents
                .get(id)
                .filter(|doc| !doc.text.is_empty())
                .map(|doc| (doc.text.clone(), doc.id.clone()))
        });

        for positive in &group.positives {
            let Some(document) = documents.get(positive.doc_id.as_str()) else {
                continue;
            };
            if document.text.is_empty() {
                continue;
            }
            let (negative, negative_id) = negative.clone().unzip();
            examples.push(TrainingExample {
                query: query.to_string(),
                positive: document.text.clone(),
                positive_id: document.id.clone(),
                negative,
                negative_id,
            });
        }
    }

    examples
}

/// Hold out a seeded share of distinct queries (at least one when any have
/// positives) and return (training pairs, evaluation examples)
#[inline]
pub fn split_for_evaluation(
    pairs: &[TrainingPair],
    fraction: f64,
    seed: u64,
) -> (Vec<TrainingPair>, Vec<EvalExample>) {
    let grouped = GroupedQueries::new(pairs);
    let candidates: Vec<&str> = grouped
        .iter()
        .filter(|(_, group)| !group.positives.is_empty())
        .map(|(query, _)| query)
        .collect();
    if candidates.is_empty() || fraction <= 0.0 {
        return (pairs.to_vec(), Vec::new());
    }

    let held_out_count =
        ((candidates.len() as f64 * fraction).round() as usize).clamp(1, candidates.len());

    let mut rng = StdRng::seed_from_u64(seed);
    let held_out: HashSet<&str> = candidates
        .choose_multiple(&mut rng, held_out_count)
        .copied()
        .collect();

    let eval: Vec<EvalExample> = candidates
        .iter()
        .filter(|query| held_out.contains(*query))
        .filter_map(|query| {
            let group = grouped.groups.get(query)?;
            let first = group.positives.first()?;
            Some(EvalExample {
                query: (*query).to_string(),
                relevant_ids: group.positives.iter().map(|pair| pair.doc_id.clone()).collect(),
                query_difficulty: first.query_difficulty,
            })
        })
        .collect();

    let training = pairs
        .iter()
        .filter(|pair| !held_out.contains(pair.query_text.as_str()))
        .cloned()
        .collect();

    (training, eval)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub created_at: DateTime<Utc>,
    pub training_examples: usize,
    pub examples_with_negatives: usize,
    pub eval_queries: usize,
    pub total_documents: usize,
    pub unique_queries: usize,
    pub report: QualityReport,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub integrity: IntegrityReport,
    pub metadata: DatasetMetadata,
    pub output_dir: PathBuf,
}

/// Verify, analyse, split and write the dataset files into `output_dir`
#[inline]
pub fn prepare_dataset(
    pairs: &[TrainingPair],
    documents: &[Document],
    output_dir: &Path,
    seed: u64,
) -> Result<DatasetSummary> {
    let integrity = verify_integrity(pairs, documents)?;
    info!(
        "All {} referenced documents exist ({} documents have no pairs)",
        integrity.referenced_documents, integrity.documents_without_pairs
    );

    let report = QualityReport::analyze(pairs, documents);
    if !report.is_clean() {
        warn!(
            "Dataset quality issues: {} empty texts, {} duplicate document ids, {} duplicate pairs",
            report.empty_texts, report.duplicate_document_ids, report.duplicate_pairs
        );
    }

    let (training_pairs, eval) = split_for_evaluation(pairs, EVAL_FRACTION, seed);
    let lookup = document_lookup(documents);
    let examples = build_examples(&training_pairs, &lookup);

    let unique_queries = examples
        .iter()
        .map(|example| example.query.as_str())
        .collect::<HashSet<_>>()
        .len();
    let metadata = DatasetMetadata {
        created_at: Utc::now(),
        training_examples: examples.len(),
        examples_with_negatives: examples.iter().filter(|e| e.negative.is_some()).count(),
        eval_queries: eval.len(),
        total_documents: documents.len(),
        unique_queries,
        report,
    };

    write_json(&output_dir.join(TRAINING_FILE), &examples)?;
    write_json(&output_dir.join(DOCUMENTS_FILE), documents)?;
    write_json(&output_dir.join(EVAL_FILE), &eval)?;
    write_json(&output_dir.join(METADATA_FILE), &metadata)?;

    info!(
        "Wrote {} training examples and {} evaluation queries to {}",
        metadata.training_examples,
        metadata.eval_queries,
        output_dir.display()
    );

    Ok(DatasetSummary {
        integrity,
        metadata,
        output_dir: output_dir.to_path_buf(),
    })
}
