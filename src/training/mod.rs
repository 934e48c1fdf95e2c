// Query/document pair generation and refinement for fine-tuning the embedding model

pub mod cleanup;
pub mod dataset;
pub mod negatives;
pub mod quality;
pub mod queries;


use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::info;

use crate::corpus::{DifficultyLevel, Document, read_json, write_json};

pub const POSITIVE: u8 = 1;
pub const NEGATIVE: u8 = 0;

/// Provenance of a pair, also fixes its label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairType {
    LlmGeneratedPositive,
    TemplatePositive,
    HardNegativeGenericToBio,
    HardNegativePersonToTheory,
    HardNegativeMaterialMismatch,
}

impl PairType {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LlmGeneratedPositive => "llm_generated_positive",
            Self::TemplatePositive => "template_positive",
            Self::HardNegativeGenericToBio => "hard_negative_generic_to_bio",
            Self::HardNegativePersonToTheory => "hard_negative_person_to_theory",
            Self::HardNegativeMaterialMismatch => "hard_negative_material_mismatch",
        }
    }

    #[inline]
    pub fn label(self) -> u8 {
        match self {
            Self::LlmGeneratedPositive | Self::TemplatePositive => POSITIVE,
            _ => NEGATIVE,
        }
    }
}

impl fmt::Display for PairType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingPair {
    pub query_text: String,
    pub doc_id: String,
    pub label: u8,
    #[serde(default)]
    pub query_difficulty: DifficultyLevel,
    #[serde(default)]
    pub doc_difficulty: DifficultyLevel,
    pub pair_type: PairType,
}

impl TrainingPair {
    /// A pair whose query inherits the document's difficulty
    #[inline]
    pub fn positive(query_text: impl Into<String>, document: &Document, pair_type: PairType) -> Self {
        Self {
            query_text: query_text.into(),
            doc_id: document.id.clone(),
            label: POSITIVE,
            query_difficulty: document.difficulty_level,
            doc_difficulty: document.difficulty_level,
            pair_type,
        }
    }

    /// A negative for `anchor`'s query pointing at `document`
    #[inline]
    pub fn negative(anchor: &Self, document: &Document, pair_type: PairType) -> Self {
        Self {
            query_text: anchor.query_text.clone(),
            doc_id: document.id.clone(),
            label: NEGATIVE,
            query_difficulty: anchor.query_difficulty,
            doc_difficulty: document.difficulty_level,
            pair_type,
        }
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.label == POSITIVE
    }

    /// Uniqueness key enforced by cleanup
    #[inline]
    pub fn key(&self) -> (&str, &str, u8) {
        (&self.query_text, &self.doc_id, self.label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCounts {
    pub total: usize,
    pub positives: usize,
    pub negatives: usize,
    pub unique_queries: usize,
}

impl PairCounts {
    #[inline]
    pub fn of(pairs: &[TrainingPair]) -> Self {
        let positives = pairs.iter().filter(|pair| pair.is_positive()).count();
        let unique_queries = pairs
            .iter()
            .map(|pair| pair.query_text.as_str())
            .collect::<HashSet<_>>()
            .len();
        Self {
            total: pairs.len(),
            positives,
            negatives: pairs.len() - positives,
            unique_queries,
        }
    }
}

impl fmt::Display for PairCounts {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pairs ({} positive, {} negative, {} unique queries)",
            self.total, self.positives, self.negatives, self.unique_queries
        )
    }
}

/// Documents keyed by id
#[inline]
pub fn document_lookup(documents: &[Document]) -> HashMap<&str, &Document> {
    documents.iter().map(|doc| (doc.id.as_str(), doc)).collect()
}

#[inline]
pub fn load_pairs(path: &Path) -> Result<Vec<TrainingPair>> {
    read_json(path)
}

#[inline]
pub fn save_pairs(path: &Path, pairs: &[TrainingPair]) -> Result<()> {
    write_json(path, pairs)
}

/// Pair counts after each refinement stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineReport {
    pub input: PairCounts,
    pub with_negatives: PairCounts,
    pub generic_bio_positives_removed: usize,
    pub weak_positives_removed: usize,
    pub low_quality_removed: usize,
    pub duplicates_removed: usize,
    pub off_topic_removed: usize,
    pub output: PairCounts,
}

/// Hard negatives, weak-positive filter, deep quality check and final cleanup, in order
#[inline]
pub fn refine_pairs(
    positives: &[TrainingPair],
    documents: &[Document],
    seed: u64,
) -> (Vec<TrainingPair>, RefineReport) {
    let lookup = document_lookup(documents);
    let mut report = RefineReport {
        input: PairCounts::of(positives),
        ..RefineReport::default()
    };

    let pairs = negatives::mine_hard_negatives(positives, documents, seed);
    report.with_negatives = PairCounts::of(&pairs);

    let before = pairs.len();
    let pairs = negatives::remove_generic_bio_positives(pairs, documents);
    report.generic_bio_positives_removed = before - pairs.len();

    let before = pairs.len();
    let pairs = quality::filter_weak_positives(pairs, &lookup);
    report.weak_positives_removed = before - pairs.len();

    let before = pairs.len();
    let pairs = quality::deep_quality_filter(pairs, &lookup);
    report.low_quality_removed = before - pairs.len();

    let cleaned = cleanup::final_cleanup(pairs, &lookup);
    report.duplicates_removed = cleaned.duplicates_removed;
    report.off_topic_removed = cleaned.off_topic_removed;
    report.output = PairCounts::of(&cleaned.pairs);

    info!("Refined {} into {}", report.input, report.output);
    (cleaned.pairs, report)
}
