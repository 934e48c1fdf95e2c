// Relevance scoring for positive pairs: a lenient weak-positive filter and a
// stricter composite quality check


use fancy_regex::{Regex, escape};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, info};

use super::TrainingPair;
use crate::corpus::Document;

pub const MIN_RELEVANCE: f32 = 0.5;
pub const MIN_QUALITY: f32 = 0.6;
pub const MIN_FREQUENCY: f32 = 0.3;

const TITLE_WEIGHT: f32 = 0.35;
const FREQUENCY_WEIGHT: f32 = 0.30;
const CONTEXT_WEIGHT: f32 = 0.20;
const EARLY_MENTION_WEIGHT: f32 = 0.10;
const DENSITY_WEIGHT: f32 = 0.05;

/// Keyword characters per document character that count as full density
const FULL_DENSITY: f32 = 0.01;
const EARLY_MENTION_CHARS: usize = 300;
const PRIMARY_TOPIC_CHARS: usize = 200;
const MAX_CONTEXTS: usize = 5;

const RELEVANCE_STOPWORDS: &[&str] = &["what", "is", "are", "the", "a", "an", "in", "of", "for", "to", "and"];

const QUALITY_STOPWORDS: &[&str] = &[
    "what", "is", "are", "the", "a", "an", "in", "of", "for", "to", "and", "or", "how", "do", "does",
    "can", "will", "about", "with", "from", "at", "by", "on", "this", "that",
];

const BROAD_PATTERNS: &[&str] = &[
    "what is",
    "how do",
    "explain",
    "introduction",
    "basics",
    "superconductivity",
    "superconductor",
    "superconducting materials",
    "superconducting properties",
    "how superconductors work",
];

const OVERVIEW_PATTERNS: &[&str] = &[
    "what is",
    "how do",
    "how does",
    "explain",
    "introduction to",
    "basics of",
    "overview of",
];

const SCIENTIFIC_INDICATORS: &[&str] = &[
    "temperature",
    "critical",
    "phase",
    "transition",
    "theory",
    "experiment",
    "material",
    "property",
    "mechanism",
    "state",
    "energy",
    "electron",
    "quantum",
    "magnetic",
    "field",
];

static WORDS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").expect("valid regex"));

const GENERIC_TERMS: &[&str] = &["superconductivity", "superconductor", "superconducting"];

/// Whole-word occurrences of `keyword` in already-lowercased text
#[inline]
pub fn count_word_occurrences(text_lower: &str, keyword: &str) -> usize {
    let Ok(pattern) = Regex::new(&format!(r"\b{}\b", escape(&keyword.to_lowercase()))) else {
        return 0;
    };
    pattern.find_iter(text_lower).filter(Result::is_ok).count()
}

/// A keyword is a primary topic when it is in the title, appears early and
/// often, or appears at least five times anywhere
#[inline]
pub fn is_primary_topic(text: &str, title: &str, keyword: &str, min_occurrences: usize) -> bool {
    let keyword = keyword.to_lowercase();
    if title.to_lowercase().contains(&keyword) {
        return true;
    }

    let text = text.to_lowercase();
    let count = count_word_occurrences(&text, &keyword);
    let opening: String = text.chars().take(PRIMARY_TOPIC_CHARS).collect();

    (opening.contains(&keyword) && count >= min_occurrences) || count >= 5
}

/// Broad queries any superconductivity document may answer
#[inline]
pub fn is_broad_query(query: &str) -> bool {
    let query = query.to_lowercase();
    GENERIC_TERMS.contains(&query.as_str())
        || BROAD_PATTERNS.iter().any(|pattern| query.contains(pattern))
}

/// Narrower notion of generic used by the composite check
#[inline]
pub fn is_overview_query(query: &str) -> bool {
    let query = query.trim().to_lowercase();
    GENERIC_TERMS.contains(&query.as_str())
        || OVERVIEW_PATTERNS.iter().any(|pattern| query.contains(pattern))
}

fn trim_term(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Average per-keyword evidence that `document` answers `query`, in 0..=1
#[inline]
pub fn relevance_score(query: &str, document: &Document) -> f32 {
    let text = document.text.to_lowercase();

    if is_broad_query(query) {
        return if text.contains("supercond") { 1.0 } else { 0.3 };
    }

    let query = query.to_lowercase();
    let keywords: Vec<&str> = query
        .split_whitespace()
        .map(trim_term)
        .filter(|word| word.chars().count() > 2 && !RELEVANCE_STOPWORDS.contains(word))
        .collect();
    if keywords.is_empty() {
        return 0.5;
    }

    let title = document.title.to_lowercase();
    let total: f32 = keywords
        .iter()
        .map(|keyword| {
            if title.contains(keyword) {
                return 1.0;
            }
            match count_word_occurrences(&text, keyword) {
                5.. => 1.0,
                3..=4 => 0.8,
                1..=2 => 0.5,
                0 => 0.0,
            }
        })
        .sum();
    total / keywords.len() as f32
}

/// Keep negatives, and positives whose document exists and scores at least 0.5
#[inline]
pub fn filter_weak_positives(
    pairs: Vec<TrainingPair>,
    documents: &HashMap<&str, &Document>,
) -> Vec<TrainingPair> {
    let before = pairs.len();
    let mut scores = Vec::new();

    let kept: Vec<TrainingPair> = pairs
        .into_iter()
        .filter(|pair| {
            if !pair.is_positive() {
                return true;
            }
            let Some(document) = documents.get(pair.doc_id.as_str()) else {
                debug!("Dropping pair for missing document {}", pair.doc_id);
                return false;
            };
            let score = relevance_score(&pair.query_text, document);
            scores.push(score);
            score >= MIN_RELEVANCE
        })
        .collect();

    if !scores.is_empty() {
        info!(
            "Weak-positive filter removed {} pairs (mean relevance {:.2})",
            before - kept.len(),
            scores.iter().sum::<f32>() / scores.len() as f32
        );
    }
    kept
}

/// Component scores of the composite quality check, each in 0..=1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityMetrics {
    pub title: f32,
    pub density: f32,
    pub frequency: f32,
    pub context: f32,
    pub early_mention: f32,
}

impl QualityMetrics {
    #[inline]
    pub fn compute(query: &str, document: &Document) -> Self {
        let query = query.to_lowercase();
        let keywords: Vec<&str> = WORDS
            .find_iter(&query)
            .filter_map(Result::ok)
            .map(|word| word.as_str())
            .filter(|word| word.chars().count() > 2 && !QUALITY_STOPWORDS.contains(word))
            .collect();

        let text = document.text.to_lowercase();
        let title = document.title.to_lowercase();

        Self {
            title: title_score(&keywords, &title),
            density: density_score(&keywords, &text),
            frequency: frequency_score(&keywords, &text),
            context: context_score(&keywords, &text),
            early_mention: early_mention_score(&keywords, &text),
        }
    }

    #[inline]
    pub fn composite(&self) -> f32 {
        self.title * TITLE_WEIGHT
            + self.frequency * FREQUENCY_WEIGHT
            + self.context * CONTEXT_WEIGHT
            + self.early_mention * EARLY_MENTION_WEIGHT
            + self.density * DENSITY_WEIGHT
    }

    /// Composite of at least 0.6, and keywords that are not too rare
    #[inline]
    pub fn passes(&self) -> bool {
        self.composite() >= MIN_QUALITY && self.frequency >= MIN_FREQUENCY
    }
}

fn title_score(keywords: &[&str], title: &str) -> f32 {
    if keywords.is_empty() {
        return 0.5;
    }
    if keywords.iter().any(|keyword| title.contains(keyword)) {
        1.0
    } else {
        0.0
    }
}

fn density_score(keywords: &[&str], text: &str) -> f32 {
    if text.is_empty() || keywords.is_empty() {
        return 0.0;
    }
    let keyword_chars: usize = keywords
        .iter()
        .map(|keyword| text.matches(keyword).count() * keyword.chars().count())
        .sum();
    let density = keyword_chars as f32 / text.chars().count().max(1) as f32;
    (density / FULL_DENSITY).min(1.0)
}

fn frequency_score(keywords: &[&str], text: &str) -> f32 {
    if keywords.is_empty() {
        return 0.5;
    }
    let total: f32 = keywords
        .iter()
        .map(|keyword| match count_word_occurrences(text, keyword) {
            10.. => 1.0,
            5..=9 => 0.9,
            3..=4 => 0.7,
            2 => 0.5,
            1 => 0.3,
            0 => 0.0,
        })
        .sum();
    total / keywords.len() as f32
}

/// Share of the first few keyword contexts (50 characters either side) that
/// mention a scientific term
fn context_score(keywords: &[&str], text: &str) -> f32 {
    if keywords.is_empty() || text.is_empty() {
        return 0.0;
    }
    let total: f32 = keywords
        .iter()
        .map(|keyword| {
            let Ok(pattern) = Regex::new(&format!(r".{{0,50}}{}.{{0,50}}", escape(keyword))) else {
                return 0.0;
            };
            let contexts: Vec<&str> = pattern
                .find_iter(text)
                .filter_map(Result::ok)
                .map(|context| context.as_str())
                .collect();
            if contexts.is_empty() {
                return 0.0;
            }
            let relevant = contexts
                .iter()
                .take(MAX_CONTEXTS)
                .filter(|context| SCIENTIFIC_INDICATORS.iter().any(|term| context.contains(term)))
                .count();
            relevant as f32 / contexts.len().min(MAX_CONTEXTS) as f32
        })
        .sum();
    total / keywords.len() as f32
}

fn early_mention_score(keywords: &[&str], text: &str) -> f32 {
    if keywords.is_empty() || text.is_empty() {
        return 0.0;
    }
    let opening: String = text.chars().take(EARLY_MENTION_CHARS).collect();
    let early = keywords.iter().filter(|keyword| opening.contains(*keyword)).count();
    early as f32 / keywords.len() as f32
}

/// Whether a positive pair survives the composite check
#[inline]
pub fn passes_quality(query: &str, document: &Document) -> bool {
    if is_overview_query(query) && document.text.to_lowercase().contains("supercond") {
        return true;
    }
    QualityMetrics::compute(query, document).passes()
}

/// Keep negatives, and positives that pass the composite quality check
#[inline]
pub fn deep_quality_filter(
    pairs: Vec<TrainingPair>,
    documents: &HashMap<&str, &Document>,
) -> Vec<TrainingPair> {
    let before = pairs.len();
    let kept: Vec<TrainingPair> = pairs
        .into_iter()
        .filter(|pair| {
            !pair.is_positive()
                || documents
                    .get(pair.doc_id.as_str())
                    .is_some_and(|document| passes_quality(&pair.query_text, document))
        })
        .collect();

    info!("Deep quality check removed {} pairs", before - kept.len());
    kept
}
