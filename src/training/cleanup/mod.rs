// Last pass over refined pairs: exact duplicates and off-topic documents


use std::collections::{HashMap, HashSet};
use tracing::info;

use super::TrainingPair;
use crate::corpus::Document;

const OPENING_CHARS: usize = 300;

const OFF_TOPIC_TERMS: &[&str] = &[
    "nintendo",
    "joy con",
    "switch console",
    "data science",
    "type i error",
    "type ii error",
    "gradient symbolic",
];

/// Magnetism topics that stay on-topic without an explicit superconductivity mention
const MAGNETISM_TOPICS: &[&str] = &[
    "magnetic order",
    "antiferromagnetic",
    "spin dynamics",
    "magnetic phase",
    "magnetism",
    "magnetic properties",
];

/// Judged on the document's opening; the query is accepted for symmetry with
/// the other filters but does not affect the outcome
#[inline]
pub fn is_off_topic(_query: &str, doc_text: &str) -> bool {
    let opening: String = doc_text.chars().take(OPENING_CHARS).collect::<String>().to_lowercase();

    if OFF_TOPIC_TERMS.iter().any(|term| opening.contains(term)) {
        return true;
    }

    opening.contains("magnet")
        && !opening.contains("supercond")
        && !opening.contains("meissner")
        && !MAGNETISM_TOPICS.iter().any(|topic| opening.contains(topic))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cleaned {
    pub pairs: Vec<TrainingPair>,
    pub duplicates_removed: usize,
    pub off_topic_removed: usize,
}

/// Drop repeated (query, doc, label) triples, then pairs whose document is off-topic.
/// Pairs for unknown documents are kept here; dataset verification reports them.
#[inline]
pub fn final_cleanup(pairs: Vec<TrainingPair>, documents: &HashMap<&str, &Document>) -> Cleaned {
    let before = pairs.len();
    let mut seen = HashSet::new();
    let unique: Vec<TrainingPair> = pairs
        .into_iter()
        .filter(|pair| seen.insert((pair.query_text.clone(), pair.doc_id.clone(), pair.label)))
        .collect();
    let duplicates_removed = before - unique.len();

    let before = unique.len();
    let pairs: Vec<TrainingPair> = unique
        .into_iter()
        .filter(|pair| {
            documents
                .get(pair.doc_id.as_str())
                .is_none_or(|document| !is_off_topic(&pair.query_text, &document.text))
        })
        .collect();
    let off_topic_removed = before - pairs.len();

    info!(
        "Cleanup removed {} duplicates and {} off-topic pairs",
        duplicates_removed, off_topic_removed
    );
    Cleaned {
        pairs,
        duplicates_removed,
        off_topic_removed,
    }
}
