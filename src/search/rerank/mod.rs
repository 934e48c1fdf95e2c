// Difficulty-aware and title-aware re-ranking of nearest-neighbour candidates


use crate::corpus::DifficultyLevel;
use crate::index::{IndexedDocument, compare_scores_desc};

const BEGINNER_PATTERNS: &[&str] = &[
    "what is",
    "explain",
    "introduction",
    "basics",
    "simple",
    "beginner",
    "how does",
    "what are",
    "eli5",
    "for dummies",
];

const EXPERT_PATTERNS: &[&str] = &[
    "derive",
    "proof",
    "hamiltonian",
    "eigenvalue",
    "tensor",
    "renormalization",
    "lagrangian",
    "quantum field",
    "topology",
];

const ADVANCED_PATTERNS: &[&str] = &[
    "mechanism",
    "theory of",
    "calculate",
    "mathematical",
    "statistical mechanics",
    "thermodynamics",
];

const TITLE_STOPWORDS: &[&str] = &[
    "a", "an", "the", "in", "on", "at", "to", "for", "of", "and", "or", "but", "is", "are",
];

pub const SAME_LEVEL_BOOST: f32 = 1.3;
pub const ADJACENT_LEVEL_BOOST: f32 = 1.1;
pub const BEGINNER_MATCH_BOOST: f32 = 1.2;

/// A candidate from the index: its position, inner-product score and metadata
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub position: usize,
    pub raw_score: f32,
    pub document: &'a IndexedDocument,
}

/// A candidate after boosts have been applied
#[derive(Debug, Clone, Copy)]
pub struct Scored<'a> {
    pub candidate: Candidate<'a>,
    pub score: f32,
}

/// Guess the audience of a query from surface phrasing.
///
/// Beginner patterns are checked first, so "what is the hamiltonian" is a
/// beginner query.
#[inline]
pub fn detect_query_difficulty(query: &str) -> DifficultyLevel {
    let query = query.to_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|p| query.contains(p));

    if matches(BEGINNER_PATTERNS) {
        DifficultyLevel::BEGINNER
    } else if matches(EXPERT_PATTERNS) {
        DifficultyLevel::EXPERT
    } else if matches(ADVANCED_PATTERNS) {
        DifficultyLevel::ADVANCED
    } else {
        DifficultyLevel::INTERMEDIATE
    }
}

/// Lowercased query terms longer than two characters that are not stopwords
#[inline]
pub fn meaningful_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|token| {
            token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|term| term.chars().count() > 2 && !TITLE_STOPWORDS.contains(&term.as_str()))
        .collect()
}

/// Fraction of terms found as substrings of the lowercase title
#[inline]
pub fn title_overlap_ratio(terms: &[String], title: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let title = title.to_lowercase();
    let hits = terms.iter().filter(|term| title.contains(term.as_str())).count();
    hits as f32 / terms.len() as f32
}

#[inline]
pub fn title_boost(terms: &[String], title: &str) -> f32 {
    let ratio = title_overlap_ratio(terms, title);
    if ratio >= 0.8 {
        1.5
    } else if ratio >= 0.5 {
        1.3
    } else if ratio >= 0.3 {
        1.15
    } else {
        1.0
    }
}

#[inline]
pub fn difficulty_boost(query_level: DifficultyLevel, doc_level: DifficultyLevel) -> f32 {
    let mut boost = match query_level.distance(doc_level) {
        0 => SAME_LEVEL_BOOST,
        1 => ADJACENT_LEVEL_BOOST,
        _ => 1.0,
    };
    if query_level == DifficultyLevel::BEGINNER && doc_level == DifficultyLevel::BEGINNER {
        boost *= BEGINNER_MATCH_BOOST;
    }
    boost
}

/// Filter, boost and truncate candidates.
///
/// Candidates must arrive in raw retrieval order; the sort is stable so equal
/// adjusted scores keep that order. With an explicit filter only documents
/// at exactly that level survive and no difficulty is inferred from the
/// query. Boosts compound multiplicatively.
#[inline]
pub fn rerank<'a>(
    candidates: Vec<Candidate<'a>>,
    query: &str,
    difficulty_filter: Option<DifficultyLevel>,
    num_results: usize,
) -> Vec<Scored<'a>> {
    let implicit_level = difficulty_filter
        .is_none()
        .then(|| detect_query_difficulty(query));
    let terms = meaningful_terms(query);

    let mut scored: Vec<Scored<'a>> = candidates
        .into_iter()
        .filter(|candidate| {
            difficulty_filter
                .is_none_or(|level| candidate.document.difficulty_level == Some(level))
        })
        .map(|candidate| {
            let mut score = candidate.raw_score;
            if let Some(query_level) = implicit_level {
                let doc_level = candidate.document.difficulty_level.unwrap_or_default();
                score *= difficulty_boost(query_level, doc_level);
            }
            score *= title_boost(&terms, candidate.document.title.as_deref().unwrap_or(""));
            Scored { candidate, score }
        })
        .collect();

    scored.sort_by(|a, b| compare_scores_desc(a.score, b.score));
    scored.truncate(num_results);
    scored
}
