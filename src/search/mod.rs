// Query-time retrieval: encode, over-fetch from the flat index, re-rank

pub mod rerank;


use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::config::SearchConfig;
use crate::corpus::DifficultyLevel;
use crate::embeddings::{Embedder, l2_normalize};
use crate::index::{IndexError, Neighbor, SearchIndex};

pub use rerank::{Candidate, Scored, detect_query_difficulty, rerank};

pub const NO_RESULTS_MESSAGE: &str =
    "No results found. Try a different query or remove the difficulty filter.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Please enter a search query.")]
    EmptyQuery,
    #[error("Invalid difficulty filter: {0} (must be 1-5 or \"all\")")]
    InvalidDifficulty(String),
    #[error("Invalid number of results: {requested} (must be between {min} and {max})")]
    InvalidResultCount {
        requested: usize,
        min: usize,
        max: usize,
    },
}

/// Parse a difficulty filter as typed by users: "all", "", "3" or "3 (Advanced)"
#[inline]
pub fn parse_difficulty_filter(value: &str) -> Result<Option<DifficultyLevel>, QueryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        return Ok(None);
    }

    let digits: String = trimmed.chars().take_while(char::is_ascii_digit).collect();
    digits
        .parse::<u8>()
        .ok()
        .and_then(DifficultyLevel::new)
        .map(Some)
        .ok_or_else(|| QueryError::InvalidDifficulty(trimmed.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub num_results: usize,
    #[serde(default)]
    pub difficulty_filter: Option<DifficultyLevel>,
}

impl SearchRequest {
    #[inline]
    pub fn new(query: impl Into<String>, num_results: usize) -> Self {
        Self {
            query: query.into(),
            num_results,
            difficulty_filter: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_difficulty(mut self, difficulty_filter: Option<DifficultyLevel>) -> Self {
        self.difficulty_filter = difficulty_filter;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub rank: usize,
    pub score: f32,
    pub raw_score: f32,
    pub doc_id: String,
    pub title: String,
    pub url: String,
    pub source: String,
    pub difficulty_level: DifficultyLevel,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    /// Level inferred from the query phrasing, reported even when a filter is set
    pub query_difficulty: DifficultyLevel,
}

/// A loaded index paired with the embedder that encoded it
#[derive(Clone)]
pub struct SearchEngine {
    index: Arc<SearchIndex>,
    embedder: Arc<dyn Embedder>,
    config: SearchConfig,
}

impl std::fmt::Debug for SearchEngine {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("documents", &self.index.len())
            .field("model", &self.embedder.model_name())
            .field("config", &self.config)
            .finish()
    }
}

impl SearchEngine {
    /// Pair an index with an embedder, rejecting embedders of another dimension
    /// and result bounds that no request could satisfy
    #[inline]
    pub fn new(
        index: SearchIndex,
        embedder: Arc<dyn Embedder>,
        config: SearchConfig,
    ) -> crate::Result<Self> {
        config.validate()?;
        if embedder.dimension() != index.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: index.dimension(),
                actual: embedder.dimension(),
            }
            .into());
        }

        Ok(Self {
            index: Arc::new(index),
            embedder,
            config,
        })
    }

    #[inline]
    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    #[inline]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    #[inline]
    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Encode and normalize a query the same way documents were indexed
    #[inline]
    pub fn encode_query(&self, query: &str) -> Result<Vec<f32>> {
        let mut vector = self
            .embedder
            .embed(query)
            .context("Failed to encode query")?;

        if vector.len() != self.index.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: vector.len(),
            }
            .into());
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }

    /// Plain nearest-neighbour retrieval without filtering or boosts
    #[inline]
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Neighbor>> {
        let vector = self.encode_query(query)?;
        Ok(self.index.index().search(&vector, k)?)
    }

    #[inline]
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery.into());
        }

        let num_results = request.num_results;
        if num_results < self.config.min_results || num_results > self.config.max_results {
            return Err(QueryError::InvalidResultCount {
                requested: num_results,
                min: self.config.min_results,
                max: self.config.max_results,
            }
            .into());
        }

        let fetch = num_results
            .saturating_mul(self.config.overfetch_factor)
            .min(self.index.len());
        let neighbors = self.retrieve(query, fetch)?;

        debug!(
            "Retrieved {} candidates for {:?} (filter: {:?})",
            neighbors.len(),
            query,
            request.difficulty_filter
        );

        let candidates = neighbors
            .iter()
            .filter_map(|neighbor| {
                self.index.document(neighbor.position).map(|document| Candidate {
                    position: neighbor.position,
                    raw_score: neighbor.score,
                    document,
                })
            })
            .collect();

        let results = rerank(candidates, query, request.difficulty_filter, num_results)
            .into_iter()
            .enumerate()
            .map(|(i, scored)| to_result(i + 1, &scored))
            .collect();

        Ok(SearchResponse {
            results,
            query_difficulty: detect_query_difficulty(query),
        })
    }
}

fn to_result(rank: usize, scored: &Scored<'_>) -> SearchResult {
    let document = scored.candidate.document;
    SearchResult {
        rank,
        score: scored.score,
        raw_score: scored.candidate.raw_score,
        doc_id: document.id.clone(),
        title: document
            .title
            .clone()
            .unwrap_or_else(|| "Untitled".to_string()),
        url: document.url.clone().unwrap_or_else(|| "#".to_string()),
        source: document
            .source
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        difficulty_level: document.difficulty_level.unwrap_or_default(),
        word_count: document.word_count.unwrap_or(0),
    }
}
