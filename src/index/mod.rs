// Exact inner-product index over L2-normalized document vectors, persisted
// next to the positionally aligned document metadata.

pub mod builder;


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::corpus::{DifficultyLevel, Document, FocusArea, write_json};

pub use builder::build_index;

pub const VECTORS_FILE: &str = "vectors.bin";
pub const DOCUMENTS_FILE: &str = "documents.json";
pub const METADATA_FILE: &str = "index_metadata.json";
pub const INDEX_TYPE: &str = "IndexFlatIP";

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Vector dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Index and metadata are misaligned: {vectors} vectors but {documents} documents")]
    Misaligned { vectors: usize, documents: usize },
    #[error("Corrupted index: {0}")]
    Corrupted(String),
    #[error("Index file not found: {0}")]
    Missing(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Index serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("Metadata error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A search hit: position in the index and inner-product score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub score: f32,
}

/// Brute-force inner-product index storing vectors contiguously
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<f32>,
}

impl FlatIndex {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.vectors.len() / self.dimension
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn add(&mut self, vector: &[f32]) -> Result<(), IndexError> {
        self.check_dimension(vector)?;
        self.vectors.extend_from_slice(vector);
        Ok(())
    }

    #[inline]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    /// Exact top-k by inner product, highest first; equal scores keep index order
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.check_dimension(query)?;

        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                score: crate::embeddings::dot(query, vector),
            })
            .collect();

        let by_score = |a: &Neighbor, b: &Neighbor| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.position.cmp(&b.position))
        };

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, by_score);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(by_score);

        Ok(neighbors)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() == self.dimension {
            Ok(())
        } else {
            Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            })
        }
    }

    fn validate(&self) -> Result<(), IndexError> {
        if self.dimension == 0 {
            return Err(IndexError::Corrupted("dimension is zero".to_string()));
        }
        if self.vectors.len() % self.dimension != 0 {
            return Err(IndexError::Corrupted(format!(
                "{} values do not divide into vectors of dimension {}",
                self.vectors.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

/// Per-document metadata stored in `documents.json`, aligned with index positions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(rename = "type", default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub difficulty_level: Option<DifficultyLevel>,
    #[serde(default)]
    pub word_count: Option<usize>,
    #[serde(default)]
    pub focus_area: Option<FocusArea>,
}

impl From<&Document> for IndexedDocument {
    #[inline]
    fn from(document: &Document) -> Self {
        let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
        Self {
            id: document.id.clone(),
            title: non_empty(&document.title),
            source: non_empty(&document.source),
            doc_type: non_empty(&document.doc_type),
            url: non_empty(&document.url),
            difficulty_level: Some(document.difficulty_level),
            word_count: Some(document.word_count),
            focus_area: Some(document.focus_area),
        }
    }
}

/// Build provenance and corpus breakdowns written to `index_metadata.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub created_at: DateTime<Utc>,
    pub model: String,
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,
    pub num_documents: usize,
    pub embedding_dim: usize,
    pub index_type: String,
    #[serde(default)]
    pub source_breakdown: BTreeMap<String, usize>,
    #[serde(default)]
    pub difficulty_breakdown: BTreeMap<u8, usize>,
    #[serde(default)]
    pub type_breakdown: BTreeMap<String, usize>,
}

/// The flat index plus its aligned metadata
#[derive(Debug, Clone, PartialEq)]
pub struct SearchIndex {
    index: FlatIndex,
    documents: Vec<IndexedDocument>,
    metadata: IndexMetadata,
}

impl SearchIndex {
    /// Assemble an index, rejecting vector/metadata misalignment
    #[inline]
    pub fn new(
        index: FlatIndex,
        documents: Vec<IndexedDocument>,
        metadata: IndexMetadata,
    ) -> Result<Self, IndexError> {
        if index.len() != documents.len() {
            return Err(IndexError::Misaligned {
                vectors: index.len(),
                documents: documents.len(),
            });
        }
        if metadata.num_documents != documents.len() {
            return Err(IndexError::Misaligned {
                vectors: metadata.num_documents,
                documents: documents.len(),
            });
        }
        if metadata.embedding_dim != index.dimension() {
            return Err(IndexError::DimensionMismatch {
                expected: metadata.embedding_dim,
                actual: index.dimension(),
            });
        }

        Ok(Self {
            index,
            documents,
            metadata,
        })
    }

    #[inline]
    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    #[inline]
    pub fn documents(&self) -> &[IndexedDocument] {
        &self.documents
    }

    #[inline]
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    #[inline]
    pub fn document(&self, position: usize) -> Option<&IndexedDocument> {
        self.documents.get(position)
    }

    #[inline]
    pub fn save(&self, dir: &Path) -> Result<(), IndexError> {
        fs::create_dir_all(dir)?;

        let writer = BufWriter::new(File::create(dir.join(VECTORS_FILE))?);
        bincode::serialize_into(writer, &self.index)?;

        write_json(&dir.join(DOCUMENTS_FILE), &self.documents)
            .map_err(|e| IndexError::Corrupted(format!("{:#}", e)))?;
        write_json(&dir.join(METADATA_FILE), &self.metadata)
            .map_err(|e| IndexError::Corrupted(format!("{:#}", e)))?;

        info!(
            "Saved index with {} vectors (dim {}) to {}",
            self.len(),
            self.dimension(),
            dir.display()
        );
        Ok(())
    }

    /// Load an index, failing when the files disagree with each other or
    /// with the dimension of the model that will encode queries
    #[inline]
    pub fn load(dir: &Path, expected_dimension: Option<usize>) -> Result<Self, IndexError> {
        let vectors_path = dir.join(VECTORS_FILE);
        let documents_path = dir.join(DOCUMENTS_FILE);
        let metadata_path = dir.join(METADATA_FILE);

        for path in [&vectors_path, &documents_path, &metadata_path] {
            if !path.exists() {
                return Err(IndexError::Missing(path.clone()));
            }
        }

        let reader = BufReader::new(File::open(&vectors_path)?);
        let index: FlatIndex = bincode::deserialize_from(reader)?;
        index.validate()?;

        let documents: Vec<IndexedDocument> =
            serde_json::from_reader(BufReader::new(File::open(&documents_path)?))?;
        let metadata: IndexMetadata =
            serde_json::from_reader(BufReader::new(File::open(&metadata_path)?))?;

        if let Some(expected) = expected_dimension {
            if expected != index.dimension() {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: index.dimension(),
                });
            }
        }

        let loaded = Self::new(index, documents, metadata)?;
        debug!(
            "Loaded index with {} documents from {}",
            loaded.len(),
            dir.display()
        );
        Ok(loaded)
    }
}

/// Sort helper shared with re-ranking: descending score, stable for ties
#[inline]
pub fn compare_scores_desc(a: f32, b: f32) -> Ordering {
    b.total_cmp(&a)
}
