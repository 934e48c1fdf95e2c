#[cfg(test)]
mod tests;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{CorpusFile, Document, load_documents};

/// Summary of a corpus, written as the `metadata` block of `corpus.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub created_at: Option<DateTime<Utc>>,
    pub source_files: Vec<PathBuf>,
    pub total_documents: usize,
    pub total_words: usize,
    pub average_words_per_doc: f64,
    pub source_breakdown: BTreeMap<String, usize>,
    pub type_breakdown: BTreeMap<String, usize>,
    pub focus_breakdown: BTreeMap<String, usize>,
    pub difficulty_breakdown: BTreeMap<u8, usize>,
}

impl CorpusStats {
    #[inline]
    pub fn compute(documents: &[Document]) -> Self {
        let mut stats = Self {
            total_documents: documents.len(),
            ..Self::default()
        };

        for document in documents {
            *stats
                .source_breakdown
                .entry(document.source.clone())
                .or_default() += 1;

            let doc_type = if document.doc_type.is_empty() {
                "unknown"
            } else {
                document.doc_type.as_str()
            };
            *stats.type_breakdown.entry(doc_type.to_string()).or_default() += 1;

            *stats
                .focus_breakdown
                .entry(document.focus_area.as_str().to_string())
                .or_default() += 1;
            *stats
                .difficulty_breakdown
                .entry(document.difficulty_level.get())
                .or_default() += 1;

            stats.total_words += document.word_count;
        }

        if stats.total_documents > 0 {
            stats.average_words_per_doc = stats.total_words as f64 / stats.total_documents as f64;
        }

        stats
    }
}

/// Combine document lists, keeping the first document seen for each id
#[inline]
pub fn merge_documents<I>(batches: I) -> Vec<Document>
where
    I: IntoIterator<Item = Vec<Document>>,
{
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for batch in batches {
        for document in batch {
            if seen.insert(document.id.clone()) {
                merged.push(document);
            } else {
                warn!("Dropping duplicate document id {}", document.id);
            }
        }
    }

    merged
}

/// Load and merge raw scraper outputs into a single corpus.
///
/// Unreadable files are logged and skipped so that one bad source does not
/// block the merge.
#[inline]
pub fn merge_files(paths: &[PathBuf]) -> Result<CorpusFile> {
    let mut batches = Vec::with_capacity(paths.len());
    let mut source_files = Vec::with_capacity(paths.len());

    for path in paths {
        match load_documents(path) {
            Ok(documents) => {
                info!("Loaded {} documents from {}", documents.len(), path.display());
                source_files.push(path.clone());
                batches.push(documents);
            }
            Err(e) => {
                warn!("Skipping {}: {:#}", path.display(), e);
            }
        }
    }

    let documents = merge_documents(batches);
    let mut metadata = CorpusStats::compute(&documents);
    metadata.created_at = Some(Utc::now());
    metadata.source_files = source_files;

    info!(
        "Merged corpus: {} documents, {} words",
        metadata.total_documents, metadata.total_words
    );

    Ok(CorpusFile {
        metadata,
        documents,
    })
}

/// All `*.json` files in a directory, sorted by name
#[inline]
pub fn raw_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
                && !path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(".checkpoint.json"))
        })
        .collect();
    files.sort();
    Ok(files)
}
