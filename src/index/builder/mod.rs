
use anyhow::{Context, Result, bail};
use chrono::Utc;
use indicatif::ProgressBar;
use std::path::Path;
use tracing::{debug, info};

use super::{FlatIndex, INDEX_TYPE, IndexError, IndexMetadata, IndexedDocument, SearchIndex};
use crate::corpus::{CorpusStats, Document};
use crate::embeddings::{Embedder, l2_normalize};

/// Encode every document in batches, normalize, and build an aligned index
#[inline]
pub fn build_index(
    documents: &[Document],
    embedder: &dyn Embedder,
    batch_size: usize,
    corpus_path: Option<&Path>,
    progress: &ProgressBar,
) -> Result<SearchIndex> {
    if documents.is_empty() {
        bail!("Cannot build an index from an empty corpus");
    }

    let dimension = embedder.dimension();
    let batch_size = batch_size.max(1);
    let mut index = FlatIndex::new(dimension);

    info!(
        "Encoding {} documents with {} (dim {}, batch size {})",
        documents.len(),
        embedder.model_name(),
        dimension,
        batch_size
    );
    progress.set_length(documents.len() as u64);

    for (batch_number, batch) in documents.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(Document::embedding_text).collect();
        let vectors = embedder
            .embed_batch(&texts)
            .with_context(|| format!("Failed to encode batch {}", batch_number + 1))?;

        if vectors.len() != batch.len() {
            bail!(
                "Embedder returned {} vectors for a batch of {} documents",
                vectors.len(),
                batch.len()
            );
        }

        for (document, mut vector) in batch.iter().zip(vectors) {
            if vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                })
                .with_context(|| format!("Embedding for document {}", document.id));
            }
            l2_normalize(&mut vector);
            index.add(&vector)?;
        }

        progress.inc(batch.len() as u64);
        debug!("Encoded batch {} ({} documents)", batch_number + 1, batch.len());
    }

    let stats = CorpusStats::compute(documents);
    let metadata = IndexMetadata {
        created_at: Utc::now(),
        model: embedder.model_name().to_string(),
        corpus_path: corpus_path.map(Path::to_path_buf),
        num_documents: documents.len(),
        embedding_dim: dimension,
        index_type: INDEX_TYPE.to_string(),
        source_breakdown: stats.source_breakdown,
        difficulty_breakdown: stats.difficulty_breakdown,
        type_breakdown: stats.type_breakdown,
    };

    let indexed = documents.iter().map(IndexedDocument::from).collect();
    let search_index = SearchIndex::new(index, indexed, metadata)?;

    progress.finish_and_clear();
    info!("Built index with {} vectors", search_index.len());
    Ok(search_index)
}
