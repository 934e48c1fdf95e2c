// Embeddings: the encoder seam used by index construction and query time

pub mod ollama;


use anyhow::Result;

pub use ollama::OllamaClient;

/// Produces fixed-dimension vectors for documents and queries.
///
/// Index construction and retrieval must use the same implementation and
/// model, otherwise scores are meaningless.
pub trait Embedder: Send + Sync {
    /// Name of the model behind this embedder, recorded in index metadata
    fn model_name(&self) -> &str;

    /// Expected output dimension
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Scale a vector to unit length in place so inner product equals cosine
/// similarity. A zero vector is left unchanged.
#[inline]
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
