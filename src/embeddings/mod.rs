// Embeddings module
// Text-to-vector backends and the batched corpus encoder

pub mod hashing;
pub mod ollama;


use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{RagError, Result};

pub use hashing::HashingEmbedder;
pub use ollama::{ModelInfo, OllamaEmbedder};

/// A backend that maps text to fixed-dimension vectors.
///
/// `embed` returns exactly one vector per input, in input order. Blank input
/// (empty after trimming) is rejected with [`RagError::EmptyInput`]; no
/// backend ever produces a placeholder vector for it.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Number of components in every vector this backend produces
    fn dimension(&self) -> usize;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .pop()
            .ok_or_else(|| RagError::ModelUnavailable("Backend returned no embedding".to_string()))
    }
}

/// Reject any blank text, reporting its position in `texts`
#[inline]
pub fn ensure_non_blank(texts: &[String]) -> Result<()> {
    match texts.iter().position(|t| t.trim().is_empty()) {
        Some(position) => Err(RagError::EmptyInput { position }),
        None => Ok(()),
    }
}

/// Check that `vectors` has one entry per input and every entry has `dimension` components
#[inline]
pub fn validate_vectors(vectors: &[Vec<f32>], expected_count: usize, dimension: usize) -> Result<()> {
    if vectors.len() != expected_count {
        return Err(RagError::ModelUnavailable(format!(
            "Mismatch between request and response counts: {} vs {}",
            expected_count,
            vectors.len()
        )));
    }

    if let Some((position, vector)) = vectors
        .iter()
        .enumerate()
        .find(|(_, v)| v.len() != dimension)
    {
        return Err(RagError::DimensionMismatch {
            position,
            expected: dimension,
            actual: vector.len(),
        });
    }

    Ok(())
}

/// Embed a whole corpus once, batch by batch
///
/// Batches are independent and run in parallel; the output is concatenated in
/// input order so vector `i` always belongs to text `i`. Any failing batch
/// fails the whole call.
#[inline]
pub fn embed_corpus(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
    progress: &ProgressBar,
) -> Result<Vec<Vec<f32>>> {
    if batch_size == 0 {
        return Err(RagError::InvalidArgument(
            "batch size must be greater than 0".to_string(),
        ));
    }

    ensure_non_blank(texts)?;

    let batch_count = texts.len().div_ceil(batch_size);
    progress.set_length(batch_count as u64);
    debug!(
        "Embedding {} texts in {} batches of up to {}",
        texts.len(),
        batch_count,
        batch_size
    );

    let batches: Vec<Vec<Vec<f32>>> = texts
        .par_chunks(batch_size)
        .map(|batch| {
            let vectors = embedder.embed(batch)?;
            progress.inc(1);
            Ok(vectors)
        })
        .collect::<Result<_>>()?;

    let vectors: Vec<Vec<f32>> = batches.into_iter().flatten().collect();
    validate_vectors(&vectors, texts.len(), embedder.dimension())?;

    progress.finish_and_clear();
    info!(
        "Embedded {} texts ({} dimensions)",
        vectors.len(),
        embedder.dimension()
    );
    Ok(vectors)
}
