// Retrieval orchestration
// Query -> embedding -> index search -> records, against an atomically published snapshot

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

use crate::corpus::{DocumentRecord, DocumentStore};
use crate::embeddings::{Embedder, embed_corpus};
use crate::index::{FlatIndex, VectorIndex};
use crate::{RagError, Result};

pub const DEFAULT_TOP_K: usize = 5;
const DEFAULT_BATCH_SIZE: usize = 16;

/// A retrieved record with its distance to the query and 0-based rank
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub record: DocumentRecord,
    pub distance: f32,
    pub rank: usize,
}

/// A document store and the index built from it, published together
#[derive(Debug)]
pub struct Snapshot {
    store: DocumentStore,
    index: Box<dyn VectorIndex>,
    built_at: DateTime<Utc>,
}

impl Snapshot {
    /// Pair a store with an index built from its records, in the same order
    #[inline]
    pub fn new(store: DocumentStore, index: Box<dyn VectorIndex>) -> Result<Self> {
        if index.len() != store.len() {
            return Err(RagError::IndexSizeMismatch {
                vectors: index.len(),
                records: store.len(),
            });
        }

        Ok(Self {
            store,
            index,
            built_at: Utc::now(),
        })
    }

    #[inline]
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    #[inline]
    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    #[inline]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Run a search and join the hits back to records
    #[inline]
    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        let neighbors = self.index.search(query_vector, k)?;

        neighbors
            .into_iter()
            .enumerate()
            .map(|(rank, neighbor)| {
                let record = self.store.get(neighbor.position).ok_or(RagError::CorruptIndex {
                    position: neighbor.position,
                    records: self.store.len(),
                })?;
                Ok(RetrievalResult {
                    record: record.clone(),
                    distance: neighbor.distance,
                    rank,
                })
            })
            .collect()
    }
}

/// Resolves free-text queries to ranked records
///
/// Built once from a corpus, queried many times, and rebuilt wholesale when the
/// corpus changes. Queries always run against one complete snapshot.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    current: RwLock<Arc<Snapshot>>,
}

impl std::fmt::Debug for Retriever {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("dimension", &self.embedder.dimension())
            .field("batch_size", &self.batch_size)
            .field("records", &self.len())
            .finish()
    }
}

impl Retriever {
    /// Embed every record of `store` and build the first snapshot
    #[inline]
    pub fn build(embedder: Arc<dyn Embedder>, store: DocumentStore) -> Result<Self> {
        Self::build_with_progress(embedder, store, DEFAULT_BATCH_SIZE, &ProgressBar::hidden())
    }

    #[inline]
    pub fn build_with_progress(
        embedder: Arc<dyn Embedder>,
        store: DocumentStore,
        batch_size: usize,
        progress: &ProgressBar,
    ) -> Result<Self> {
        let snapshot = build_snapshot(embedder.as_ref(), store, batch_size, progress)?;

        Ok(Self {
            embedder,
            batch_size,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Use an already built snapshot, e.g. one backed by another index implementation
    #[inline]
    pub fn from_snapshot(embedder: Arc<dyn Embedder>, snapshot: Snapshot) -> Result<Self> {
        ensure_dimension(embedder.as_ref(), &snapshot)?;

        Ok(Self {
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Replace the corpus
    ///
    /// The new snapshot is built completely before it is published; on failure
    /// the previous snapshot stays in place.
    #[inline]
    pub fn rebuild(&self, store: DocumentStore) -> Result<()> {
        let snapshot = build_snapshot(
            self.embedder.as_ref(),
            store,
            self.batch_size,
            &ProgressBar::hidden(),
        )?;
        self.publish(snapshot)
    }

    /// Atomically swap in a new snapshot
    ///
    /// A snapshot whose index dimension differs from the embedder's is
    /// rejected with [`RagError::DimensionMismatch`] and the current one stays.
    #[inline]
    pub fn publish(&self, snapshot: Snapshot) -> Result<()> {
        ensure_dimension(self.embedder.as_ref(), &snapshot)?;

        let records = snapshot.len();
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(snapshot);
        drop(current);
        info!("Published new snapshot with {} records", records);
        Ok(())
    }

    /// The currently published snapshot
    #[inline]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    #[inline]
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Retrieve the `k` records closest to `query`, closest first
    ///
    /// # Errors
    /// * [`RagError::InvalidQuery`] for a blank query
    /// * [`RagError::InvalidArgument`] for `k == 0`
    /// * embedding failures from the backend, unchanged
    /// * [`RagError::CorruptIndex`] if the index points past the store
    #[inline]
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidQuery("query must not be blank".to_string()));
        }
        if k == 0 {
            return Err(RagError::InvalidArgument(
                "k must be greater than 0".to_string(),
            ));
        }

        let snapshot = self.snapshot();
        let query_vector = self.embedder.embed_one(query)?;
        let results = snapshot.search(&query_vector, k)?;

        debug!(
            "Retrieved {} results for query (length: {})",
            results.len(),
            query.len()
        );
        Ok(results)
    }
}

fn ensure_dimension(embedder: &dyn Embedder, snapshot: &Snapshot) -> Result<()> {
    if snapshot.index().dimension() != embedder.dimension() {
        return Err(RagError::DimensionMismatch {
            position: 0,
            expected: embedder.dimension(),
            actual: snapshot.index().dimension(),
        });
    }
    Ok(())
}

fn build_snapshot(
    embedder: &dyn Embedder,
    store: DocumentStore,
    batch_size: usize,
    progress: &ProgressBar,
) -> Result<Snapshot> {
    let vectors = embed_corpus(embedder, &store.texts(), batch_size, progress)?;
    let index = FlatIndex::build(&vectors)?;
    Snapshot::new(store, Box::new(index))
}
