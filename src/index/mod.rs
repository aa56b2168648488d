// Similarity index module
// Position-indexed vector search; records live in the corpus, never here

pub mod flat;

pub use flat::FlatIndex;

use crate::Result;

/// A nearest-neighbour hit: the position of a stored vector and its distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Read-only k-nearest-neighbour search over a fixed set of vectors.
///
/// Implementations are built once from the full vector set and never mutated;
/// a corpus change builds a new index. `search` must return at most `k` hits
/// ordered by non-decreasing distance, with ties in insertion order.
pub trait VectorIndex: Send + Sync + std::fmt::Debug {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Number of stored vectors
    fn len(&self) -> usize;

    fn dimension(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
