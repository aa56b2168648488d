
use tracing::debug;

use super::{Neighbor, VectorIndex};
use crate::{RagError, Result};

/// Exact brute-force index using Euclidean distance
///
/// Vectors are stored contiguously, row-major. Every search scans all rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Build an index from the full vector set
    ///
    /// # Errors
    /// * [`RagError::EmptyIndex`] when `vectors` is empty
    /// * [`RagError::DimensionMismatch`] when a vector's length differs from the first
    /// * [`RagError::InvalidArgument`] when a component is NaN or infinite
    #[inline]
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self> {
        let first = vectors.first().ok_or(RagError::EmptyIndex)?;
        let dimension = first.len();
        if dimension == 0 {
            return Err(RagError::InvalidArgument(
                "vectors must have at least one component".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    position,
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(RagError::InvalidArgument(format!(
                    "vector at position {} contains NaN or infinite values",
                    position
                )));
            }
            data.extend_from_slice(vector);
        }

        debug!(
            "Built flat index with {} vectors of dimension {}",
            vectors.len(),
            dimension
        );
        Ok(Self { dimension, data })
    }

    /// The vector stored at `position`
    #[inline]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }
}

impl VectorIndex for FlatIndex {
    #[inline]
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(RagError::InvalidArgument(
                "k must be greater than 0".to_string(),
            ));
        }
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                position: 0,
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if query.iter().any(|v| !v.is_finite()) {
            return Err(RagError::InvalidArgument(
                "query vector contains NaN or infinite values".to_string(),
            ));
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, stored)| Neighbor {
                position,
                distance: euclidean_distance(stored, query),
            })
            .collect();

        // Stable: equal distances keep insertion order.
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);

        Ok(neighbors)
    }

    #[inline]
    fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}
