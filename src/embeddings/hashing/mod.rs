
use tracing::debug;

use super::{Embedder, ensure_non_blank};
use crate::{RagError, Result};

pub const DEFAULT_HASHING_DIMENSION: usize = 384;
const NGRAM: usize = 3;
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Local embedding backend based on hashed character trigrams.
///
/// Each lowercased word is padded with spaces, split into trigrams and each
/// trigram is hashed (FNV-1a) into one of `dimension` buckets with a sign
/// taken from the hash. The result is L2-normalised. Needs no network and is
/// deterministic across runs and platforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl Default for HashingEmbedder {
    #[inline]
    fn default() -> Self {
        Self {
            dimension: DEFAULT_HASHING_DIMENSION,
        }
    }
}

impl HashingEmbedder {
    #[inline]
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RagError::InvalidArgument(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];

        for word in text.split_whitespace() {
            let padded: Vec<char> = format!(" {} ", word.to_lowercase()).chars().collect();
            for gram in padded.windows(NGRAM) {
                let hash = fnv1a(gram);
                let bucket = (hash % self.dimension as u64) as usize;
                let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
                vector[bucket] += sign;
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Embedder for HashingEmbedder {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        ensure_non_blank(texts)?;
        debug!("Hashing {} texts into {} buckets", texts.len(), self.dimension);
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    let mut buf = [0_u8; 4];
    for c in chars {
        for byte in c.encode_utf8(&mut buf).as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    hash
}
