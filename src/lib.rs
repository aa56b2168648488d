use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Empty input at position {position}: text is blank after trimming")]
    EmptyInput { position: usize },

    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Generation service error: {0}")]
    GenerationService(String),

    #[error("Dimension mismatch at position {position}: expected {expected}, got {actual}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Cannot build an index from zero vectors")]
    EmptyIndex,

    #[error("Corrupt index: position {position} is out of bounds for {records} records")]
    CorruptIndex { position: usize, records: usize },

    #[error("Index holds {vectors} vectors but the store holds {records} records")]
    IndexSizeMismatch { vectors: usize, records: usize },

    #[error("Timed out during {stage}")]
    Timeout { stage: &'static str },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Whether a caller may sensibly retry the operation that produced this error.
    ///
    /// Only failures of external dependencies qualify; caller misuse and
    /// invariant violations will fail the same way again.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ModelUnavailable(_) | Self::GenerationService(_) | Self::Timeout { .. }
        )
    }

    /// Whether this error signals broken data rather than a bad request or a
    /// failing dependency. `CorruptIndex` is always a bug.
    #[inline]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. }
                | Self::EmptyIndex
                | Self::CorruptIndex { .. }
                | Self::IndexSizeMismatch { .. }
        )
    }
}

pub mod commands;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod pipeline;
pub mod retrieval;
pub mod synthesis;

pub use corpus::{CorpusRow, DocumentRecord, DocumentStore};
pub use embeddings::{Embedder, HashingEmbedder, OllamaEmbedder, embed_corpus};
pub use index::{FlatIndex, Neighbor, VectorIndex};
pub use pipeline::{Answer, Pipeline};
pub use retrieval::{RetrievalResult, Retriever};
pub use synthesis::{AnswerSynthesizer, GenerationClient, OllamaGenerator, Synthesis};
