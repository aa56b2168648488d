use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::corpus::DocumentStore;
use crate::embeddings::{Embedder, HashingEmbedder, OllamaEmbedder};
use crate::ingest::ingest_directory;
use crate::pipeline::{Answer, Pipeline};
use crate::retrieval::{RetrievalResult, Retriever};
use crate::synthesis::{AnswerSynthesizer, GenerationClient, OllamaGenerator};

/// Which embedding backend the corpus and queries go through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    Ollama,
    /// Hashed character trigrams, no server needed
    Local,
}

/// Read a folder of documents and write the corpus table
#[inline]
pub fn ingest_documents(dir: &Path, output: Option<PathBuf>) -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let output = output.unwrap_or_else(|| config.corpus_path());

    let store = ingest_directory(dir)?;
    if store.is_empty() {
        println!("No documents with text found in {}", dir.display());
        return Ok(());
    }

    store
        .save(&output)
        .with_context(|| format!("Failed to write corpus to {}", output.display()))?;

    let images: usize = store.records().iter().map(|r| r.asset_paths.len()).sum();
    println!("Ingested {} documents ({} images)", store.len(), images);
    println!("Corpus written to {}", output.display());
    Ok(())
}

/// Print the records closest to `query`
#[inline]
pub async fn search_corpus(
    query: String,
    k: Option<usize>,
    corpus: Option<PathBuf>,
    backend: EmbeddingBackend,
) -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let pipeline = build_pipeline(&config, corpus, backend).await?;

    let results = pipeline.retrieve(&query, k).await?;
    if results.is_empty() {
        println!("No results for: {}", query);
        return Ok(());
    }

    println!("Results for: {}", query);
    println!();
    print_results(&results);
    Ok(())
}

/// Answer `query` from the corpus and show the supporting records
#[inline]
pub async fn ask_question(
    query: String,
    k: Option<usize>,
    corpus: Option<PathBuf>,
    backend: EmbeddingBackend,
) -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let pipeline = build_pipeline(&config, corpus, backend).await?;

    let answer = pipeline.answer(&query, k).await?;
    print_answer(&answer);
    Ok(())
}

/// Show configuration, corpus and Ollama health
#[inline]
pub async fn show_status(corpus: Option<PathBuf>) -> Result<()> {
    let config = Config::load_default().unwrap_or_default();
    let corpus_path = corpus.unwrap_or_else(|| config.corpus_path());

    println!("📊 Blog RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("📚 Corpus Status:");
    match DocumentStore::load(&corpus_path) {
        Ok(store) => {
            let images: usize = store.records().iter().map(|r| r.asset_paths.len()).sum();
            println!("   ✅ {}", corpus_path.display());
            println!("   📄 Documents: {}", store.len());
            println!("   🖼️  Images: {}", images);
        }
        Err(e) => println!("   ❌ {} - {}", corpus_path.display(), e),
    }
    println!();

    println!("🤖 Ollama Status:");
    let ollama = config.ollama.clone();
    let health = tokio::task::spawn_blocking(move || {
        OllamaEmbedder::new(&ollama).and_then(|client| client.health_check())
    })
    .await
    .context("Health check task failed")?;

    match health {
        Ok(()) => {
            println!(
                "   ✅ Ollama: Connected ({}:{})",
                config.ollama.host, config.ollama.port
            );
            println!(
                "   📋 Embedding Model: {} ({} dimensions)",
                config.ollama.embedding_model, config.ollama.embedding_dimension
            );
        }
        Err(e) => println!("   ⚠️  Ollama: {}", e),
    }
    println!("   ✍️  Generation Model: {}", config.ollama.generation_model);
    println!();

    println!("⚙️  Retrieval:");
    println!("   Top K: {}", config.retrieval.top_k);
    println!(
        "   Context Budget: {} chars",
        config.generation.max_context_chars
    );

    Ok(())
}

/// Load the corpus, embed it and wire up retrieval and synthesis
#[inline]
pub async fn build_pipeline(
    config: &Config,
    corpus: Option<PathBuf>,
    backend: EmbeddingBackend,
) -> Result<Pipeline> {
    let corpus_path = corpus.unwrap_or_else(|| config.corpus_path());
    let store = DocumentStore::load(&corpus_path).with_context(|| {
        format!(
            "Failed to load corpus (run 'blog-rag ingest <dir>' first): {}",
            corpus_path.display()
        )
    })?;

    let embedder: Arc<dyn Embedder> = match backend {
        EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(&config.ollama)?),
        EmbeddingBackend::Local => Arc::new(HashingEmbedder::default()),
    };
    let batch_size = config.ollama.batch_size as usize;

    info!(
        "Indexing {} documents from {}",
        store.len(),
        corpus_path.display()
    );
    let retriever = tokio::task::spawn_blocking(move || {
        let bar = progress_bar();
        Retriever::build_with_progress(embedder, store, batch_size, &bar)
    })
    .await
    .context("Indexing task failed")??;

    let generator: Arc<dyn GenerationClient> = Arc::new(OllamaGenerator::new(&config.ollama)?);
    let synthesizer = AnswerSynthesizer::new(generator, &config.generation);

    Ok(Pipeline::new(Arc::new(retriever), synthesizer, config))
}

fn progress_bar() -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding corpus")
        .map_or_else(
            |_| ProgressBar::hidden(),
            |style| ProgressBar::new(0).with_style(style),
        )
}

fn print_results(results: &[RetrievalResult]) {
    for result in results {
        println!(
            "#{} {} (distance {:.4})",
            result.rank + 1,
            result.record.title,
            result.distance
        );
        for path in &result.record.asset_paths {
            println!("   🖼️  {}", path);
        }
        println!("{}", result.record.text);
        println!("{}", "-".repeat(50));
    }
}

fn print_answer(answer: &Answer) {
    println!("### AI Response for: {}", answer.query);
    if answer.grounded_on == 0 && !answer.results.is_empty() {
        println!("⚠️  No retrieved entry fit the context budget; this answer is not grounded in the corpus");
    } else if answer.grounded_on < answer.results.len() {
        println!(
            "⚠️  Context budget held {} of {} retrieved entries",
            answer.grounded_on,
            answer.results.len()
        );
    }
    println!();
    println!("{}", answer.text.trim());
    println!();
    println!("### Retrieved Entries:");
    println!();
    print_results(&answer.results);
}
