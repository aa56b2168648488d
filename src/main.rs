use blog_rag::commands::{EmbeddingBackend, ask_question, ingest_documents, search_corpus, show_status};
use blog_rag::config::{init_config, run_interactive_config, show_config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "blog-rag")]
#[command(about = "Ask questions about a blog and get answers grounded in its posts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Write a default configuration file
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
    /// Read a folder of .txt/.md posts (plus images/) into the corpus table
    Ingest {
        /// Folder containing the posts
        dir: PathBuf,
        /// Where to write the corpus table (defaults to the config directory)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show the posts closest to a query
    Search {
        query: String,
        /// Number of posts to retrieve (defaults to retrieval.top_k)
        #[arg(short, long)]
        k: Option<usize>,
        /// Corpus table to search (defaults to the config directory)
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Embed with the built-in hashing model instead of Ollama
        #[arg(long)]
        local_embeddings: bool,
    },
    /// Answer a question using the posts closest to it
    Ask {
        query: String,
        /// Number of posts to ground the answer on (defaults to retrieval.top_k)
        #[arg(short, long)]
        k: Option<usize>,
        /// Corpus table to search (defaults to the config directory)
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Embed with the built-in hashing model instead of Ollama
        #[arg(long)]
        local_embeddings: bool,
    },
    /// Show corpus and Ollama status
    Status {
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
}

fn backend(local_embeddings: bool) -> EmbeddingBackend {
    if local_embeddings {
        EmbeddingBackend::Local
    } else {
        EmbeddingBackend::Ollama
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show, init } => {
            if show {
                show_config()?;
            } else if init {
                init_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest { dir, output } => {
            ingest_documents(&dir, output)?;
        }
        Commands::Search {
            query,
            k,
            corpus,
            local_embeddings,
        } => {
            search_corpus(query, k, corpus, backend(local_embeddings)).await?;
        }
        Commands::Ask {
            query,
            k,
            corpus,
            local_embeddings,
        } => {
            ask_question(query, k, corpus, backend(local_embeddings)).await?;
        }
        Commands::Status { corpus } => {
            show_status(corpus).await?;
        }
    }

    Ok(())
}
