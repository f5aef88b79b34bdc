//! Command-line interface: argument parsing and subcommand dispatch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use docqa_rag::openai::{OpenAICompletionGenerator, OpenAIEmbeddingProvider};
use docqa_rag::{
    EmbeddingProvider, HashingEmbeddingProvider, RagConfig, RagError, RagPipeline,
};
use tracing::{info, warn};

use crate::loader::load_documents;
use crate::server::{AppState, ServerConfig, run_server};
use crate::telemetry::LogFormat;

/// Where the index lives when neither the config file nor a flag says.
pub const DEFAULT_INDEX_PATH: &str = "vectorstore/index.json";

#[derive(Debug, Parser)]
#[command(name = "docqa", version, about = "Ask questions about a local document collection")]
pub struct Cli {
    /// JSON file with pipeline settings; unset fields use defaults
    #[arg(long, global = true, env = "DOCQA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Location of the persisted index
    #[arg(long, global = true, env = "DOCQA_INDEX_PATH")]
    pub index_path: Option<PathBuf>,

    /// Log line format
    #[arg(
        long,
        global = true,
        env = "DOCQA_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text
    )]
    pub log_format: LogFormat,

    #[command(flatten)]
    pub models: ModelArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmbeddingBackend {
    /// Offline feature-hashing embedder
    Hashing,
    /// OpenAI-compatible `/v1/embeddings` server
    Openai,
}

#[derive(Debug, Clone, Args)]
pub struct ModelArgs {
    /// Which embedding backend to use
    #[arg(
        long,
        global = true,
        env = "DOCQA_EMBEDDING_BACKEND",
        value_enum,
        default_value_t = EmbeddingBackend::Hashing
    )]
    pub embedding_backend: EmbeddingBackend,

    /// Base URL of the embedding server
    #[arg(
        long,
        global = true,
        env = "DOCQA_EMBEDDING_URL",
        default_value = "http://127.0.0.1:8080"
    )]
    pub embedding_url: String,

    /// Embedding dimension
    #[arg(long, global = true, env = "DOCQA_EMBEDDING_DIMENSIONS", default_value_t = 384)]
    pub embedding_dimensions: usize,

    /// Base URL of the completion server
    #[arg(long, global = true, env = "DOCQA_LLM_URL", default_value = "http://127.0.0.1:8080")]
    pub llm_url: String,

    /// Completion model name
    #[arg(long, global = true, env = "DOCQA_LLM_MODEL", default_value = "local")]
    pub llm_model: String,

    /// Bearer token for both servers
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rebuild the index from a directory of .txt, .md and .pdf files
    Ingest {
        /// Directory (or single file) to index
        path: PathBuf,
    },
    /// Answer one question from the persisted index
    Ask {
        question: String,
        /// Number of passages to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        /// Print the assembled prompt before answering
        #[arg(long)]
        show_prompt: bool,
    },
    /// Serve the HTTP answer endpoint
    Serve {
        #[arg(long, env = "DOCQA_HOST", default_value = "127.0.0.1")]
        host: String,
        #[arg(long, env = "DOCQA_PORT", default_value_t = 8000)]
        port: u16,
    },
    /// Show the persisted index's state
    Status,
}

/// Read the config file, if any, and apply command-line overrides.
pub fn load_config(cli: &Cli) -> Result<RagConfig> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => RagConfig::default(),
    };
    if let Some(path) = &cli.index_path {
        config.index_path = Some(path.clone());
    }
    if config.index_path.is_none() {
        config.index_path = Some(PathBuf::from(DEFAULT_INDEX_PATH));
    }
    if let Command::Ask { top_k: Some(k), .. } = &cli.command {
        config.top_k = *k;
    }
    config.validate()?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<RagConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
}

/// Build the pipeline from resolved settings.
pub fn build_pipeline(config: RagConfig, models: &ModelArgs) -> Result<RagPipeline> {
    let api_key = models.api_key.clone().unwrap_or_default();

    let embedding_provider: Arc<dyn EmbeddingProvider> = match models.embedding_backend {
        EmbeddingBackend::Hashing => {
            Arc::new(HashingEmbeddingProvider::new(models.embedding_dimensions))
        }
        EmbeddingBackend::Openai => Arc::new(
            OpenAIEmbeddingProvider::new()
                .with_base_url(&models.embedding_url)
                .with_api_key(api_key.clone())
                .with_model(&config.embedding_model)
                .with_dimensions(models.embedding_dimensions),
        ),
    };

    let generator = OpenAICompletionGenerator::new(&models.llm_model)
        .with_base_url(&models.llm_url)
        .with_api_key(api_key)
        .with_params(config.generation.clone());

    Ok(RagPipeline::builder()
        .config(config)
        .embedding_provider(embedding_provider)
        .generator(Arc::new(generator))
        .build()?)
}

/// Run the parsed command line to completion.
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let pipeline = build_pipeline(config, &cli.models)?;

    match cli.command {
        Command::Ingest { path } => {
            let documents = tokio::task::spawn_blocking(move || load_documents(path))
                .await
                .context("document loader panicked")??;
            let report = pipeline.ingest(&documents).await.context("ingestion failed")?;
            println!(
                "Indexed {} chunks from {} documents ({} empty) with {} ({} dims)",
                report.chunks,
                report.documents,
                report.empty_documents,
                report.embedding_model,
                report.dimensions
            );
            if let Some(path) = report.persisted_to {
                println!("Saved index to {}", path.display());
            }
        }
        Command::Ask { question, show_prompt, .. } => {
            pipeline.load_index().await.context("failed to load index")?;
            if show_prompt {
                let prepared = pipeline.prepare(&question).await.context("cannot answer")?;
                println!("{}\n", prepared.prompt.text);
            }
            let response = pipeline.answer_or_refusal(&question).await;
            println!("{}", response.answer);
            if let Some(kind) = response.error {
                bail!("question refused ({kind})");
            }
            if !response.sources.is_empty() {
                println!("\nSources:");
                for (rank, source) in response.sources.iter().enumerate() {
                    println!("  [{}] {} (score {:.3})", rank + 1, source.source_id, source.score);
                }
            }
            if response.dropped_chunks > 0 {
                println!(
                    "({} passages left out to fit the context budget)",
                    response.dropped_chunks
                );
            }
        }
        Command::Serve { host, port } => {
            match pipeline.load_index().await {
                Ok(status) => info!(entries = status.entries, "serving loaded index"),
                Err(RagError::IndexNotFound { .. }) => {
                    warn!("no index found; questions are refused until `docqa ingest` runs")
                }
                Err(e) => return Err(e).context("failed to load index"),
            }
            run_server(ServerConfig { host, port }, AppState::new(pipeline)).await?;
        }
        Command::Status => {
            let status = match pipeline.load_index().await {
                Ok(status) => status,
                Err(RagError::IndexNotFound { .. }) => pipeline.status().await,
                Err(e) => return Err(e).context("failed to load index"),
            };
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_the_config_file() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("docqa.json");
        std::fs::write(&file, r#"{ "chunk_size": 300, "top_k": 2 }"#).unwrap();

        let cli = Cli::parse_from([
            "docqa",
            "--config",
            file.to_str().unwrap(),
            "ask",
            "What is the sun?",
            "--top-k",
            "5",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.chunk_size, 300);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.index_path.as_deref(), Some(Path::new(DEFAULT_INDEX_PATH)));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("docqa.json");
        std::fs::write(&file, r#"{ "chunk_size": 10, "chunk_overlap": 10 }"#).unwrap();
        let cli = Cli::parse_from(["docqa", "--config", file.to_str().unwrap(), "status"]);
        assert!(load_config(&cli).is_err());
    }

    #[tokio::test]
    async fn ask_fails_with_the_refusal_kind() {
        let temp = tempfile::tempdir().unwrap();
        let docs = temp.path().join("docs");
        std::fs::create_dir(&docs).unwrap();
        std::fs::write(docs.join("sun.txt"), "The sun is a star.").unwrap();
        let index = temp.path().join("index.json");
        let index = index.to_str().unwrap();

        let docs = docs.to_str().unwrap();
        let ingest = Cli::parse_from(["docqa", "--index-path", index, "ingest", docs]);
        run(ingest).await.unwrap();

        let ask = Cli::parse_from([
            "docqa",
            "--index-path",
            index,
            "--llm-url",
            "http://127.0.0.1:9",
            "ask",
            "What is the sun?",
        ]);
        let err = run(ask).await.unwrap_err();
        assert_eq!(err.to_string(), "question refused (model_unavailable)");
    }

    #[test]
    fn hashing_backend_is_the_default() {
        let cli = Cli::parse_from(["docqa", "--index-path", "/tmp/idx.json", "status"]);
        let config = load_config(&cli).unwrap();
        let pipeline = build_pipeline(config, &cli.models).unwrap();
        assert_eq!(pipeline.embedder().model_id(), "hashing-bow-384");
        assert_eq!(pipeline.config().index_path.as_deref(), Some(Path::new("/tmp/idx.json")));
    }
}
