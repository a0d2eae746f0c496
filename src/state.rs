use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::llm::completion::HttpCompletionClient;
use crate::llm::embeddings::build_embedder;
use crate::rag::prompts::PromptSet;
use crate::rag::{Pipeline, PipelineOptions, ScopeCatalog};
use crate::search::vector::VectorStore;
use crate::search::EmbeddingIndex;

/// Concurrent `/chat` requests allowed to hold the completion service.
const CHAT_CONCURRENCY: usize = 3;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<Pipeline>,
    pub index: Arc<EmbeddingIndex>,
    pub chat_semaphore: Arc<tokio::sync::Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = build_http_client()?;
        let index = Arc::new(open_index(&config, &http_client)?);
        let completion = Arc::new(HttpCompletionClient::new(http_client, config.llm.clone()));
        let pipeline = Pipeline::new(
            completion,
            index.clone(),
            Arc::new(load_catalog(&config)?),
            PromptSet::load(config.prompts_dir.as_deref())?,
            PipelineOptions::from(&config),
        );
        Ok(Self::from_parts(config, pipeline, index))
    }

    /// Assemble state around an already-built pipeline.
    pub fn from_parts(config: Config, pipeline: Pipeline, index: Arc<EmbeddingIndex>) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            index,
            chat_semaphore: Arc::new(tokio::sync::Semaphore::new(CHAT_CONCURRENCY)),
        }
    }
}

pub fn build_http_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(120))
        .build()?)
}

/// Open the persisted vector store with the configured embedder.
pub fn open_index(config: &Config, http_client: &reqwest::Client) -> anyhow::Result<EmbeddingIndex> {
    let store = VectorStore::open_or_create(&config.index_dir)?;
    tracing::info!(
        "Vector store at {} holds {} passage(s)",
        config.index_dir.display(),
        store.len()
    );
    let embedder = build_embedder(http_client, &config.llm, &config.embedding)?;
    Ok(EmbeddingIndex::new(embedder, store))
}

/// The scope catalog from `RAG_SCOPES_FILE`, or the built-in one.
pub fn load_catalog(config: &Config) -> anyhow::Result<ScopeCatalog> {
    match &config.scopes_file {
        Some(path) => {
            tracing::info!("Loading scope catalog from {}", path.display());
            Ok(ScopeCatalog::from_file(path)?)
        }
        None => Ok(ScopeCatalog::builtin()),
    }
}
