use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the source datasheets
    pub data_dir: PathBuf,
    /// Directory holding the persisted vector index
    pub index_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Optional JSON file overriding the built-in scope catalog
    pub scopes_file: Option<PathBuf>,
    /// Optional directory overriding the built-in prompt templates
    pub prompts_dir: Option<PathBuf>,
    /// Reject explicit scopes that are not in the catalog
    pub strict_scopes: bool,
    pub retrieval: RetrievalConfig,
    pub chunking: ChunkingConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of passages returned per query
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 6 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama", "openai" or "mistral" (OpenAI-compatible)
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for routing and answering
    pub chat_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Sampling temperature for the routing call
    pub router_temperature: f32,
    /// Sampling temperature for the answer call
    pub answer_temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            api_key: None,
            router_temperature: 0.0,
            answer_temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "http" (uses the LLM provider's embedding endpoint) or "hashing" (offline)
    pub provider: String,
    /// Model name for embeddings
    pub model: String,
    /// Embedding vector dimension, used by the hashing provider
    pub dim: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "http".to_string(),
            model: "nomic-embed-text".to_string(),
            dim: 768,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            index_dir: PathBuf::from("./index"),
            bind_addr: "127.0.0.1:8000".to_string(),
            scopes_file: None,
            prompts_dir: None,
            strict_scopes: false,
            retrieval: RetrievalConfig::default(),
            chunking: ChunkingConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl Config {
    /// Build configuration from the environment, loading `.env` first if present.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = get("RAG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("RAG_INDEX_DIR") {
            config.index_dir = PathBuf::from(dir);
        }
        if let Some(addr) = get("RAG_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(path) = get("RAG_SCOPES_FILE") {
            config.scopes_file = Some(PathBuf::from(path));
        }
        if let Some(dir) = get("RAG_PROMPTS_DIR") {
            config.prompts_dir = Some(PathBuf::from(dir));
        }
        if let Some(val) = get("RAG_STRICT_SCOPES") {
            config.strict_scopes = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(val) = get("RAG_TOP_K") {
            if let Ok(v) = val.parse::<usize>() {
                config.retrieval.top_k = v.max(1);
            }
        }
        if let Some(val) = get("RAG_CHUNK_SIZE") {
            if let Ok(v) = val.parse::<usize>() {
                config.chunking.chunk_size = v.max(1);
            }
        }
        if let Some(val) = get("RAG_CHUNK_OVERLAP") {
            if let Ok(v) = val.parse() {
                config.chunking.chunk_overlap = v;
            }
        }
        // Overlap must stay below the chunk size or splitting cannot advance
        if config.chunking.chunk_overlap >= config.chunking.chunk_size {
            config.chunking.chunk_overlap = config.chunking.chunk_size / 10;
        }

        if let Some(provider) = get("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Some(url) = get("LLM_BASE_URL") {
            config.llm.base_url = url;
        } else if config.llm.provider == "mistral" {
            config.llm.base_url = "https://api.mistral.ai".to_string();
        } else if config.llm.provider == "openai" {
            config.llm.base_url = "https://api.openai.com".to_string();
        }
        if let Some(model) = get("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Some(key) = get("LLM_API_KEY").or_else(|| get("MISTRAL_API_KEY")) {
            config.llm.api_key = Some(key);
        }
        if let Some(val) = get("LLM_ROUTER_TEMPERATURE") {
            if let Ok(v) = val.parse() {
                config.llm.router_temperature = v;
            }
        }
        if let Some(val) = get("LLM_ANSWER_TEMPERATURE") {
            if let Ok(v) = val.parse() {
                config.llm.answer_temperature = v;
            }
        }

        if let Some(provider) = get("EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }
        if let Some(model) = get("LLM_EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Some(val) = get("EMBEDDING_DIM") {
            if let Ok(v) = val.parse() {
                config.embedding.dim = v;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.retrieval.top_k, 6);
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.llm.router_temperature, 0.0);
        assert_eq!(config.llm.answer_temperature, 0.0);
        assert!(!config.strict_scopes);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("RAG_TOP_K", "3"),
            ("RAG_STRICT_SCOPES", "true"),
            ("LLM_PROVIDER", "openai"),
            ("LLM_CHAT_MODEL", "gpt-4o-mini"),
        ]);
        assert_eq!(config.retrieval.top_k, 3);
        assert!(config.strict_scopes);
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.base_url, "https://api.openai.com");
        assert_eq!(config.llm.chat_model, "gpt-4o-mini");
    }

    #[test]
    fn test_mistral_defaults_base_url_and_key() {
        let config = config_from(&[("LLM_PROVIDER", "mistral"), ("MISTRAL_API_KEY", "k")]);
        assert_eq!(config.llm.base_url, "https://api.mistral.ai");
        assert_eq!(config.llm.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_invalid_numbers_are_ignored() {
        let config = config_from(&[("RAG_TOP_K", "many"), ("RAG_TOP_K_EXTRA", "1")]);
        assert_eq!(config.retrieval.top_k, 6);
    }

    #[test]
    fn test_overlap_clamped_below_chunk_size() {
        let config = config_from(&[("RAG_CHUNK_SIZE", "200"), ("RAG_CHUNK_OVERLAP", "500")]);
        assert_eq!(config.chunking.chunk_overlap, 20);
    }
}
