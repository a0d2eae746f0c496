use ahash::RandomState;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::hash::{BuildHasher, Hash, Hasher};

use crate::config::{EmbeddingConfig, LlmConfig};

/// Maximum characters sent per text to the embedding API.
/// Chunks are ~1000 chars, so this only trims pathological inputs.
const MAX_EMBED_CHARS: usize = 3_000;

/// Turns texts into vectors, one per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .context("No embedding returned")
    }
}

/// Truncate `text` to at most `MAX_EMBED_CHARS`, splitting on a UTF-8 char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Embedding client for Ollama or OpenAI-compatible APIs.
#[derive(Clone)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    llm: LlmConfig,
    model: String,
}

impl HttpEmbedder {
    pub fn new(client: reqwest::Client, llm: LlmConfig, embedding: &EmbeddingConfig) -> Self {
        Self {
            client,
            llm,
            model: embedding.model.clone(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let truncated: Vec<String> = texts
            .iter()
            .map(|t| truncate_for_embedding(t).to_string())
            .collect();

        let embeddings = match self.llm.provider.as_str() {
            "ollama" => embed_ollama(&self.client, &self.llm, &self.model, &truncated).await?,
            "openai" | "mistral" => {
                embed_openai(&self.client, &self.llm, &self.model, &truncated).await?
            }
            other => anyhow::bail!("Unknown LLM provider: {other}"),
        };

        if embeddings.len() != texts.len() {
            anyhow::bail!(
                "Embedding API returned {} vectors for {} inputs",
                embeddings.len(),
                texts.len()
            );
        }
        Ok(embeddings)
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    input: Vec<String>,
    truncate: bool,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

async fn embed_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    model: &str,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/api/embed", config.base_url.trim_end_matches('/'));

    let batch_size = 32;
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(batch_size) {
        let req = OllamaEmbedRequest {
            model: model.to_string(),
            input: chunk.to_vec(),
            truncate: true,
        };

        let resp = client
            .post(&url)
            .json(&req)
            .send()
            .await
            .context("Failed to call Ollama embed API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Ollama embed API returned {status}: {body}");
        }

        let body: OllamaEmbedResponse = resp
            .json()
            .await
            .context("Failed to parse Ollama embed response")?;

        all_embeddings.extend(body.embeddings);
    }

    Ok(all_embeddings)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedData>,
}

#[derive(Deserialize)]
struct OpenAiEmbedData {
    embedding: Vec<f32>,
}

async fn embed_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    model: &str,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/v1/embeddings", config.base_url.trim_end_matches('/'));
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let batch_size = 64;
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(batch_size) {
        let req = OpenAiEmbedRequest {
            model: model.to_string(),
            input: chunk.to_vec(),
        };

        let resp = client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&req)
            .send()
            .await
            .context("Failed to call OpenAI embed API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI embed API returned {status}: {body}");
        }

        let body: OpenAiEmbedResponse = resp
            .json()
            .await
            .context("Failed to parse OpenAI embed response")?;

        all_embeddings.extend(body.data.into_iter().map(|d| d.embedding));
    }

    Ok(all_embeddings)
}

// ─── Hashing (offline) ───────────────────────────────────

/// Deterministic bag-of-tokens embedder. Tokens are lowercased and hashed
/// into a fixed number of buckets, then the vector is L2-normalised.
/// Good enough for keyword-heavy datasheet lookups without a model server.
/// Seeds are fixed so vectors written by `ingest` match those computed at query time.
pub struct HashingEmbedder {
    dimensions: usize,
    hasher: RandomState,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.clamp(8, 4096),
            hasher: RandomState::with_seeds(
                0x5bd1_e995,
                0x27d4_eb2f,
                0x1656_67b1,
                0x9e37_79b9,
            ),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = self.hasher.build_hasher();
            token.to_lowercase().hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dimensions;
            vector[idx] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Build the embedder selected by configuration.
pub fn build_embedder(
    client: &reqwest::Client,
    llm: &LlmConfig,
    embedding: &EmbeddingConfig,
) -> Result<Box<dyn Embedder>> {
    match embedding.provider.as_str() {
        "http" => Ok(Box::new(HttpEmbedder::new(client.clone(), llm.clone(), embedding))),
        "hashing" => Ok(Box::new(HashingEmbedder::new(embedding.dim))),
        other => anyhow::bail!("Unknown embedding provider: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_for_embedding("VBAT"), "VBAT");
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        let text = "é".repeat(MAX_EMBED_CHARS);
        let out = truncate_for_embedding(&text);
        assert!(out.len() <= MAX_EMBED_CHARS);
        assert!(text.is_char_boundary(out.len()));
    }

    #[tokio::test]
    async fn test_hashing_embedder_is_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed_one("Cortex-M4 core at 168 MHz").await.unwrap();
        let b = embedder.embed_one("Cortex-M4 core at 168 MHz").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hashing_embedder_case_insensitive() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed_one("GPIO").await.unwrap();
        let b = embedder.embed_one("gpio").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hashing_embedder_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        let v = embedder.embed_one("  ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_build_embedder_rejects_unknown_provider() {
        let embedding = EmbeddingConfig {
            provider: "magic".into(),
            ..EmbeddingConfig::default()
        };
        let result = build_embedder(&reqwest::Client::new(), &LlmConfig::default(), &embedding);
        assert!(result.is_err());
    }
}
