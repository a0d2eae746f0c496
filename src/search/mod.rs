//! Vector index contract and the embedding-backed implementation.

pub mod vector;

use anyhow::Result;
use async_trait::async_trait;

use crate::llm::embeddings::Embedder;
use crate::models::{Passage, PassageMetadata, SOURCE_FIELD};
use vector::VectorStore;

/// Equality constraint on one metadata field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFilter {
    pub field: String,
    pub value: String,
}

impl MetadataFilter {
    pub fn source(value: impl Into<String>) -> Self {
        Self {
            field: SOURCE_FIELD.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(&self, metadata: &PassageMetadata) -> bool {
        metadata.field(&self.field).as_deref() == Some(self.value.as_str())
    }
}

/// Similarity search over persisted passages.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `k` passages, most similar first, restricted by `filter` when given.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Passage>>;
}

/// A [`VectorStore`] queried through an [`Embedder`].
pub struct EmbeddingIndex {
    embedder: Box<dyn Embedder>,
    store: VectorStore,
}

impl EmbeddingIndex {
    pub fn new(embedder: Box<dyn Embedder>, store: VectorStore) -> Self {
        Self { embedder, store }
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }
}

#[async_trait]
impl VectorIndex for EmbeddingIndex {
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Passage>> {
        if self.store.is_empty() {
            return Ok(Vec::new());
        }
        let query_embedding = self.embedder.embed_one(query).await?;
        Ok(self.store.search(&query_embedding, k, filter))
    }
}
