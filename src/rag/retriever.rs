use std::sync::Arc;

use crate::error::{RagError, Result};
use crate::models::Passage;
use crate::rag::scope::Scope;
use crate::search::VectorIndex;

/// Similarity search restricted to one document scope.
pub struct ScopedRetriever {
    index: Arc<dyn VectorIndex>,
    k: usize,
}

impl ScopedRetriever {
    pub fn new(index: Arc<dyn VectorIndex>, k: usize) -> Self {
        Self { index, k: k.max(1) }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// At most `k` passages in index order. A document scope never falls
    /// back to a global search: an empty scoped pool yields an empty result.
    pub async fn retrieve(&self, question: &str, scope: &Scope) -> Result<Vec<Passage>> {
        let filter = scope.filter();
        let mut passages = self
            .index
            .similarity_search(question, self.k, filter.as_ref())
            .await
            .map_err(RagError::Retrieval)?;

        // Contract holds even for an index that ignores or loosens the filter.
        if let Some(filter) = &filter {
            passages.retain(|p| filter.matches(&p.metadata));
        }
        passages.truncate(self.k);

        tracing::info!(
            "Retrieved {} passage(s) for scope '{scope}' (k={})",
            passages.len(),
            self.k
        );
        Ok(passages)
    }
}
