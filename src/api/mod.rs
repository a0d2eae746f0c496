//! Axum handlers for the chat boundary.

pub mod chat;
pub mod scopes;

use axum::http::StatusCode;

use crate::error::RagError;

/// Map a pipeline error to a response. Service failures are logged in full
/// and reported to the caller without internals.
pub(crate) fn error_response(err: RagError) -> (StatusCode, String) {
    if err.is_client_error() {
        return (StatusCode::BAD_REQUEST, err.to_string());
    }
    tracing::error!("Request failed: {err}");
    let message = match err {
        RagError::Completion(_) => "The language model is unavailable, please try again later",
        RagError::Retrieval(_) => "The document index is unavailable, please try again later",
        _ => "Internal server error",
    };
    (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::config::Config;
    use crate::llm::completion::CompletionService;
    use crate::llm::embeddings::{Embedder, HashingEmbedder};
    use crate::rag::prompts::PromptSet;
    use crate::rag::{Pipeline, PipelineOptions, ScopeCatalog};
    use crate::search::vector::{passage, VectorStore};
    use crate::search::EmbeddingIndex;
    use crate::state::AppState;

    /// State over a small on-disk index with an offline embedder.
    pub async fn state_with(
        completion: Arc<dyn CompletionService>,
        options: PipelineOptions,
    ) -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open_or_create(dir.path()).unwrap();
        let embedder = HashingEmbedder::new(64);
        let passages = vec![
            passage("STM32F407 core frequency up to 168 MHz", "data/stm32f4.pdf", 0),
            passage("BG96 supports LTE Cat M1 and Cat NB1 (NB-IoT)", "data/bg96.pdf", 0),
            passage("BG96 VBAT supply range 3.3 V to 4.3 V", "data/bg96.pdf", 1),
        ];
        let texts: Vec<String> = passages.iter().map(|p| p.content.clone()).collect();
        let embeddings = embedder.embed(&texts).await.unwrap();
        store.add(passages, embeddings).unwrap();

        let index = Arc::new(EmbeddingIndex::new(Box::new(embedder), store));
        let pipeline = Pipeline::new(
            completion,
            index.clone(),
            Arc::new(ScopeCatalog::builtin()),
            PromptSet::builtin().unwrap(),
            options,
        );
        (dir, AppState::from_parts(Config::default(), pipeline, index))
    }
}
