//! Fakes for the external services, shared by unit tests.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::llm::completion::CompletionService;
use crate::models::{ChatMessage, Passage};
use crate::search::{MetadataFilter, VectorIndex};

/// Replies with a fixed answer (or error) and records every call.
pub struct ScriptedCompletion {
    reply: std::result::Result<String, String>,
    pub calls: Mutex<Vec<(Vec<ChatMessage>, f32)>>,
}

impl ScriptedCompletion {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        self.calls.lock().push((messages.to_vec(), temperature));
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(msg) => anyhow::bail!("{msg}"),
        }
    }
}

/// Returns passages in stored order, honouring the filter, and records filters seen.
pub struct StaticIndex {
    passages: Vec<Passage>,
    pub filters: Mutex<Vec<Option<MetadataFilter>>>,
}

impl StaticIndex {
    pub fn new(passages: Vec<Passage>) -> Self {
        Self {
            passages,
            filters: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorIndex for StaticIndex {
    async fn similarity_search(
        &self,
        _query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Passage>> {
        self.filters.lock().push(filter.cloned());
        Ok(self
            .passages
            .iter()
            .filter(|p| filter.map_or(true, |f| f.matches(&p.metadata)))
            .take(k)
            .cloned()
            .collect())
    }
}
