use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::llm::completion::CompletionService;
use crate::models::AskResult;
use crate::rag::context::format_context;
use crate::rag::prompts::PromptSet;
use crate::rag::retriever::ScopedRetriever;
use crate::rag::router::QueryRouter;
use crate::rag::scope::{RequestedScope, ScopeCatalog};
use crate::rag::synthesizer::AnswerSynthesizer;
use crate::search::VectorIndex;

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub top_k: usize,
    pub router_temperature: f32,
    pub answer_temperature: f32,
    /// Reject explicit scopes missing from the catalog instead of passing them through.
    pub strict_scopes: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            top_k: 6,
            router_temperature: 0.0,
            answer_temperature: 0.0,
            strict_scopes: false,
        }
    }
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            router_temperature: config.llm.router_temperature,
            answer_temperature: config.llm.answer_temperature,
            strict_scopes: config.strict_scopes,
        }
    }
}

/// Route, retrieve, format, synthesize.
pub struct Pipeline {
    router: QueryRouter,
    retriever: ScopedRetriever,
    synthesizer: AnswerSynthesizer,
    catalog: Arc<ScopeCatalog>,
    strict_scopes: bool,
}

impl Pipeline {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        index: Arc<dyn VectorIndex>,
        catalog: Arc<ScopeCatalog>,
        prompts: PromptSet,
        options: PipelineOptions,
    ) -> Self {
        tracing::info!(
            "Pipeline ready: {} scope(s), router prompt v{}, answer prompt v{}, k={}",
            catalog.scopes().len(),
            prompts.router.version,
            prompts.answer.version,
            options.top_k
        );
        Self {
            router: QueryRouter::new(
                completion.clone(),
                catalog.clone(),
                prompts.router,
                options.router_temperature,
            ),
            retriever: ScopedRetriever::new(index, options.top_k),
            synthesizer: AnswerSynthesizer::new(
                completion,
                prompts.answer,
                options.answer_temperature,
            ),
            catalog,
            strict_scopes: options.strict_scopes,
        }
    }

    pub fn catalog(&self) -> &ScopeCatalog {
        &self.catalog
    }

    /// Answer `question`. `requested_scope` is `"auto"` to let the router
    /// decide, `"unscoped"` to search everything, or a document scope id.
    pub async fn ask(&self, question: &str, requested_scope: &str) -> Result<AskResult> {
        self.ask_scoped(question, RequestedScope::parse(requested_scope))
            .await
    }

    pub async fn ask_scoped(&self, question: &str, requested: RequestedScope) -> Result<AskResult> {
        let (scope, routed) = match requested {
            RequestedScope::Auto => (self.router.route(question).await, true),
            RequestedScope::Explicit(scope) => {
                (self.catalog.resolve_explicit(scope, self.strict_scopes)?, false)
            }
        };

        // The scope reported back is the one used as the retrieval filter.
        let sources = self.retriever.retrieve(question, &scope).await?;
        let context = format_context(&sources);
        let answer = self.synthesizer.synthesize(question, &context).await?;

        tracing::info!(
            "Answered with {} source(s) in scope '{scope}' (routed: {routed})",
            sources.len()
        );
        Ok(AskResult {
            answer,
            sources,
            scope,
            routed,
        })
    }
}
