use std::fmt::Write;
use std::sync::Arc;

use crate::error::Result;
use crate::llm::completion::CompletionService;
use crate::models::ChatMessage;
use crate::rag::prompts::PromptTemplate;
use crate::rag::scope::{Scope, ScopeCatalog};

/// Classifies a question into one document scope, or unscoped.
pub struct QueryRouter {
    completion: Arc<dyn CompletionService>,
    catalog: Arc<ScopeCatalog>,
    template: PromptTemplate,
    temperature: f32,
}

impl QueryRouter {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        catalog: Arc<ScopeCatalog>,
        template: PromptTemplate,
        temperature: f32,
    ) -> Self {
        Self {
            completion,
            catalog,
            template,
            temperature,
        }
    }

    /// Pick the scope for `question`. Never fails: any problem building the
    /// prompt or calling the completion service yields [`Scope::Unscoped`].
    pub async fn route(&self, question: &str) -> Scope {
        let messages = match self.build_messages(question) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!("Router prompt failed, searching all documents: {e}");
                return Scope::Unscoped;
            }
        };

        match self.completion.complete(&messages, self.temperature).await {
            Ok(raw) => {
                tracing::debug!("Router raw output: {raw:?}");
                let scope = self.catalog.parse_label(raw.trim());
                tracing::info!("Routed question to scope '{scope}'");
                scope
            }
            Err(e) => {
                tracing::warn!("Routing failed, searching all documents: {e:#}");
                Scope::Unscoped
            }
        }
    }

    pub fn build_messages(&self, question: &str) -> Result<Vec<ChatMessage>> {
        let scopes = render_scopes(&self.catalog);
        let examples = render_examples(&self.catalog);
        self.template.render(&[
            ("scopes", scopes.as_str()),
            ("examples", examples.as_str()),
            ("question", question.trim()),
        ])
    }
}

fn render_scopes(catalog: &ScopeCatalog) -> String {
    let mut out = String::new();
    for profile in catalog.scopes() {
        let _ = write!(out, "- {}: {}", profile.id, profile.description);
        if !profile.keywords.is_empty() {
            let _ = write!(out, ". Keywords: {}", profile.keywords.join(", "));
        }
        out.push('\n');
    }
    let _ = write!(
        out,
        "- {}: none of the above, or more than one applies",
        Scope::Unscoped
    );
    out
}

fn render_examples(catalog: &ScopeCatalog) -> String {
    catalog
        .examples()
        .iter()
        .map(|e| format!("Question: {}\nDocument: {}", e.question, e.scope))
        .collect::<Vec<_>>()
        .join("\n\n")
}
