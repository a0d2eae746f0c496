use std::sync::Arc;

use crate::error::{RagError, Result};
use crate::llm::completion::CompletionService;
use crate::models::ChatMessage;
use crate::rag::prompts::PromptTemplate;

/// Produces an answer grounded in the supplied context.
pub struct AnswerSynthesizer {
    completion: Arc<dyn CompletionService>,
    template: PromptTemplate,
    temperature: f32,
}

impl AnswerSynthesizer {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        template: PromptTemplate,
        temperature: f32,
    ) -> Self {
        Self {
            completion,
            template,
            temperature,
        }
    }

    pub fn build_messages(&self, question: &str, context: &str) -> Result<Vec<ChatMessage>> {
        self.template
            .render(&[("context", context), ("question", question.trim())])
    }

    /// One completion call, no retry. Service errors propagate.
    pub async fn synthesize(&self, question: &str, context: &str) -> Result<String> {
        let messages = self.build_messages(question, context)?;
        let answer = self
            .completion
            .complete(&messages, self.temperature)
            .await
            .map_err(RagError::Completion)?;
        Ok(answer.trim().to_string())
    }
}
