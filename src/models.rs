use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rag::scope::{Scope, AUTO_LABEL};

/// Metadata key carrying a passage's document scope.
pub const SOURCE_FIELD: &str = "source";

/// Metadata attached to a passage at ingestion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageMetadata {
    /// Scope identifier, conventionally `"<directory>/<filename>"`.
    pub source: String,
    /// 1-based page number for paginated sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub chunk_index: usize,
}

impl PassageMetadata {
    /// Look up a metadata field by name for equality filtering.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            SOURCE_FIELD => Some(self.source.clone()),
            "page" => self.page.map(|p| p.to_string()),
            "chunk_index" => Some(self.chunk_index.to_string()),
            _ => None,
        }
    }
}

/// A retrieved unit of datasheet text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: Uuid,
    pub content: String,
    pub metadata: PassageMetadata,
    /// Similarity to the query, set on retrieval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Passage {
    pub fn new(content: impl Into<String>, metadata: PassageMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            metadata,
            score: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.metadata.source
    }

    /// First `max_chars` characters followed by "...", for display.
    pub fn preview(&self, max_chars: usize) -> String {
        let head: String = self.content.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

/// Outcome of one `ask` call.
#[derive(Debug, Clone, Serialize)]
pub struct AskResult {
    pub answer: String,
    pub sources: Vec<Passage>,
    /// The scope actually applied to retrieval.
    pub scope: Scope,
    /// True when the scope came from the router rather than the caller.
    pub routed: bool,
}

/// A single role-tagged message sent to the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat request accepted by the HTTP boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    /// "auto" (default), "unscoped", or a scope identifier. Missing and
    /// `null` both mean "auto".
    #[serde(default)]
    pub doc_filter: Option<String>,
}

impl ChatRequest {
    pub fn doc_filter(&self) -> &str {
        self.doc_filter.as_deref().unwrap_or(AUTO_LABEL)
    }
}

/// Chat response rendered by the HTTP boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub scope: String,
    pub routed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(source: &str) -> PassageMetadata {
        PassageMetadata {
            source: source.to_string(),
            page: Some(3),
            chunk_index: 7,
        }
    }

    #[test]
    fn test_metadata_field_lookup() {
        let m = meta("data/bg96.pdf");
        assert_eq!(m.field("source").as_deref(), Some("data/bg96.pdf"));
        assert_eq!(m.field("page").as_deref(), Some("3"));
        assert_eq!(m.field("chunk_index").as_deref(), Some("7"));
        assert_eq!(m.field("author"), None);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let p = Passage::new("µC".repeat(80), meta("data/stm32f4.pdf"));
        let preview = p.preview(100);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 103);
    }

    #[test]
    fn test_preview_short_content() {
        let p = Passage::new("VBAT 3.3V", meta("data/bg96.pdf"));
        assert_eq!(p.preview(100), "VBAT 3.3V...");
    }

    #[test]
    fn test_chat_request_defaults_to_auto() {
        let req: ChatRequest = serde_json::from_str(r#"{"query":"What is a GPIO?"}"#).unwrap();
        assert_eq!(req.doc_filter(), "auto");
    }

    #[test]
    fn test_chat_request_null_filter_is_auto() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"query":"What is a GPIO?","doc_filter":null}"#).unwrap();
        assert!(req.doc_filter.is_none());
        assert_eq!(req.doc_filter(), "auto");

        let req: ChatRequest =
            serde_json::from_str(r#"{"query":"q","doc_filter":"data/bg96.pdf"}"#).unwrap();
        assert_eq!(req.doc_filter(), "data/bg96.pdf");
    }
}
