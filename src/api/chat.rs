use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error_response;
use crate::models::{AskResult, ChatRequest, ChatResponse};
use crate::state::AppState;

const MAX_QUERY_LEN: usize = 2000;
/// Characters of each source passage echoed back to the client.
const SOURCE_PREVIEW_CHARS: usize = 100;

/// POST /chat - Scoped question answering.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Query is required".to_string()));
    }
    let query = truncate_to_char_boundary(query, MAX_QUERY_LEN);

    let _permit = state
        .chat_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Chat service at capacity".to_string(),
            )
        })?;

    let result = state
        .pipeline
        .ask(&query, req.doc_filter())
        .await
        .map_err(error_response)?;

    Ok(Json(to_response(result)))
}

fn to_response(result: AskResult) -> ChatResponse {
    let note = if result.sources.is_empty() {
        Some(format!("No passages found in '{}'", result.scope))
    } else if result.routed && result.scope.is_unscoped() {
        Some("Searched all documents".to_string())
    } else if result.routed {
        Some(format!("Routed to {}", result.scope))
    } else {
        None
    };

    ChatResponse {
        sources: result
            .sources
            .iter()
            .map(|p| p.preview(SOURCE_PREVIEW_CHARS))
            .collect(),
        scope: result.scope.to_string(),
        routed: result.routed,
        answer: result.answer,
        note,
    }
}

fn truncate_to_char_boundary(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    s.char_indices()
        .take_while(|(i, _)| *i < max_len)
        .map(|(_, c)| c)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::state_with;
    use crate::rag::testing::ScriptedCompletion;
    use crate::rag::PipelineOptions;
    use std::sync::Arc;

    fn request(query: &str, doc_filter: &str) -> Json<ChatRequest> {
        Json(ChatRequest {
            query: query.to_string(),
            doc_filter: Some(doc_filter.to_string()),
        })
    }

    #[test]
    fn test_truncate_long_query() {
        let long = "a".repeat(3000);
        assert_eq!(truncate_to_char_boundary(&long, MAX_QUERY_LEN).len(), MAX_QUERY_LEN);
    }

    #[test]
    fn test_truncate_unicode_safe() {
        let result = truncate_to_char_boundary("Hello 🌍 world", 8);
        assert!(result.is_char_boundary(result.len()));
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let completion = Arc::new(ScriptedCompletion::replying("x"));
        let (_dir, state) = state_with(completion.clone(), PipelineOptions::default()).await;
        let err = chat(State(state), request("   ", "auto")).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(completion.call_count(), 0);
    }

    #[tokio::test]
    async fn test_explicit_scope_response() {
        let completion = Arc::new(ScriptedCompletion::replying("3.3 V to 4.3 V"));
        let (_dir, state) = state_with(completion, PipelineOptions::default()).await;
        let Json(resp) = chat(State(state), request("VBAT range?", "data/bg96.pdf"))
            .await
            .unwrap();
        assert_eq!(resp.answer, "3.3 V to 4.3 V");
        assert_eq!(resp.scope, "data/bg96.pdf");
        assert!(!resp.routed);
        assert_eq!(resp.sources.len(), 2);
        assert!(resp.sources.iter().all(|s| s.ends_with("...")));
        assert!(resp.note.is_none());
    }

    #[tokio::test]
    async fn test_routed_response_carries_note() {
        let completion = Arc::new(ScriptedCompletion::replying("data/stm32f4.pdf"));
        let (_dir, state) = state_with(completion, PipelineOptions::default()).await;
        let Json(resp) = chat(State(state), request("STM32F407 clock?", "auto"))
            .await
            .unwrap();
        assert!(resp.routed);
        assert_eq!(resp.scope, "data/stm32f4.pdf");
        assert_eq!(resp.note.as_deref(), Some("Routed to data/stm32f4.pdf"));
    }

    #[tokio::test]
    async fn test_null_doc_filter_routes() {
        let completion = Arc::new(ScriptedCompletion::replying("data/bg96.pdf"));
        let (_dir, state) = state_with(completion, PipelineOptions::default()).await;
        let req: ChatRequest =
            serde_json::from_str(r#"{"query":"Does BG96 support NB-IoT?","doc_filter":null}"#)
                .unwrap();
        let Json(resp) = chat(State(state), Json(req)).await.unwrap();
        assert!(resp.routed);
        assert_eq!(resp.scope, "data/bg96.pdf");
    }

    #[tokio::test]
    async fn test_unknown_scope_strict_is_bad_request() {
        let completion = Arc::new(ScriptedCompletion::replying("x"));
        let options = PipelineOptions {
            strict_scopes: true,
            ..PipelineOptions::default()
        };
        let (_dir, state) = state_with(completion, options).await;
        let err = chat(State(state), request("q", "data/esp32.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_completion_failure_is_server_error() {
        let completion = Arc::new(ScriptedCompletion::failing("down"));
        let (_dir, state) = state_with(completion, PipelineOptions::default()).await;
        let err = chat(State(state), request("q", "unscoped")).await.unwrap_err();
        assert_eq!(err.0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_empty_scope_note() {
        let completion = Arc::new(ScriptedCompletion::replying("I cannot find this information"));
        let (_dir, state) = state_with(completion, PipelineOptions::default()).await;
        let Json(resp) = chat(State(state), request("Wi-Fi?", "data/esp32.pdf"))
            .await
            .unwrap();
        assert!(resp.sources.is_empty());
        assert_eq!(resp.note.as_deref(), Some("No passages found in 'data/esp32.pdf'"));
    }
}
