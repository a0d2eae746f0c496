use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::models::ChatMessage;

/// Single-turn text completion over role-tagged messages.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String>;
}

/// Completion client for Ollama or OpenAI-compatible chat APIs.
#[derive(Clone)]
pub struct HttpCompletionClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpCompletionClient {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        match self.config.provider.as_str() {
            "ollama" => call_ollama(&self.client, &self.config, messages, temperature).await,
            "openai" | "mistral" => {
                call_openai(&self.client, &self.config, messages, temperature).await
            }
            other => anyhow::bail!("Unknown LLM provider: {other}"),
        }
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

async fn call_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: &[ChatMessage],
    temperature: f32,
) -> Result<String> {
    let url = format!("{}/api/chat", config.base_url.trim_end_matches('/'));

    let req = OllamaChatRequest {
        model: &config.chat_model,
        messages,
        stream: false,
        options: OllamaOptions { temperature },
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .context("Failed to call Ollama chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama chat API returned {status}: {body}");
    }

    let body = resp.text().await?;
    parse_ollama_response(&body)
}

fn parse_ollama_response(body: &str) -> Result<String> {
    let parsed: OllamaChatResponse =
        serde_json::from_str(body).context("Failed to parse Ollama chat response")?;
    Ok(parsed.message.content)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

async fn call_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    messages: &[ChatMessage],
    temperature: f32,
) -> Result<String> {
    let url = format!("{}/v1/chat/completions", config.base_url.trim_end_matches('/'));
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiChatRequest {
        model: &config.chat_model,
        messages,
        temperature,
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .context("Failed to call OpenAI-compatible chat API")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI-compatible chat API returned {status}: {body}");
    }

    let body = resp.text().await?;
    parse_openai_response(&body)
}

fn parse_openai_response(body: &str) -> Result<String> {
    let parsed: OpenAiChatResponse =
        serde_json::from_str(body).context("Failed to parse OpenAI chat response")?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .context("Chat response contained no content")
}
