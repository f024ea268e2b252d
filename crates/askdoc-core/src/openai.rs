//! Blocking client for OpenAI-compatible embedding and chat endpoints

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{embed::Embedder, llm::Llm, AskError, Config, Result};

/// Sampling temperature for answers; low to keep them close to the context.
const CHAT_TEMPERATURE: f32 = 0.1;

/// Shared HTTP plumbing for the embedding and chat wrappers.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    api_base: String,
    api_key: String,
}

impl OpenAiClient {
    /// Create a client from config. Fails when no API key is configured.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let http = Client::builder()
            .timeout(config.request_timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|e| AskError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn post<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<String> {
        let url = format!("{}/{}", self.api_base, endpoint);
        tracing::debug!("POST {}", url);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .map_err(|e| AskError::Api(format!("failed to call {}: {}", url, e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| AskError::Api(format!("failed to read response from {}: {}", url, e)))?;

        check_status(status, &text)?;
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Map a non-success status to an API error, using the body's
/// `error.message` when the server sent one.
fn check_status(status: StatusCode, body: &str) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());
    Err(AskError::Api(format!("status={}: {}", status, detail)))
}

fn parse_embeddings(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut resp: EmbeddingsResponse = serde_json::from_str(body)
        .map_err(|e| AskError::Api(format!("failed to decode embeddings response: {}", e)))?;

    if resp.data.len() != expected {
        return Err(AskError::Api(format!(
            "expected {} embeddings, got {}",
            expected,
            resp.data.len()
        )));
    }

    resp.data.sort_by_key(|d| d.index);
    let embeddings: Vec<Vec<f32>> = resp.data.into_iter().map(|d| d.embedding).collect();
    if embeddings.iter().any(|e| e.is_empty()) {
        return Err(AskError::Api("embeddings response was empty".to_string()));
    }
    Ok(embeddings)
}

fn parse_chat(body: &str) -> Result<String> {
    let resp: ChatResponse = serde_json::from_str(body)
        .map_err(|e| AskError::Api(format!("failed to decode chat response: {}", e)))?;
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AskError::Api("chat response was empty".to_string()))
}

/// Embeddings via `POST {base}/embeddings`.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl Embedder for OpenAiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = self.client.post(
            "embeddings",
            &EmbeddingsRequest {
                model: &self.model,
                input: texts,
            },
        )?;
        parse_embeddings(&body, texts.len())
    }
}

/// Completions via `POST {base}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiLlm {
    client: OpenAiClient,
    model: String,
}

impl OpenAiLlm {
    pub fn new(client: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl Llm for OpenAiLlm {
    fn model(&self) -> &str {
        &self.model
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        let body = self.client.post(
            "chat/completions",
            &ChatRequest {
                model: &self.model,
                messages: vec![ChatMessage {
                    role: "user",
                    content: prompt,
                }],
                temperature: CHAT_TEMPERATURE,
            },
        )?;
        parse_chat(&body)
    }
}
