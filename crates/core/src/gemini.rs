//! Gemini REST adapters for text generation and embeddings.

use crate::embeddings::Embedder;
use crate::traits::Generator;
use crate::CollaboratorError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";
pub const TEXT_EMBEDDING_004_DIMENSIONS: usize = 768;
/// Upper bound on requests per `batchEmbedContents` call.
const GEMINI_EMBED_BATCH_LIMIT: usize = 100;

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl GeminiSettings {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_GEMINI_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{method}",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

pub struct GeminiGenerator {
    client: Client,
    settings: GeminiSettings,
}

impl GeminiGenerator {
    pub fn new(settings: GeminiSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, CollaboratorError> {
        debug!(model = %self.settings.model, prompt_len = prompt.len(), "generating content");

        let response = self
            .client
            .post(self.settings.endpoint("generateContent"))
            .header("x-goog-api-key", &self.settings.api_key)
            .json(&json!({
                "contents": [{"role": "user", "parts": [{"text": prompt}]}]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::backend(
                "gemini",
                format!("generateContent returned {}", response.status()),
            ));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .ok_or_else(|| CollaboratorError::backend("gemini", "response had no candidates"))?;

        Ok(text)
    }
}

pub struct GeminiEmbedder {
    client: Client,
    settings: GeminiSettings,
    dimensions: usize,
}

impl GeminiEmbedder {
    pub fn new(settings: GeminiSettings, dimensions: usize) -> Self {
        Self {
            client: Client::new(),
            settings,
            dimensions,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn max_batch_size(&self) -> usize {
        GEMINI_EMBED_BATCH_LIMIT
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CollaboratorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = format!("models/{}", self.settings.model);
        let requests = texts
            .iter()
            .map(|text| json!({"model": model, "content": {"parts": [{"text": text}]}}))
            .collect::<Vec<_>>();

        let response = self
            .client
            .post(self.settings.endpoint("batchEmbedContents"))
            .header("x-goog-api-key", &self.settings.api_key)
            .json(&json!({ "requests": requests }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CollaboratorError::backend(
                "gemini",
                format!("batchEmbedContents returned {}", response.status()),
            ));
        }

        let parsed: BatchEmbedResponse = response.json().await?;
        Ok(parsed.embeddings.into_iter().map(|embedding| embedding.values).collect())
    }
}
