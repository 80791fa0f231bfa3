use crate::embeddings::{Embedder, Embedding};
use crate::generation::Generator;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const EMBEDDING_MODEL: &str = "models/text-embedding-004";
const GENERATION_MODEL: &str = "models/gemini-2.0-flash";
/// batchEmbedContents rejects more than 100 requests per call
const EMBED_BATCH_SIZE: usize = 100;

/// Configuration for Gemini API
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub embeddings_url: String,
    pub batch_embeddings_url: String,
    pub generate_url: String,
}

impl GeminiConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY").context("GEMINI_API_KEY not set")?;
        let embeddings_url = env::var("GEMINI_EMBEDDINGS_URL")
            .unwrap_or_else(|_| format!("{}/{}:embedContent", DEFAULT_API_BASE, EMBEDDING_MODEL));
        let batch_embeddings_url = env::var("GEMINI_BATCH_EMBEDDINGS_URL").unwrap_or_else(|_| {
            format!("{}/{}:batchEmbedContents", DEFAULT_API_BASE, EMBEDDING_MODEL)
        });
        let generate_url = env::var("GEMINI_GENERATE_URL").unwrap_or_else(|_| {
            format!("{}/{}:generateContent", DEFAULT_API_BASE, GENERATION_MODEL)
        });

        Ok(GeminiConfig {
            api_key,
            embeddings_url,
            batch_embeddings_url,
            generate_url,
        })
    }
}

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::new();
        GeminiClient { config, client }
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        request: &Req,
    ) -> Result<Resp> {
        let url = format!("{}?key={}", url, self.config.api_key);

        let response = self.client.post(&url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("API request failed: {} {}", status, error_text));
        }

        Ok(response.json().await?)
    }

    /// Generate text using the Gemini model
    pub async fn generate_text(
        &self,
        prompt: &str,
        temperature: f32,
        top_p: f32,
        top_k: i32,
        max_output_tokens: i32,
    ) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content::new_with_role(prompt, "user")],
            generation_config: GenerationConfig {
                temperature,
                top_p,
                top_k,
                max_output_tokens,
            },
        };

        let response_data: GenerateResponse = self.post(&self.config.generate_url, &request).await?;
        response_data.into_text()
    }
}

impl Embedder for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let request = EmbeddingRequest {
            model: EMBEDDING_MODEL,
            content: EmbeddingContent {
                parts: vec![Part { text }],
            },
        };

        let response_data: EmbeddingResponse =
            self.post(&self.config.embeddings_url, &request).await?;

        Ok(Embedding {
            values: response_data.embedding.values,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for request in batch_requests(texts) {
            let expected = request.requests.len();
            let response_data: BatchEmbeddingResponse =
                self.post(&self.config.batch_embeddings_url, &request).await?;

            if response_data.embeddings.len() != expected {
                return Err(anyhow!(
                    "Batch embedding returned {} vectors for {} texts",
                    response_data.embeddings.len(),
                    expected
                ));
            }

            embeddings.extend(
                response_data
                    .embeddings
                    .into_iter()
                    .map(|data| Embedding { values: data.values }),
            );
        }

        Ok(embeddings)
    }
}

impl Generator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_text(prompt, 0.2, 0.8, 40, 1024).await
    }
}

/// Split texts into batchEmbedContents requests of at most `EMBED_BATCH_SIZE`
fn batch_requests(texts: &[String]) -> Vec<BatchEmbeddingRequest<'_>> {
    texts
        .chunks(EMBED_BATCH_SIZE)
        .map(|batch| BatchEmbeddingRequest {
            requests: batch
                .iter()
                .map(|text| EmbeddingRequest {
                    model: EMBEDDING_MODEL,
                    content: EmbeddingContent {
                        parts: vec![Part { text }],
                    },
                })
                .collect(),
        })
        .collect()
}

// Request/response structures for the Gemini API

#[derive(Serialize)]
struct EmbeddingContent<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'static str,
    content: EmbeddingContent<'a>,
}

#[derive(Serialize)]
struct BatchEmbeddingRequest<'a> {
    requests: Vec<EmbeddingRequest<'a>>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    embedding: EmbeddingData,
}

#[derive(Deserialize, Debug)]
struct BatchEmbeddingResponse {
    embeddings: Vec<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    values: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    role: &'static str,
}

impl<'a> Content<'a> {
    fn new_with_role(text: &'a str, role: &'static str) -> Self {
        Content {
            parts: vec![Part { text }],
            role,
        }
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Extract the generated text from the first candidate
    fn into_text(self) -> Result<String> {
        self.candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .filter(|text| !text.is_empty())
            .ok_or_else(|| anyhow!("No response generated"))
    }
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: String,
}
