//! Embedding generation trait and OpenAI-compatible implementation.
//!
//! The [`Embedder`] trait abstracts over embedding providers. The semantic
//! cache uses it to place prompts in vector space; [`OpenAiEmbedder`] calls
//! `POST {base_url}/embeddings`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::check_http_response;
use super::openai::OPENAI_API_BASE;

/// Core embedding generation interface.
///
/// All implementations must be `Send + Sync` to allow shared use across
/// async task boundaries.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding vector for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedding provider is unreachable or the
    /// request fails.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError>;

    /// Embedding model identifier.
    fn model_id(&self) -> &str;
}

/// Errors from embedding generation.
#[derive(Debug, thiserror::Error)]
pub enum EmbedderError {
    /// HTTP transport failure.
    #[error("embedder request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Response did not match expected format.
    #[error("embedder response parse error: {0}")]
    Parse(String),

    /// Provider is unavailable.
    #[error("embedder unavailable: {0}")]
    Unavailable(String),
}

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// OpenAI-compatible embedder using the `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    model: String,
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiEmbedder {
    /// Create an embedder against the hosted OpenAI API.
    pub fn new(model: &str, api_key: &str) -> Self {
        Self::with_base_url(model, api_key, OPENAI_API_BASE)
    }

    /// Create an embedder with a custom API root.
    pub fn with_base_url(model: &str, api_key: &str, base_url: &str) -> Self {
        Self {
            model: model.to_owned(),
            api_key: api_key.to_owned(),
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = EmbedRequest {
            model: self.model.clone(),
            input: text.to_owned(),
        };

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let payload = check_http_response(response)
            .await
            .map_err(|e| EmbedderError::Unavailable(e.to_string()))?;

        parse_embedding(&payload)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Pull the first embedding vector out of an `/embeddings` response body.
///
/// # Errors
///
/// Returns [`EmbedderError::Parse`] when the body is malformed or empty.
pub fn parse_embedding(body: &str) -> Result<Vec<f32>, EmbedderError> {
    let parsed: EmbedResponse =
        serde_json::from_str(body).map_err(|e| EmbedderError::Parse(e.to_string()))?;

    parsed
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| EmbedderError::Parse("empty embedding data".to_owned()))
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Request body for `/embeddings`.
#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: String,
}

/// Response body from `/embeddings`.
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
}
