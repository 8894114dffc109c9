//! Semantic completion cache.
//!
//! Lookup order for a request:
//! 1. exact match on the request hash (see [`cache_key`])
//! 2. when an embedder is attached, the stored entry whose prompt embedding
//!    is most similar to this one, if at or above the threshold
//! 3. the upstream provider, whose answer is then stored
//!
//! Entries live in a capped list in the key-value store, newest first.
//! When the list grows past capacity the oldest entries by timestamp are
//! dropped. Embedding failures only disable step 2 for that request, and a
//! failed write after a successful upstream call is logged, not returned.

pub mod relay;
pub mod similarity;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::providers::embedder::Embedder;
use crate::providers::{CompletionRequest, LlmProvider, ProviderError};
use crate::storage::{load_typed, save_typed, KeyValueStore, StorageError, CACHE_ENTRIES_KEY};

pub use similarity::cosine_similarity;

/// Maximum number of cached entries.
pub const MAX_CACHE_ENTRIES: usize = 1000;

/// Minimum cosine similarity for a semantic hit.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Errors from the cache layer.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Reading or writing the entry list failed.
    #[error("cache storage: {0}")]
    Storage(#[from] StorageError),
    /// The upstream completion call failed on a miss.
    #[error("cache upstream: {0}")]
    Upstream(#[from] ProviderError),
    /// Hashing the request failed.
    #[error("cache key: {0}")]
    Key(String),
}

/// Parameters recorded alongside a cached response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    /// When the entry was stored.
    pub timestamp: DateTime<Utc>,
    /// Model that produced the response.
    pub model: String,
    /// Sampling temperature of the request.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Token ceiling of the request.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// One cached prompt/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request hash.
    pub key: String,
    /// User prompt text.
    pub prompt: String,
    /// Model response text.
    pub response: String,
    /// Prompt embedding, when one could be computed.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// Request parameters and timestamp.
    pub metadata: CacheMetadata,
}

/// Answer returned through the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedCompletion {
    /// Completion text.
    pub text: String,
    /// True when no fresh generation was needed.
    pub cached: bool,
    /// Similarity score for semantic hits.
    pub similarity: Option<f64>,
}

/// Summary of the stored entry list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of entries.
    pub entries: usize,
    /// Entries that carry an embedding.
    pub with_embedding: usize,
    /// Oldest entry timestamp.
    pub oldest: Option<DateTime<Utc>>,
    /// Newest entry timestamp.
    pub newest: Option<DateTime<Utc>>,
}

/// Deterministic hash of a request: lowercase hex SHA-256 over the JSON
/// encoding of `(prompt, model, temperature, max_tokens, system_prompt)`.
///
/// # Errors
///
/// Returns [`CacheError::Key`] if the tuple cannot be encoded.
pub fn cache_key(
    prompt: &str,
    model: &str,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    system_prompt: Option<&str>,
) -> Result<String, CacheError> {
    let encoded = serde_json::to_vec(&(prompt, model, temperature, max_tokens, system_prompt))
        .map_err(|e| CacheError::Key(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(&encoded)))
}

// ---------------------------------------------------------------------------
// Entry list
// ---------------------------------------------------------------------------

/// Capped entry list stored under [`CACHE_ENTRIES_KEY`].
#[derive(Clone)]
pub struct CacheStore {
    store: Arc<dyn KeyValueStore>,
    capacity: usize,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Entry list with the default cap.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_capacity(store, MAX_CACHE_ENTRIES)
    }

    /// Entry list with a custom cap.
    pub fn with_capacity(store: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        Self { store, capacity }
    }

    /// Stored entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] on read or shape failure.
    pub fn entries(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let entries: Option<Vec<CacheEntry>> = load_typed(self.store.as_ref(), CACHE_ENTRIES_KEY)?;
        Ok(entries.unwrap_or_default())
    }

    /// Entry with exactly this key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] on read failure.
    pub fn find(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries()?.into_iter().find(|e| e.key == key))
    }

    /// Stored entry most similar to `embedding`, if any scores at or above
    /// `threshold`. The first of several equally high scores wins.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] on read failure.
    pub fn nearest(
        &self,
        embedding: &[f32],
        threshold: f64,
    ) -> Result<Option<(CacheEntry, f64)>, CacheError> {
        let mut best: Option<(CacheEntry, f64)> = None;
        for entry in self.entries()? {
            let Some(stored) = entry.embedding.as_deref() else {
                continue;
            };
            let score = cosine_similarity(embedding, stored);
            let beats = best.as_ref().map_or(true, |(_, top)| score > *top);
            if score >= threshold && beats {
                best = Some((entry, score));
            }
        }
        Ok(best)
    }

    /// Add an entry, then drop the oldest entries past capacity.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] on read or write failure.
    pub fn insert(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let mut entries = self.entries()?;
        entries.retain(|e| e.key != entry.key);
        entries.insert(0, entry);
        entries.sort_by(|a, b| b.metadata.timestamp.cmp(&a.metadata.timestamp));
        if entries.len() > self.capacity {
            let evicted = entries.len().saturating_sub(self.capacity);
            entries.truncate(self.capacity);
            debug!(evicted, "evicted oldest cache entries");
        }
        save_typed(self.store.as_ref(), CACHE_ENTRIES_KEY, &entries)?;
        Ok(())
    }

    /// Summary counts and time range.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] on read failure.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let entries = self.entries()?;
        Ok(CacheStats {
            entries: entries.len(),
            with_embedding: entries.iter().filter(|e| e.embedding.is_some()).count(),
            oldest: entries.iter().map(|e| e.metadata.timestamp).min(),
            newest: entries.iter().map(|e| e.metadata.timestamp).max(),
        })
    }

    /// Remove every entry.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Storage`] on write failure.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.store.remove(CACHE_ENTRIES_KEY)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cache-fronted completion
// ---------------------------------------------------------------------------

/// Completion provider fronted by the entry list.
#[derive(Clone)]
pub struct SemanticCache {
    entries: CacheStore,
    upstream: Arc<dyn LlmProvider>,
    embedder: Option<Arc<dyn Embedder>>,
    threshold: f64,
}

impl std::fmt::Debug for SemanticCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticCache")
            .field("entries", &self.entries)
            .field("model", &self.upstream.model_id())
            .field("semantic", &self.embedder.is_some())
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl SemanticCache {
    /// Exact-match cache in front of `upstream`.
    pub fn new(entries: CacheStore, upstream: Arc<dyn LlmProvider>) -> Self {
        Self {
            entries,
            upstream,
            embedder: None,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Enable the semantic path.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Override the similarity threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// The underlying entry list.
    pub fn entries(&self) -> &CacheStore {
        &self.entries
    }

    /// Answer `request` from the cache, or from upstream on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the entry list cannot be read or the
    /// upstream call fails.
    pub async fn cached_completion(
        &self,
        request: &CompletionRequest,
    ) -> Result<CachedCompletion, CacheError> {
        let prompt = request.user_text();
        let model = self.upstream.model_id().to_owned();
        let key = cache_key(
            &prompt,
            &model,
            request.temperature,
            request.max_tokens,
            request.system.as_deref(),
        )?;

        if let Some(hit) = self.entries.find(&key)? {
            info!(key = %short(&key), "exact cache hit");
            return Ok(CachedCompletion {
                text: hit.response,
                cached: true,
                similarity: None,
            });
        }

        let embedding = match &self.embedder {
            Some(embedder) => match embedder.embed(&prompt).await {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(error = %e, "prompt embedding failed, skipping semantic lookup");
                    None
                }
            },
            None => None,
        };

        if let Some(vector) = embedding.as_deref() {
            if let Some((hit, score)) = self.entries.nearest(vector, self.threshold)? {
                info!(similarity = score, "semantic cache hit");
                return Ok(CachedCompletion {
                    text: hit.response,
                    cached: true,
                    similarity: Some(score),
                });
            }
        }

        debug!(key = %short(&key), "cache miss");
        let response = self.upstream.complete(request.clone()).await?;

        if !response.text.trim().is_empty() {
            let entry = CacheEntry {
                key,
                prompt,
                response: response.text.clone(),
                embedding,
                metadata: CacheMetadata {
                    timestamp: Utc::now(),
                    model: response.model.clone(),
                    temperature: request.temperature,
                    max_tokens: request.max_tokens,
                },
            };
            if let Err(e) = self.entries.insert(entry) {
                warn!(error = %e, "failed to store cache entry");
            }
        }

        Ok(CachedCompletion {
            text: response.text,
            cached: response.cached,
            similarity: None,
        })
    }
}

fn short(key: &str) -> &str {
    key.get(..12).unwrap_or(key)
}
