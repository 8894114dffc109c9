//! Model-backed pipeline stages: summarize, research, classify, generate.
//!
//! Stages only absorb their own failures (summarizer, research and
//! classifier never return errors). Generation is the one stage whose
//! failure reaches the orchestrator.

pub mod classifier;
pub mod generator;
pub mod prompts;
pub mod research;
pub mod summarizer;

use std::sync::Arc;

use tracing::info;

use crate::cache::relay::{CacheRelay, RelayEndpoint, RelayProvider};
use crate::cache::{CacheStore, SemanticCache};
use crate::config::AppConfig;
use crate::credentials::Credentials;
use crate::providers::embedder::OpenAiEmbedder;
use crate::providers::openai::OpenAiProvider;
use crate::providers::search::{GoogleSearch, WebSearch};
use crate::providers::LlmProvider;
use crate::storage::KeyValueStore;

pub use classifier::categorize_interaction;
pub use generator::{generate_message_draft, Draft, GenerationError};
pub use research::research_recipient;
pub use summarizer::extract_chat_history_info;

/// Default token ceiling for drafts.
pub const DEFAULT_DRAFT_MAX_TOKENS: u32 = 500;
/// Default sampling temperature for drafts.
pub const DEFAULT_DRAFT_TEMPERATURE: f32 = 0.7;

/// Sampling parameters for draft generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Token ceiling.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_DRAFT_MAX_TOKENS,
            temperature: DEFAULT_DRAFT_TEMPERATURE,
        }
    }
}

/// External services available to a pipeline run. Absent entries mean the
/// matching credentials were not configured.
#[derive(Clone, Default)]
pub struct Backends {
    /// Direct completion provider.
    pub completion: Option<Arc<dyn LlmProvider>>,
    /// Web search client.
    pub search: Option<Arc<dyn WebSearch>>,
    /// Cache-fronted completion path.
    pub cache: Option<SemanticCache>,
    /// Draft sampling parameters.
    pub generation: GenerationParams,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field(
                "completion",
                &self.completion.as_ref().map(|p| p.model_id().to_owned()),
            )
            .field("search", &self.search.is_some())
            .field("cache", &self.cache)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Backends {
    /// Build every backend the credentials allow. Called once at startup.
    ///
    /// # Errors
    ///
    /// Returns an error when the cache endpoint template is invalid.
    pub fn from_config(
        config: &AppConfig,
        credentials: &Credentials,
        store: Arc<dyn KeyValueStore>,
    ) -> anyhow::Result<Self> {
        let completion = credentials.completion_key().map(|key| {
            Arc::new(OpenAiProvider::with_base_url(
                config.llm.model.clone(),
                key.to_owned(),
                config.llm.base_url.clone(),
            )) as Arc<dyn LlmProvider>
        });

        let search = if config.search.enabled {
            credentials.search_pair().map(|(key, engine_id)| {
                Arc::new(GoogleSearch::with_endpoint(
                    key.to_owned(),
                    engine_id.to_owned(),
                    config.search.endpoint.clone(),
                )) as Arc<dyn WebSearch>
            })
        } else {
            None
        };

        let cache = match (
            config.cache.enabled,
            credentials.cache_pair(),
            credentials.completion_key(),
        ) {
            (true, Some((cache_key, cache_id)), Some(provider_key)) => {
                let endpoint = RelayEndpoint::parse(&config.cache.endpoint_template)?;
                let relay =
                    CacheRelay::spawn_with_timeout(reqwest::Client::new(), config.cache.reply_timeout());
                let upstream = RelayProvider::new(
                    relay,
                    endpoint,
                    cache_key.to_owned(),
                    cache_id.to_owned(),
                    provider_key.to_owned(),
                    config.llm.model.clone(),
                )?;
                let entries = CacheStore::with_capacity(store, config.cache.max_entries);
                let mut cache = SemanticCache::new(entries, Arc::new(upstream))
                    .with_threshold(config.cache.similarity_threshold);
                if config.cache.semantic {
                    cache = cache.with_embedder(Arc::new(OpenAiEmbedder::with_base_url(
                        &config.llm.embedding_model,
                        provider_key,
                        &config.llm.base_url,
                    )));
                }
                Some(cache)
            }
            _ => None,
        };

        let backends = Self {
            completion,
            search,
            cache,
            generation: GenerationParams {
                max_tokens: config.llm.max_tokens,
                temperature: config.llm.temperature,
            },
        };
        info!(backends = ?backends, "backends configured");
        Ok(backends)
    }

    /// Direct provider as a trait object reference.
    pub fn completion(&self) -> Option<&dyn LlmProvider> {
        self.completion.as_deref()
    }

    /// Search client as a trait object reference.
    pub fn search(&self) -> Option<&dyn WebSearch> {
        self.search.as_deref()
    }
}
