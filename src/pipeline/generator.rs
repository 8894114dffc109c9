//! Draft generation, cache first with a direct fallback.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use super::prompts::{generation_system_prompt, generation_user_prompt};
use super::Backends;
use crate::providers::CompletionRequest;
use crate::types::GenerationContext;

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\[[A-Z][A-Za-z ]{0,30}\]").ok());

/// Why no draft could be produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Neither a cache nor a direct provider is configured.
    #[error("no completion provider configured")]
    NoProvider,
    /// The model answered with nothing.
    #[error("the model returned an empty draft")]
    Empty,
    /// Every configured path failed.
    #[error("generation failed: {0}")]
    Failed(String),
}

/// A generated draft.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    /// Message text.
    pub text: String,
    /// Served from the cache.
    pub cached: bool,
}

/// Request the generator sends for `context`.
pub fn build_generation_request(backends: &Backends, context: &GenerationContext) -> CompletionRequest {
    CompletionRequest::single_turn(
        generation_system_prompt(context),
        generation_user_prompt(context),
    )
    .with_max_tokens(backends.generation.max_tokens)
    .with_temperature(backends.generation.temperature)
}

/// Trim the model's answer and drop quotes wrapped around the whole text.
pub fn clean_draft(text: &str) -> String {
    let trimmed = text.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted.trim().to_owned()
}

/// Generate a draft for `context`.
///
/// # Errors
///
/// Returns [`GenerationError`] when both the cache path and the direct path
/// fail, or the model returns an empty completion. Cache failures on their
/// own are logged and never returned.
pub async fn generate_message_draft(
    backends: &Backends,
    context: &GenerationContext,
) -> Result<Draft, GenerationError> {
    let request = build_generation_request(backends, context);
    let mut cache_failure = None;

    if let Some(cache) = &backends.cache {
        match cache.cached_completion(&request).await {
            Ok(completion) => {
                let text = clean_draft(&completion.text);
                if !text.is_empty() {
                    info!(
                        cached = completion.cached,
                        similarity = completion.similarity,
                        "draft generated through cache"
                    );
                    return Ok(checked(Draft {
                        text,
                        cached: completion.cached,
                    }));
                }
                warn!("cache path returned an empty draft, trying direct call");
                cache_failure = Some("empty completion from cache path".to_owned());
            }
            Err(e) => {
                warn!(error = %e, "cache path failed, trying direct call");
                cache_failure = Some(e.to_string());
            }
        }
    }

    let Some(provider) = &backends.completion else {
        return Err(match cache_failure {
            Some(reason) => GenerationError::Failed(reason),
            None => GenerationError::NoProvider,
        });
    };

    let response = provider.complete(request).await.map_err(|e| {
        let reason = match &cache_failure {
            Some(cache) => format!("cache: {cache}; direct: {e}"),
            None => e.to_string(),
        };
        GenerationError::Failed(reason)
    })?;

    let text = clean_draft(&response.text);
    if text.is_empty() {
        return Err(GenerationError::Empty);
    }
    info!(model = %response.model, "draft generated");
    Ok(checked(Draft {
        text,
        cached: false,
    }))
}

fn checked(draft: Draft) -> Draft {
    if PLACEHOLDER
        .as_ref()
        .is_some_and(|re| re.is_match(&draft.text))
    {
        warn!("draft contains a bracketed placeholder");
    }
    draft
}
