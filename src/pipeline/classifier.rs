//! Interaction classifier.
//!
//! Always yields a category. Without a completion provider it returns
//! [`DEFAULT_CATEGORY`](crate::types::DEFAULT_CATEGORY) immediately; a
//! failed call does the same. A label the model invents is mapped onto the
//! configured list: exact (case-insensitive) match, then substring
//! containment either way, then the first configured category.

use tracing::{debug, info, warn};

use super::prompts::{classifier_system_prompt, classifier_user_prompt};
use crate::providers::{CompletionRequest, LlmProvider};
use crate::types::{ChatHistoryInfo, InteractionCategory, RecipientInfo};

const CLASSIFY_MAX_TOKENS: u32 = 20;
const CLASSIFY_TEMPERATURE: f32 = 0.0;

/// Map a model answer onto `categories`.
pub fn match_category(answer: &str, categories: &[InteractionCategory]) -> InteractionCategory {
    let cleaned = answer
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '`')
        .trim()
        .to_lowercase();

    if let Some(exact) = categories
        .iter()
        .find(|c| c.as_str().to_lowercase() == cleaned)
    {
        return exact.clone();
    }

    if !cleaned.is_empty() {
        if let Some(partial) = categories.iter().find(|c| {
            let label = c.as_str().to_lowercase();
            cleaned.contains(&label) || label.contains(&cleaned)
        }) {
            debug!(answer, category = %partial, "category matched by substring");
            return partial.clone();
        }
    }

    let first = categories
        .first()
        .cloned()
        .unwrap_or_else(InteractionCategory::fallback);
    debug!(answer, category = %first, "unrecognized category, using first");
    first
}

/// Classify the conversation into one of `categories`.
pub async fn categorize_interaction(
    provider: Option<&dyn LlmProvider>,
    history: Option<&ChatHistoryInfo>,
    recipient: &RecipientInfo,
    categories: &[InteractionCategory],
) -> InteractionCategory {
    let Some(provider) = provider else {
        debug!("no completion provider, using default category");
        return InteractionCategory::fallback();
    };

    let request = CompletionRequest::single_turn(
        classifier_system_prompt(categories),
        classifier_user_prompt(history, recipient),
    )
    .with_max_tokens(CLASSIFY_MAX_TOKENS)
    .with_temperature(CLASSIFY_TEMPERATURE);

    match provider.complete(request).await {
        Ok(response) => {
            let category = match_category(&response.text, categories);
            info!(category = %category, "interaction classified");
            category
        }
        Err(e) => {
            warn!(error = %e, "classification failed, using default category");
            InteractionCategory::fallback()
        }
    }
}
