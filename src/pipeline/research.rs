//! Optional web research on the recipient.

use tracing::{debug, info, warn};

use super::prompts::{fallback_search_query, query_user_prompt, QUERY_SYSTEM_PROMPT};
use crate::providers::search::WebSearch;
use crate::providers::{CompletionRequest, LlmProvider};
use crate::types::{RecipientInfo, ResearchFindings, ResearchOutcome};

const QUERY_MAX_TOKENS: u32 = 60;
const QUERY_TEMPERATURE: f32 = 0.3;
const MAX_QUERY_CHARS: usize = 200;

/// Search query for the recipient, model-written when possible.
pub async fn derive_search_query(
    provider: Option<&dyn LlmProvider>,
    recipient: &RecipientInfo,
) -> String {
    let Some(provider) = provider else {
        return fallback_search_query(recipient);
    };

    let request = CompletionRequest::single_turn(QUERY_SYSTEM_PROMPT, query_user_prompt(recipient))
        .with_max_tokens(QUERY_MAX_TOKENS)
        .with_temperature(QUERY_TEMPERATURE);

    match provider.complete(request).await {
        Ok(response) => {
            let query = response
                .text
                .lines()
                .next()
                .unwrap_or_default()
                .trim()
                .trim_matches('"')
                .trim()
                .to_owned();
            if query.is_empty() || query.chars().count() > MAX_QUERY_CHARS {
                debug!("unusable model query, using fallback");
                fallback_search_query(recipient)
            } else {
                query
            }
        }
        Err(e) => {
            warn!(error = %e, "query generation failed, using fallback");
            fallback_search_query(recipient)
        }
    }
}

/// Research the recipient. Never fails: problems come back as
/// [`ResearchOutcome::Unavailable`].
pub async fn research_recipient(
    provider: Option<&dyn LlmProvider>,
    search: Option<&dyn WebSearch>,
    recipient: &RecipientInfo,
) -> ResearchOutcome {
    let Some(search) = search else {
        debug!("search credentials missing, skipping research");
        return ResearchOutcome::Unavailable {
            error: "search API key and engine id are not configured".to_owned(),
        };
    };

    let search_term = derive_search_query(provider, recipient).await;
    match search.search(&search_term).await {
        Ok(search_results) => {
            info!(
                query = %search_term,
                results = search_results.items.len(),
                "recipient research complete"
            );
            ResearchOutcome::Found(ResearchFindings {
                search_term,
                search_results,
            })
        }
        Err(e) => {
            warn!(error = %e, "recipient search failed");
            ResearchOutcome::Unavailable {
                error: e.to_string(),
            }
        }
    }
}
