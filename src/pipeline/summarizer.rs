//! Thread summarizer: chat container markup in, [`ChatHistoryInfo`] out.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use super::prompts::SUMMARIZER_SYSTEM_PROMPT;
use crate::dom::{HostPage, NodeId};
use crate::providers::{truncate_chars, CompletionRequest, LlmProvider};
use crate::types::ChatHistoryInfo;

/// Character budget for the markup sent to the model.
pub const MAX_MARKUP_CHARS: usize = 10_000;

const SUMMARY_MAX_TOKENS: u32 = 1500;
const SUMMARY_TEMPERATURE: f32 = 0.2;

static SCRIPT_OR_STYLE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>").ok()
});

/// Container markup with script and style blocks removed, cut to
/// [`MAX_MARKUP_CHARS`].
pub fn prepare_markup(markup: &str) -> String {
    let stripped = match SCRIPT_OR_STYLE.as_ref() {
        Some(re) => re.replace_all(markup, "").into_owned(),
        None => markup.to_owned(),
    };
    truncate_chars(&stripped, MAX_MARKUP_CHARS).to_owned()
}

/// Parse the model's answer, tolerating prose or code fences around the
/// JSON object.
pub fn parse_summary(text: &str) -> Option<ChatHistoryInfo> {
    let trimmed = text.trim();
    let json_text = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => trimmed.get(start..=end).unwrap_or(trimmed),
        _ => trimmed,
    };
    match serde_json::from_str(json_text) {
        Ok(info) => Some(info),
        Err(e) => {
            warn!(
                error = %e,
                preview = truncate_chars(trimmed, 200),
                "summary response is not valid JSON"
            );
            None
        }
    }
}

/// Summarize the thread held in `container`.
///
/// Returns `None` on any failure (unreadable node, transport error, non-2xx,
/// malformed JSON); the pipeline then carries on without thread context.
pub async fn extract_chat_history_info(
    provider: &dyn LlmProvider,
    page: &dyn HostPage,
    container: NodeId,
) -> Option<ChatHistoryInfo> {
    let markup = match page.outer_html(container) {
        Ok(html) => prepare_markup(&html),
        Err(e) => {
            warn!(error = %e, "chat container unreadable");
            return None;
        }
    };
    debug!(chars = markup.chars().count(), "summarizing thread");

    let request = CompletionRequest::single_turn(SUMMARIZER_SYSTEM_PROMPT, markup)
        .with_max_tokens(SUMMARY_MAX_TOKENS)
        .with_temperature(SUMMARY_TEMPERATURE)
        .json_object();

    let response = match provider.complete(request).await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "summarizer call failed");
            return None;
        }
    };

    let info = parse_summary(&response.text)?;
    debug!(
        messages = info.messages.len(),
        new = info.is_new_conversation,
        "thread summarized"
    );
    Some(info)
}
