//! Prompt templates for every model call in the pipeline.
//!
//! All builders are pure functions of their inputs, so the same context
//! always produces the same prompt text (and therefore the same cache key).

use std::fmt::Write as _;

use crate::types::{
    ChatHistoryInfo, GenerationContext, InteractionCategory, RecipientInfo, Sender,
};

/// System prompt for the thread summarizer.
pub const SUMMARIZER_SYSTEM_PROMPT: &str = "\
You read the HTML of a chat thread and describe it as JSON.
Output ONLY a JSON object with exactly these fields:
- \"messages\": array of {\"sender\": \"user\" | \"recipient\", \"text\": string, \"timestamp\": string or null}, oldest first
- \"summary\": one or two sentences describing the conversation so far
- \"isNewConversation\": true when the thread has no messages yet
- \"keyTopics\": array of short topic strings
The local user is the person writing the reply; everyone else is the recipient.
If the thread is empty, return an empty messages array and isNewConversation true.";

/// System prompt for search query generation.
pub const QUERY_SYSTEM_PROMPT: &str = "\
You write web search queries. Given a person's name and headline, output a single \
search query that is most likely to find their professional background. \
Output ONLY the query text, without quotes or explanation.";

/// System prompt for classification, listing the allowed labels.
pub fn classifier_system_prompt(categories: &[InteractionCategory]) -> String {
    let mut prompt = String::from(
        "You classify professional chat conversations. \
Answer with exactly one of the following category labels and nothing else:\n",
    );
    for category in categories {
        let _ = writeln!(prompt, "- {category}");
    }
    prompt.push_str("Do not invent new categories. Do not add punctuation or explanation.");
    prompt
}

/// User prompt for classification.
pub fn classifier_user_prompt(
    history: Option<&ChatHistoryInfo>,
    recipient: &RecipientInfo,
) -> String {
    let mut prompt = format!("Recipient: {}\n", recipient.name);
    if let Some(byline) = &recipient.byline {
        let _ = writeln!(prompt, "Recipient headline: {byline}");
    }
    prompt.push('\n');
    match history {
        Some(history) if !history.messages.is_empty() => {
            prompt.push_str("Conversation:\n");
            prompt.push_str(&render_messages(history, false));
        }
        Some(history) if !history.summary.trim().is_empty() => {
            let _ = writeln!(prompt, "Conversation summary: {}", history.summary.trim());
        }
        _ => prompt.push_str("There are no messages yet; this is a new conversation.\n"),
    }
    prompt.push_str("\nWhich category fits this conversation best?");
    prompt
}

/// User prompt for search query generation.
pub fn query_user_prompt(recipient: &RecipientInfo) -> String {
    match &recipient.byline {
        Some(byline) => format!("Name: {}\nHeadline: {byline}", recipient.name),
        None => format!("Name: {}", recipient.name),
    }
}

/// Query used when the model cannot produce one.
pub fn fallback_search_query(recipient: &RecipientInfo) -> String {
    match recipient.byline.as_deref().map(str::trim) {
        Some(byline) if !byline.is_empty() => format!("{} - {byline}", recipient.name),
        _ => recipient.name.clone(),
    }
}

/// System prompt for draft generation.
pub fn generation_system_prompt(context: &GenerationContext) -> String {
    let prefs = context.preferences();
    let mut prompt = String::from(
        "You write replies for a professional messaging inbox on behalf of the user.\n\
Rules:\n\
- Output only the message body, ready to send as a chat message.\n\
- No subject line, no email headers, no signature block.\n\
- Never use bracketed placeholders such as [Name] or [Company]; write concrete text or leave the detail out.\n\
- Respond directly to the content of the most recent message from the recipient.\n",
    );
    let _ = writeln!(prompt, "- Tone: {}.", prefs.tone.label());
    let _ = writeln!(prompt, "- Length: {}.", prefs.length.label());
    let _ = writeln!(prompt, "- Formality: {}.", prefs.formality_level.label());
    let _ = writeln!(prompt, "- Greeting: {}.", prefs.greeting_style.label());
    let _ = writeln!(prompt, "- Closing: {}.", prefs.closing_style.label());
    let custom = prefs.custom_instructions.trim();
    if !custom.is_empty() {
        let _ = writeln!(prompt, "- Additional instructions from the user: {custom}");
    }
    prompt
}

/// User prompt for draft generation.
pub fn generation_user_prompt(context: &GenerationContext) -> String {
    let recipient = context.recipient();
    let mut prompt = String::new();

    let display_name = context.display_name().trim();
    if !display_name.is_empty() {
        let _ = writeln!(prompt, "I am {display_name}.");
    }
    let _ = writeln!(prompt, "I am replying to {}.", recipient.name);
    if let Some(byline) = &recipient.byline {
        let _ = writeln!(prompt, "Their headline: {byline}");
    }
    if let Some(category) = context.category() {
        let _ = writeln!(prompt, "Conversation type: {category}");
    }
    prompt.push('\n');

    match context.chat_history() {
        Some(history) if !history.messages.is_empty() => {
            prompt.push_str("Full conversation so far (oldest first):\n");
            prompt.push_str(&render_messages(history, true));
            if let Some(inbound) = history.last_inbound() {
                let _ = writeln!(
                    prompt,
                    "\nTheir latest message, which I am answering: \"{}\"",
                    inbound.text.trim()
                );
            }
            if !history.summary.trim().is_empty() {
                let _ = writeln!(prompt, "\nSummary: {}", history.summary.trim());
            }
            if !history.key_topics.is_empty() {
                let _ = writeln!(prompt, "Key topics: {}", history.key_topics.join(", "));
            }
        }
        _ => {
            let _ = writeln!(
                prompt,
                "There are no previous messages. Write a first message to {}.",
                recipient.name
            );
        }
    }

    if let Some(findings) = context.research().and_then(|r| r.findings()) {
        let _ = writeln!(
            prompt,
            "\nBackground research found {} web results for \"{}\".",
            findings.search_results.items.len(),
            findings.search_term
        );
    }

    prompt.push_str("\nWrite the reply now.");
    prompt
}

/// Render messages one per line, optionally flagging the last one.
fn render_messages(history: &ChatHistoryInfo, flag_last: bool) -> String {
    let mut out = String::new();
    let last = history.messages.len().saturating_sub(1);
    for (i, message) in history.messages.iter().enumerate() {
        let who = match message.sender {
            Sender::User => "Me",
            Sender::Recipient => "Them",
        };
        let when = message
            .timestamp
            .as_deref()
            .map(|t| format!(" ({t})"))
            .unwrap_or_default();
        if flag_last && i == last {
            let _ = writeln!(
                out,
                ">>> MOST RECENT MESSAGE, MOST IMPORTANT <<< {who}{when}: {}",
                message.text
            );
        } else {
            let _ = writeln!(out, "{who}{when}: {}", message.text);
        }
    }
    out
}
