//! Thread summarization.

use replysmith::dom::SnapshotPage;
use replysmith::extractors::extract_chat_container;
use replysmith::pipeline::extract_chat_history_info;
use replysmith::providers::ResponseFormat;
use replysmith::types::Sender;

use crate::support::{conversation_page, ScriptedProvider, THREAD_SUMMARY_JSON};

fn page() -> SnapshotPage {
    SnapshotPage::new(
        "https://www.linkedin.com/messaging/",
        conversation_page("Jane Doe"),
    )
}

#[tokio::test]
async fn summary_json_becomes_chat_history() {
    let page = page();
    let container = extract_chat_container(&page, None).expect("container");
    let provider = ScriptedProvider::fixed(THREAD_SUMMARY_JSON);

    let info = extract_chat_history_info(&provider, &page, container)
        .await
        .expect("summary");
    assert_eq!(info.messages.len(), 3);
    assert_eq!(info.messages[1].sender, Sender::User);
    assert!(!info.is_new_conversation);
    assert_eq!(info.key_topics.len(), 2);
    assert_eq!(
        info.last_inbound().map(|m| m.text.as_str()),
        Some("Fully remote, platform team. Free for a call Thursday?")
    );

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].response_format, Some(ResponseFormat::JsonObject));
    assert!(requests[0].user_text().contains("senior Rust role"));
}

#[tokio::test]
async fn fenced_answer_is_accepted() {
    let page = page();
    let container = extract_chat_container(&page, None).expect("container");
    let provider = ScriptedProvider::fixed(&format!("```json\n{THREAD_SUMMARY_JSON}\n```"));

    assert!(extract_chat_history_info(&provider, &page, container)
        .await
        .is_some());
}

#[tokio::test]
async fn malformed_answer_yields_none() {
    let page = page();
    let container = extract_chat_container(&page, None).expect("container");
    let provider = ScriptedProvider::fixed("Sorry, I cannot help with that.");

    assert_eq!(extract_chat_history_info(&provider, &page, container).await, None);
}

#[tokio::test]
async fn provider_failure_yields_none() {
    let page = page();
    let container = extract_chat_container(&page, None).expect("container");
    let provider = ScriptedProvider::failing();

    assert_eq!(extract_chat_history_info(&provider, &page, container).await, None);
}

#[tokio::test]
async fn detached_container_yields_none_without_calling_model() {
    let page = page();
    let container = extract_chat_container(&page, None).expect("container");
    page.replace_document("<html><body></body></html>").expect("replace");
    let provider = ScriptedProvider::fixed(THREAD_SUMMARY_JSON);

    assert_eq!(extract_chat_history_info(&provider, &page, container).await, None);
    assert_eq!(provider.calls(), 0);
}
