//! Complete field runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use replysmith::config::RunConfig;
use replysmith::dom::HostPage;
use replysmith::orchestrator::FieldState;
use replysmith::pipeline::Backends;
use replysmith::types::{InteractionCategory, PreferenceSet};

use crate::support::{conversation_page, ScriptedProvider};
use crate::{harness, harness_with};

fn run_config(display_name: &str) -> RunConfig {
    RunConfig {
        display_name: display_name.to_owned(),
        ..RunConfig::fallback()
    }
}

#[tokio::test]
async fn draft_is_generated_and_inserted() {
    let h = harness(&conversation_page("Jane Doe"), run_config("Alex Kim"));

    let reports = h.orchestrator.scan().await;
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.state, FieldState::Inserted);
    assert_eq!(report.recipient.as_ref().map(|r| r.name.as_str()), Some("Jane Doe"));
    assert_eq!(report.category.as_ref().map(InteractionCategory::as_str), Some("Networking"));
    assert!(report.error.is_none());

    let written = h.page.text(report.field).expect("field text");
    assert!(written.contains("Thursday afternoon works well for me."));
    assert_eq!(h.page.input_event_count(report.field), 3);

    let generate = h
        .provider
        .requests()
        .into_iter()
        .last()
        .expect("generation request");
    assert!(generate.user_text().contains("I am Alex Kim."));

    let entries = h.history.entries().expect("history");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].context.recipient.name, "Jane Doe");
    assert_eq!(entries[0].context.category, "Networking");
    assert!(entries[0].context.chat_summary.is_some());
    assert_eq!(
        entries[0].context.page_url.as_deref(),
        Some("https://www.linkedin.com/messaging/thread/42/")
    );
}

#[tokio::test]
async fn processed_field_is_not_run_again() {
    let h = harness(&conversation_page("Jane Doe"), run_config(""));

    assert_eq!(h.orchestrator.scan().await.len(), 1);
    let calls = h.provider.calls();
    assert!(h.orchestrator.scan().await.is_empty());
    assert_eq!(h.provider.calls(), calls);

    let field = h.page.query_all("[role='textbox']").expect("query")[0];
    assert!(h.orchestrator.process_field(field).await.is_none());
    let record = h.orchestrator.registry().record(field).expect("record");
    assert_eq!(record.state, FieldState::Inserted);
}

#[tokio::test]
async fn preview_preference_holds_the_draft() {
    let mut preferences = BTreeMap::new();
    preferences.insert(
        InteractionCategory::new("Networking").key(),
        PreferenceSet {
            preview_before_insert: true,
            ..PreferenceSet::default()
        },
    );
    let run = RunConfig {
        preferences,
        ..RunConfig::fallback()
    };
    let h = harness(&conversation_page("Jane Doe"), run);

    let reports = h.orchestrator.scan().await;
    assert_eq!(reports[0].state, FieldState::Held);
    assert!(reports[0].draft.is_some());
    assert_eq!(h.page.text(reports[0].field).expect("text").trim(), "");
    assert_eq!(h.history.entries().expect("history").len(), 1);
}

#[tokio::test]
async fn generation_failure_writes_inline_error() {
    let provider = Arc::new(ScriptedProvider::failing());
    let h = harness_with(
        &conversation_page("Jane Doe"),
        RunConfig::fallback(),
        Backends::default(),
        provider,
    );

    let reports = h.orchestrator.scan().await;
    let report = &reports[0];
    assert_eq!(report.state, FieldState::Failed);
    assert_eq!(
        report.error.as_deref(),
        Some("no completion provider configured")
    );
    assert_eq!(
        h.page.text(report.field).expect("text").trim(),
        "[Draft unavailable: no completion provider configured]"
    );
    assert!(h.history.entries().expect("history").is_empty());
}

#[tokio::test]
async fn hidden_or_filled_fields_are_skipped() {
    let hidden = r#"<html><body>
      <h2 class="msg-overlay-bubble-header__title">Jane Doe</h2>
      <form style="display:none">
        <div contenteditable="true" role="textbox"></div>
        <button type="submit">Send</button>
      </form>
      <form>
        <div contenteditable="true" role="textbox"><p>Already typing</p></div>
        <button type="submit">Send</button>
      </form>
    </body></html>"#;
    let h = harness(hidden, RunConfig::fallback());

    assert!(h.orchestrator.scan().await.is_empty());
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn every_open_conversation_gets_a_run() {
    let bubble = |id: &str| {
        format!(
            r#"<div class="msg-overlay-conversation-bubble" data-conversation-id="{id}">
              <h2 class="msg-overlay-bubble-header__title">Jane Doe</h2>
              <ul class="msg-s-message-list"><li>hello {id}</li></ul>
              <form><div contenteditable="true" role="textbox"></div>
                <button type="submit">Send</button></form>
            </div>"#
        )
    };
    let html = format!("<html><body>{}{}</body></html>", bubble("a"), bubble("b"));
    let h = harness(&html, RunConfig::fallback());

    let reports = h.orchestrator.scan().await;
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.state == FieldState::Inserted));
    assert_ne!(reports[0].field, reports[1].field);
    assert_eq!(h.history.entries().expect("history").len(), 2);
}

#[tokio::test]
async fn new_conversation_with_default_preferences_inserts_once() {
    let html = r#"<html><body>
<div class="msg-overlay-conversation-bubble">
  <div class="msg-overlay-bubble-header">
    <h2 class="msg-overlay-bubble-header__title">Jane Doe</h2>
  </div>
  <div class="msg-overlay-conversation-bubble__content-wrapper">
    <ul class="msg-s-message-list"></ul>
  </div>
  <form class="msg-form">
    <div class="msg-form__contenteditable" contenteditable="true" role="textbox"><p><br></p></div>
    <button class="msg-form__send-button" type="submit">Send</button>
  </form>
</div>
</body></html>"#;
    let draft = "Hi Jane, great to connect!";
    let provider = Arc::new(ScriptedProvider::pipeline(
        r#"{"messages": [], "summary": "", "isNewConversation": true, "keyTopics": []}"#,
        "Recruiter inbound",
        draft,
    ));
    let backends = Backends {
        completion: Some(provider.clone() as Arc<dyn replysmith::providers::LlmProvider>),
        ..Backends::default()
    };
    let h = harness_with(html, run_config(""), backends, provider);

    let reports = h.orchestrator.scan().await;
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.state, FieldState::Inserted);
    assert_eq!(
        report.category.as_ref().map(InteractionCategory::as_str),
        Some("Recruiter inbound")
    );
    assert_eq!(report.draft.as_deref(), Some(draft));
    assert!(!draft.contains('[') && !draft.contains(']'));

    let written = h.page.text(report.field).expect("field text");
    assert_eq!(written.trim(), draft);
    assert_eq!(h.page.input_event_count(report.field), 3);

    let calls = h.provider.calls();
    assert_eq!(h.provider.generate_calls(), 1);
    assert!(h.orchestrator.scan().await.is_empty());
    assert_eq!(h.provider.calls(), calls);
    assert_eq!(h.history.entries().expect("history").len(), 1);
}
