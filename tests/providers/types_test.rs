//! Tests for provider request types and shared helpers.

use replysmith::providers::{
    sanitize_http_error_body, truncate_chars, CompletionRequest, Message, ResponseFormat, Role,
};

#[test]
fn single_turn_keeps_system_separate() {
    let req = CompletionRequest::single_turn("sys", "hello");
    assert_eq!(req.system.as_deref(), Some("sys"));
    assert_eq!(req.messages, vec![Message::user("hello")]);
    assert_eq!(req.response_format, None);
}

#[test]
fn user_text_joins_only_user_messages() {
    let mut req = CompletionRequest::single_turn("sys", "first");
    req.messages.push(Message {
        role: Role::Assistant,
        content: "ignored".to_owned(),
    });
    req.messages.push(Message::user("second"));
    assert_eq!(req.user_text(), "first\nsecond");
}

#[test]
fn builders_set_sampling_and_format() {
    let req = CompletionRequest::single_turn("s", "u")
        .with_max_tokens(10)
        .with_temperature(0.5)
        .json_object();
    assert_eq!(req.max_tokens, Some(10));
    assert_eq!(req.temperature, Some(0.5));
    assert_eq!(req.response_format, Some(ResponseFormat::JsonObject));
}

#[test]
fn role_wire_names() {
    assert_eq!(Role::System.as_str(), "system");
    assert_eq!(Role::User.as_str(), "user");
    assert_eq!(Role::Assistant.as_str(), "assistant");
}

#[test]
fn truncate_respects_char_boundaries() {
    assert_eq!(truncate_chars("héllo", 2), "hé");
    assert_eq!(truncate_chars("hi", 10), "hi");
}

#[test]
fn sanitize_redacts_search_keys_and_bearer_tokens() {
    let cleaned = sanitize_http_error_body(
        "key AIzaSyA1234567890abcdefghijkl rejected; Bearer abcdefghijklmnopqrstuv",
    );
    assert!(!cleaned.contains("AIzaSy"));
    assert!(!cleaned.contains("abcdefghijklmnopqrstuv"));
}
