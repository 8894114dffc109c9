//! OpenAI-compatible chat completions: wire format and HTTP behaviour.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use replysmith::providers::openai::{build_request, parse_response, OpenAiProvider};
use replysmith::providers::{CompletionRequest, LlmProvider, ProviderError};

fn simple_request() -> CompletionRequest {
    CompletionRequest::single_turn("You are helpful.", "Hello")
        .with_max_tokens(256)
        .with_temperature(0.2)
}

#[test]
fn build_request_puts_system_prompt_first() {
    let req = build_request("gpt-4o-mini", &simple_request());
    assert_eq!(req.model, "gpt-4o-mini");
    assert_eq!(req.max_tokens, Some(256));
    assert_eq!(req.messages.len(), 2);
    assert_eq!(req.messages[0].role, "system");
    assert_eq!(req.messages[0].content, "You are helpful.");
    assert_eq!(req.messages[1].role, "user");
    assert_eq!(req.messages[1].content, "Hello");
}

#[test]
fn build_request_serializes_json_object_format() {
    let req = build_request("m", &simple_request().json_object());
    let value = serde_json::to_value(&req).expect("serialize");
    assert_eq!(value["response_format"], json!({"type": "json_object"}));
    assert_eq!(value["temperature"], json!(0.2_f32));
}

#[test]
fn build_request_omits_unset_optionals() {
    let req = build_request("m", &CompletionRequest::single_turn("s", "u"));
    let value = serde_json::to_value(&req).expect("serialize");
    assert!(value.get("temperature").is_none());
    assert!(value.get("response_format").is_none());
    assert!(value["max_tokens"].is_u64());
}

#[test]
fn parse_response_reads_first_choice_and_usage() {
    let body = json!({
        "model": "gpt-4o-mini-2024",
        "choices": [{"message": {"content": "  Hi Jane!  "}}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 4}
    })
    .to_string();
    let resp = parse_response(&body, "fallback").expect("parse");
    assert_eq!(resp.text, "Hi Jane!");
    assert_eq!(resp.model, "gpt-4o-mini-2024");
    assert_eq!(resp.usage.input_tokens, 12);
    assert_eq!(resp.usage.output_tokens, 4);
    assert!(!resp.cached);
}

#[test]
fn parse_response_uses_fallback_model_and_cached_flag() {
    let body = json!({
        "choices": [{"message": {"content": "ok"}}],
        "cached": true
    })
    .to_string();
    let resp = parse_response(&body, "fallback").expect("parse");
    assert_eq!(resp.model, "fallback");
    assert!(resp.cached);
}

#[test]
fn parse_response_rejects_missing_choices() {
    let err = parse_response(r#"{"choices": []}"#, "m");
    assert!(matches!(err, Err(ProviderError::Parse(_))));
    assert!(matches!(parse_response("not json", "m"), Err(ProviderError::Parse(_))));
}

#[tokio::test]
async fn complete_posts_to_chat_completions_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Thanks for reaching out!"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url(
        "gpt-4o-mini".to_owned(),
        "sk-test".to_owned(),
        format!("{}/v1/", server.uri()),
    );
    let resp = provider.complete(simple_request()).await.expect("complete");
    assert_eq!(resp.text, "Thanks for reaching out!");
    assert_eq!(provider.model_id(), "gpt-4o-mini");
}

#[tokio::test]
async fn non_success_status_is_sanitized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string(
            "Incorrect API key provided: sk-abcdefghijklmnopqrstuvwxyz0123456789",
        ))
        .mount(&server)
        .await;

    let provider =
        OpenAiProvider::with_base_url("m".to_owned(), "k".to_owned(), server.uri());
    match provider.complete(simple_request()).await {
        Err(ProviderError::HttpStatus { status, body }) => {
            assert_eq!(status, 401);
            assert!(body.contains("[REDACTED]"));
            assert!(!body.contains("sk-abcdef"));
        }
        other => panic!("expected HttpStatus error, got {other:?}"),
    }
}
