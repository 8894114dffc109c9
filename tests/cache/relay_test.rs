//! Relay worker against a stand-in cache service.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use replysmith::cache::relay::{
    CacheRelay, RelayEndpoint, RelayError, RelayProvider, INSTANCE_ID_HEADER,
};
use replysmith::providers::{CompletionRequest, LlmProvider};

fn endpoint(server: &MockServer) -> RelayEndpoint {
    RelayEndpoint::parse(&format!("{}/v1/caches/{{cache_id}}/chat", server.uri()))
        .expect("endpoint")
}

fn provider(server: &MockServer, relay: CacheRelay) -> RelayProvider {
    RelayProvider::new(
        relay,
        endpoint(server),
        "cache-key".to_owned(),
        "cache-123".to_owned(),
        "sk-provider".to_owned(),
        "gpt-4o-mini".to_owned(),
    )
    .expect("provider")
}

#[tokio::test]
async fn forwards_credentials_and_provider_spec() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/caches/cache-123/chat"))
        .and(header("authorization", "Bearer cache-key"))
        .and(header(INSTANCE_ID_HEADER, "cache-123"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "max_tokens": 500,
            "provider": {"type": "openai", "api_key": "sk-provider"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "Hi Jane, happy to chat."}}],
            "cached": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let relay = CacheRelay::spawn(reqwest::Client::new());
    let provider = provider(&server, relay);
    let response = provider
        .complete(CompletionRequest::single_turn("sys", "hello").with_max_tokens(500))
        .await
        .expect("relay completion");

    assert_eq!(response.text, "Hi Jane, happy to chat.");
    assert!(response.cached);
    assert_eq!(response.model, "gpt-4o-mini");
}

#[tokio::test]
async fn message_puts_system_prompt_first() {
    let server = MockServer::start().await;
    let provider = provider(&server, CacheRelay::spawn(reqwest::Client::new()));
    let message = provider
        .message_for(&CompletionRequest::single_turn("sys", "hello"))
        .expect("message");

    assert_eq!(message.id, "cache-123");
    assert!(message.url.ends_with("/v1/caches/cache-123/chat"));
    assert_eq!(message.messages[0].role, "system");
    assert_eq!(message.messages[1].content, "hello");
}

#[tokio::test]
async fn error_status_becomes_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let relay = CacheRelay::spawn(reqwest::Client::new());
    let provider = provider(&server, relay.clone());
    let message = provider
        .message_for(&CompletionRequest::single_turn("sys", "hello"))
        .expect("message");

    match relay.call(message).await {
        Err(RelayError::Remote(detail)) => {
            assert!(detail.contains("403"), "detail: {detail}");
            assert!(detail.contains("forbidden"));
        }
        other => panic!("expected remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_reply_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"choices": []}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let relay = CacheRelay::spawn_with_timeout(reqwest::Client::new(), Duration::from_millis(50));
    let provider = provider(&server, relay.clone());
    let message = provider
        .message_for(&CompletionRequest::single_turn("sys", "hello"))
        .expect("message");

    assert_eq!(
        relay.call(message).await,
        Err(RelayError::Timeout(Duration::from_millis(50)))
    );
}

#[tokio::test]
async fn concurrent_calls_get_their_own_replies() {
    let server = MockServer::start().await;
    for name in ["alpha", "beta"] {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"messages": [{"role": "user", "content": name}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": format!("reply to {name}")}}]
            })))
            .mount(&server)
            .await;
    }

    let relay = CacheRelay::spawn(reqwest::Client::new());
    let provider = provider(&server, relay);
    let (a, b) = tokio::join!(
        provider.complete(CompletionRequest {
            system: None,
            ..CompletionRequest::single_turn("", "alpha")
        }),
        provider.complete(CompletionRequest {
            system: None,
            ..CompletionRequest::single_turn("", "beta")
        }),
    );
    assert_eq!(a.expect("alpha").text, "reply to alpha");
    assert_eq!(b.expect("beta").text, "reply to beta");
}

#[test]
fn endpoint_template_is_validated() {
    assert!(matches!(
        RelayEndpoint::parse("https://cache.example/v1/chat"),
        Err(RelayError::Endpoint(_))
    ));
    assert!(matches!(
        RelayEndpoint::parse("ftp://cache.example/{cache_id}"),
        Err(RelayError::Endpoint(_))
    ));
}
