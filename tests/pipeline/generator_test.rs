//! Draft generation through the cache and direct paths.

use std::sync::Arc;

use replysmith::cache::{CacheStore, SemanticCache};
use replysmith::pipeline::{generate_message_draft, Backends, GenerationError};
use replysmith::providers::LlmProvider;
use replysmith::storage::MemoryStore;
use replysmith::types::{
    ChatHistoryInfo, GenerationContext, InteractionCategory, PreferenceSet, RecipientInfo, Tone,
};

use crate::support::{ScriptedProvider, THREAD_SUMMARY_JSON};

fn context() -> GenerationContext {
    let history: ChatHistoryInfo = serde_json::from_str(THREAD_SUMMARY_JSON).expect("fixture");
    let preferences = PreferenceSet {
        tone: Tone::Friendly,
        custom_instructions: "Mention I am free on Thursday afternoon.".to_owned(),
        ..PreferenceSet::default()
    };
    GenerationContext::new(
        "Alex Kim",
        RecipientInfo {
            name: "Jane Doe".to_owned(),
            byline: Some("Technical Recruiter at Acme".to_owned()),
        },
    )
    .with_chat_history(Some(history))
    .with_classification(InteractionCategory::new("Recruiter inbound"), preferences)
}

fn cache_over(upstream: Arc<ScriptedProvider>) -> SemanticCache {
    SemanticCache::new(CacheStore::new(Arc::new(MemoryStore::new())), upstream)
}

#[tokio::test]
async fn nothing_configured_is_no_provider() {
    let result = generate_message_draft(&Backends::default(), &context()).await;
    assert_eq!(result, Err(GenerationError::NoProvider));
}

#[tokio::test]
async fn direct_path_cleans_the_draft() {
    let provider = Arc::new(ScriptedProvider::fixed("  \"Hi Jane, Thursday works for me.\"  "));
    let backends = Backends {
        completion: Some(provider.clone() as Arc<dyn LlmProvider>),
        ..Backends::default()
    };

    let draft = generate_message_draft(&backends, &context()).await.expect("draft");
    assert_eq!(draft.text, "Hi Jane, Thursday works for me.");
    assert!(!draft.cached);

    let request = &provider.requests()[0];
    assert_eq!(request.max_tokens, Some(500));
    assert_eq!(request.temperature, Some(0.7));
    let system = request.system.as_deref().unwrap_or_default();
    assert!(system.contains("Mention I am free on Thursday afternoon."));
    let user = request.user_text();
    assert!(user.contains("I am Alex Kim."));
    assert!(user.contains("Jane Doe"));
    assert!(user.contains("Conversation type: Recruiter inbound"));
}

#[tokio::test]
async fn second_identical_request_is_served_from_cache() {
    let upstream = Arc::new(ScriptedProvider::fixed("Hi Jane!"));
    let backends = Backends {
        cache: Some(cache_over(upstream.clone())),
        ..Backends::default()
    };

    let first = generate_message_draft(&backends, &context()).await.expect("first");
    let second = generate_message_draft(&backends, &context()).await.expect("second");
    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(second.text, "Hi Jane!");
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn cache_failure_falls_back_to_direct() {
    let direct = Arc::new(ScriptedProvider::fixed("Direct draft"));
    let backends = Backends {
        completion: Some(direct.clone() as Arc<dyn LlmProvider>),
        cache: Some(cache_over(Arc::new(ScriptedProvider::failing()))),
        ..Backends::default()
    };

    let draft = generate_message_draft(&backends, &context()).await.expect("draft");
    assert_eq!(draft.text, "Direct draft");
    assert!(!draft.cached);
    assert_eq!(direct.generate_calls(), 1);
}

#[tokio::test]
async fn both_paths_failing_reports_both() {
    let backends = Backends {
        completion: Some(Arc::new(ScriptedProvider::failing()) as Arc<dyn LlmProvider>),
        cache: Some(cache_over(Arc::new(ScriptedProvider::failing()))),
        ..Backends::default()
    };

    match generate_message_draft(&backends, &context()).await {
        Err(GenerationError::Failed(reason)) => {
            assert!(reason.contains("cache:"), "reason: {reason}");
            assert!(reason.contains("direct:"), "reason: {reason}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn cache_only_failure_is_failed_not_no_provider() {
    let backends = Backends {
        cache: Some(cache_over(Arc::new(ScriptedProvider::failing()))),
        ..Backends::default()
    };
    assert!(matches!(
        generate_message_draft(&backends, &context()).await,
        Err(GenerationError::Failed(_))
    ));
}

#[tokio::test]
async fn empty_draft_is_an_error() {
    let backends = Backends {
        completion: Some(Arc::new(ScriptedProvider::fixed("  \"\" ")) as Arc<dyn LlmProvider>),
        ..Backends::default()
    };
    assert_eq!(
        generate_message_draft(&backends, &context()).await,
        Err(GenerationError::Empty)
    );
}
